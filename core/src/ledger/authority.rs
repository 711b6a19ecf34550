use gradeseal_identity::Identity;

use super::LedgerError;

/// The single identity allowed to write records. Fixed for the ledger's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterAuthority {
    writer: Identity,
}

impl WriterAuthority {
    pub fn new(writer: Identity) -> Result<Self, LedgerError> {
        if writer.is_zero() {
            return Err(LedgerError::MalformedIdentity(
                "writer must not be the zero address".into(),
            ));
        }
        Ok(Self { writer })
    }

    pub fn writer(&self) -> Identity {
        self.writer
    }

    pub fn authorize(&self, caller: &Identity) -> Result<(), LedgerError> {
        if *caller != self.writer {
            return Err(LedgerError::NotAuthorizedWriter(*caller));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_writer_is_authorized() {
        let auth = WriterAuthority::new(Identity([1; 20])).unwrap();
        assert!(auth.authorize(&Identity([1; 20])).is_ok());
        assert!(matches!(
            auth.authorize(&Identity([2; 20])),
            Err(LedgerError::NotAuthorizedWriter(id)) if id == Identity([2; 20])
        ));
    }

    #[test]
    fn test_zero_writer_rejected() {
        assert!(matches!(
            WriterAuthority::new(Identity::ZERO),
            Err(LedgerError::MalformedIdentity(_))
        ));
    }
}
