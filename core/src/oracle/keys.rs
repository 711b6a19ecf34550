use anyhow::{Context, Result};
use chacha20poly1305::aead::OsRng;
use log::info;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use x25519_dalek::StaticSecret;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Loads the network secret (hex, 32 bytes) from `path`, generating and
/// saving a new one if the file does not exist.
pub fn load_or_create_network_key(path: &Path) -> Result<StaticSecret> {
    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read network key: {}", path.display()))?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(raw.trim(), &mut bytes)
            .with_context(|| format!("Network key {} is not 32 hex bytes", path.display()))?;
        return Ok(StaticSecret::from(bytes));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let secret = StaticSecret::random_from_rng(OsRng);
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("Failed to create network key: {}", path.display()))?;

    #[cfg(unix)]
    {
        // chmod 600 (rw-------)
        let mut perms = f.metadata()?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    f.write_all(hex::encode(secret.to_bytes()).as_bytes())?;
    info!("Generated new network key at {}", path.display());

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use x25519_dalek::PublicKey;

    #[test]
    fn test_created_once_then_reused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys").join("network.key");

        let first = load_or_create_network_key(&path).unwrap();
        let second = load_or_create_network_key(&path).unwrap();
        assert_eq!(PublicKey::from(&first), PublicKey::from(&second));
    }

    #[test]
    fn test_garbage_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("network.key");
        fs::write(&path, "not hex").unwrap();
        assert!(load_or_create_network_key(&path).is_err());
    }
}
