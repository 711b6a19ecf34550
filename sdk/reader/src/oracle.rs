use async_trait::async_trait;

use crate::error::OracleError;
use crate::wire::{UserDecryptRequest, UserDecryptResponse};

/// A service holding the network key that re-encrypts a value for an
/// authorized requester.
#[async_trait]
pub trait DecryptionOracle: Send + Sync {
    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<UserDecryptResponse, OracleError>;
}

#[async_trait]
impl<O: DecryptionOracle + ?Sized> DecryptionOracle for std::sync::Arc<O> {
    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<UserDecryptResponse, OracleError> {
        (**self).user_decrypt(request).await
    }
}
