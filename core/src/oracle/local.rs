use async_trait::async_trait;
use std::sync::Arc;

use gradeseal_reader::{DecryptionOracle, OracleError, UserDecryptRequest, UserDecryptResponse};

use super::DecryptionService;

/// Calls a decryption service in the same process.
#[derive(Clone)]
pub struct LocalOracle {
    service: Arc<DecryptionService>,
}

impl LocalOracle {
    pub fn new(service: Arc<DecryptionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl DecryptionOracle for LocalOracle {
    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<UserDecryptResponse, OracleError> {
        self.service.user_decrypt(request)
    }
}
