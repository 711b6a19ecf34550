//! HTTP client for a remote decryption oracle.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use crate::error::OracleError;
use crate::oracle::DecryptionOracle;
use crate::wire::{OracleRejection, UserDecryptRequest, UserDecryptResponse};

pub const USER_DECRYPT_PATH: &str = "/oracle/user-decrypt";

pub struct HttpOracle {
    base_url: String,
    client: reqwest::Client,
}

impl HttpOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Protocol(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl DecryptionOracle for HttpOracle {
    async fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<UserDecryptResponse, OracleError> {
        let url = format!("{}{}", self.base_url, USER_DECRYPT_PATH);
        debug!(url = %url, handle = %request.handle, "requesting user decryption");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| OracleError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<UserDecryptResponse>()
                .await
                .map_err(|e| OracleError::Protocol(format!("invalid response body: {e}")));
        }

        // Overload and outages are worth retrying; the body may not be ours.
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::Unreachable(format!("oracle returned {status}")));
        }

        let rejection: OracleRejection = response
            .json()
            .await
            .map_err(|e| OracleError::Protocol(format!("oracle returned {status}: {e}")))?;
        Err(rejection.into_error())
    }
}
