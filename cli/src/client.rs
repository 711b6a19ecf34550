//! Thin HTTP client for the ledger node.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use gradeseal_handle::Handle;
use gradeseal_identity::Identity;
use gradeseal_transaction::SignedCall;
use gradeseal_typed_data::Domain;

#[derive(Debug, Deserialize)]
pub struct NodeInfo {
    pub contract: Identity,
    pub writer: Identity,
    pub chain_id: u64,
    pub network_public_key: String,
    pub decryption_domain: Domain,
}

impl NodeInfo {
    pub fn network_key(&self) -> Result<[u8; 32]> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(&self.network_public_key, &mut out)
            .context("node returned a malformed network key")?;
        Ok(out)
    }
}

#[derive(Debug, Serialize)]
struct RecordQuery {
    owner: String,
    category: u8,
}

#[derive(Debug, Deserialize)]
pub struct Record {
    pub handle: Handle,
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct CallReceipt {
    pub caller: Identity,
    #[serde(default)]
    pub handle: Option<Handle>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

pub struct NodeClient {
    base_url: String,
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn info(&self) -> Result<NodeInfo> {
        let response = self
            .http
            .get(format!("{}/info", self.base_url))
            .send()
            .await
            .with_context(|| format!("Cannot reach node at {}", self.base_url))?;
        decode(response).await
    }

    pub async fn record(&self, owner: &Identity, category: u8) -> Result<Record> {
        self.post(
            "/ledger/record",
            &RecordQuery {
                owner: owner.to_string(),
                category,
            },
        )
        .await
    }

    pub async fn submit(&self, call: &SignedCall) -> Result<CallReceipt> {
        self.post("/ledger/call", call).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Cannot reach node at {}", self.base_url))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| anyhow!("Invalid response from node: {e}"));
    }
    match response.json::<ErrorBody>().await {
        Ok(body) => bail!("{} ({})", body.error, body.code),
        Err(_) => bail!("Node returned {}", status),
    }
}
