//! Gradeseal Configuration
//!
//! Shared configuration crate for the node and the CLI.
//!
//! Handles loading configuration from:
//! 1. GS_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.gradeseal/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".gradeseal";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "./gradeseal-db";
const DEFAULT_CHAIN_ID: u64 = 31337;
const DEFAULT_ORACLE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_NETWORK_KEY_PATH: &str = "./network.key";
const DEFAULT_MAX_DURATION_DAYS: u32 = 365;
const DEFAULT_MAX_CLOCK_SKEW_SECS: u64 = 300;

const DEFAULT_DECRYPT_DAYS: u32 = 10;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 500;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradesealConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub decrypt: DecryptConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

impl ApiConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Storage backend for the ledger
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Rocksdb,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rocksdb" => Ok(StorageBackend::Rocksdb),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default)]
    pub backend: StorageBackend,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.into(),
            backend: StorageBackend::Rocksdb,
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.into()
}

/// Ledger deployment parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Contract identity; derived from the writer and chain when unset
    #[serde(default)]
    pub contract_address: Option<String>,
    /// The only identity allowed to write records
    #[serde(default)]
    pub writer_address: Option<String>,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract_address: None,
            writer_address: None,
            chain_id: DEFAULT_CHAIN_ID,
        }
    }
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

/// Decryption oracle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_url")]
    pub url: String,
    #[serde(default = "default_network_key_path")]
    pub network_key_path: String,
    #[serde(default = "default_max_duration_days")]
    pub max_duration_days: u32,
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_secs: u64,
    /// Verifying contract of the decryption domain; the ledger contract when unset
    #[serde(default)]
    pub verifying_contract: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ORACLE_URL.into(),
            network_key_path: DEFAULT_NETWORK_KEY_PATH.into(),
            max_duration_days: DEFAULT_MAX_DURATION_DAYS,
            max_clock_skew_secs: DEFAULT_MAX_CLOCK_SKEW_SECS,
            verifying_contract: None,
        }
    }
}

fn default_oracle_url() -> String {
    DEFAULT_ORACLE_URL.into()
}
fn default_network_key_path() -> String {
    DEFAULT_NETWORK_KEY_PATH.into()
}
fn default_max_duration_days() -> u32 {
    DEFAULT_MAX_DURATION_DAYS
}
fn default_max_clock_skew() -> u64 {
    DEFAULT_MAX_CLOCK_SKEW_SECS
}

/// Client-side decryption policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptConfig {
    #[serde(default = "default_decrypt_days")]
    pub duration_days: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            duration_days: DEFAULT_DECRYPT_DAYS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
        }
    }
}

fn default_decrypt_days() -> u32 {
    DEFAULT_DECRYPT_DAYS
}
fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_retry_base_ms() -> u64 {
    DEFAULT_RETRY_BASE_MS
}

/// CLI settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ledger node URL; `http://{api.host}:{api.port}` when unset
    #[serde(default)]
    pub node_url: Option<String>,
    #[serde(default)]
    pub keypair_path: Option<String>,
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(key: &str, field: &mut Option<String>) {
    if let Ok(v) = env::var(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        parse_into(key, &v, field);
    }
}

/// Returns false (and warns) when `value` is rejected; `field` is then untouched.
fn parse_into<T: std::str::FromStr>(key: &str, value: &str, field: &mut T) -> bool {
    match value.parse() {
        Ok(parsed) => {
            *field = parsed;
            true
        }
        Err(_) => {
            log::warn!("Ignoring unparseable {}={:?}", key, value);
            false
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl GradesealConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check GS_CONFIG env var
        if let Ok(path) = env::var("GS_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("GS_CONFIG points to {}, which does not exist", path.display());
        }

        // 2. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.gradeseal/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // API
        env_string("GS_API_HOST", &mut self.api.host);
        env_parse("GS_API_PORT", &mut self.api.port);

        // Database
        env_string("GS_DB_PATH", &mut self.database.path);
        env_parse("GS_DB_BACKEND", &mut self.database.backend);

        // Ledger
        env_option_string("GS_CONTRACT", &mut self.ledger.contract_address);
        env_option_string("GS_WRITER", &mut self.ledger.writer_address);
        env_parse("GS_CHAIN_ID", &mut self.ledger.chain_id);

        // Oracle
        env_string("GS_ORACLE_URL", &mut self.oracle.url);
        env_string("GS_NETWORK_KEY", &mut self.oracle.network_key_path);

        // Decrypt
        env_parse("GS_DECRYPT_DAYS", &mut self.decrypt.duration_days);
        env_parse("GS_DECRYPT_RETRIES", &mut self.decrypt.max_retries);
        env_parse("GS_DECRYPT_TIMEOUT_MS", &mut self.decrypt.request_timeout_ms);

        // Client
        env_option_string("GS_NODE_URL", &mut self.client.node_url);
        env_option_string("GS_KEYPAIR", &mut self.client.keypair_path);
    }

    /// URL the CLI uses to reach the ledger node
    pub fn node_url(&self) -> String {
        self.client
            .node_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.api.bind_addr()))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Default location of the CLI key file
    pub fn default_keypair_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join("id.json"))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.ledger.writer_address = Some("0x0000000000000000000000000000000000000001".into());
        sample.client.node_url = Some(format!("http://{DEFAULT_HOST}:{DEFAULT_PORT}"));
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
