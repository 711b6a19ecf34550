//! Reader SDK
//!
//! Everything an owner or viewer needs to turn a handle into a plaintext:
//! a fresh ephemeral key, a signed time-boxed authorization, a call to the
//! decryption oracle, and the final local decryption.
//!
//! ```text
//!   DecryptionFlow::decrypt(handle, signer)
//!        │
//!        ├── AuthorizationGrant::issue   (ephemeral x25519 key + typed signature)
//!        ├── DecryptionOracle::user_decrypt   (retried on transient failure)
//!        └── AuthorizationGrant::open   (consumes the ephemeral secret)
//! ```

pub mod clock;
pub mod error;
pub mod flow;
pub mod grant;
pub mod http;
pub mod oracle;
pub mod wire;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DecryptError, OracleError};
pub use flow::{DecryptPolicy, DecryptionFlow};
pub use grant::AuthorizationGrant;
pub use http::HttpOracle;
pub use oracle::DecryptionOracle;
pub use wire::{
    OracleRejection, RejectionCode, UserDecryptRequest, UserDecryptResponse, seal_response,
};
