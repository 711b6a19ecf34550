//! Gradeseal Privacy SDK
//!
//! Client-side encryption of grade values under the network key, and the
//! proof that binds each ciphertext to one (contract, submitter) pair.
//!
//! ```text
//!   plaintext ──seal(network_pk, aad = contract‖submitter)──▶ SealedBox
//!                                                              │
//!                  handle  = H_handle(contract‖submitter‖box)  │
//!                  binding = H_bind(handle‖contract‖submitter‖box)
//!                                                              ▼
//!                                          SealedInput { handle, proof }
//! ```

pub mod encryption;
pub mod input;

pub use encryption::{SealError, SealedBox};
pub use input::{
    EncryptionPipeline, InputError, InputProof, MAX_GRADE, SealedInput, open_value,
};
