//! Cryptographic operations for the AgentID verification engine
//!
//! This crate provides the primitives the engine needs:
//! - Ed25519 public keys of registered agents
//! - Signature checks on agent-signed capability reports
//! - SHA-256 content hashes for the chained audit trail

mod digest;
mod error;
mod keys;
mod signatures;

pub use digest::ContentHash;
pub use error::CryptoError;
pub use keys::{KeyPair, PrivateKey, PublicKey};
pub use signatures::Signature;

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;
