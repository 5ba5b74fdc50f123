use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

impl From<ed25519_dalek::ed25519::Error> for CryptoError {
    fn from(err: ed25519_dalek::ed25519::Error) -> Self {
        CryptoError::InvalidSignature(err.to_string())
    }
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::InvalidEncoding(err.to_string())
    }
}
