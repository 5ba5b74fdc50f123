use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::Signature as Ed25519Signature;
use serde::{Deserialize, Serialize};

use crate::{CryptoError, PublicKey};

/// A digital signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// The raw signature bytes
    pub signature_bytes: Vec<u8>,
    /// The Ed25519 signature
    #[serde(skip)]
    pub ed25519_signature: Option<Ed25519Signature>,
}

impl Signature {
    /// Create a new signature from bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature("Invalid signature length".into()))?;
        let ed25519_signature = Ed25519Signature::from_bytes(&bytes);

        Ok(Self {
            signature_bytes: bytes.to_vec(),
            ed25519_signature: Some(ed25519_signature),
        })
    }

    /// Decode a standard base64 signature
    pub fn from_base64(encoded: &str) -> crate::Result<Self> {
        let bytes = BASE64.decode(encoded.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Get the raw signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.signature_bytes
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.signature_bytes)
    }

    /// Verify this signature against a message and public key
    pub fn verify(&self, message: &[u8], public_key: &PublicKey) -> crate::Result<()> {
        let signature = match self.ed25519_signature {
            Some(signature) => signature,
            None => Ed25519Signature::from_slice(&self.signature_bytes)?,
        };

        let verifying_key = public_key.verifying_key.as_ref().ok_or_else(|| {
            CryptoError::InvalidKeyFormat("Public key not initialized".into())
        })?;

        verifying_key
            .verify_strict(message, &signature)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

impl From<Ed25519Signature> for Signature {
    fn from(sig: Ed25519Signature) -> Self {
        Self {
            signature_bytes: sig.to_bytes().to_vec(),
            ed25519_signature: Some(sig),
        }
    }
}
