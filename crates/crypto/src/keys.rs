use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{CryptoError, Signature};

/// An Ed25519 key pair.
///
/// Key issuance belongs to the registration flow; the engine only needs
/// this to sign test fixtures and demo reports.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// The public key component
    pub public_key: PublicKey,
    /// The private key component
    pub private_key: PrivateKey,
}

/// A public key used to check agent signatures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKey {
    /// The raw public key bytes
    pub key_bytes: Vec<u8>,
    /// The verifying key for signatures
    #[serde(skip)]
    pub verifying_key: Option<VerifyingKey>,
}

/// A private key used for signing
#[derive(Debug, Clone)]
pub struct PrivateKey {
    /// The signing key for signatures
    pub signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new key pair
    pub fn generate() -> Self {
        let mut secret_key_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut secret_key_bytes);

        let signing_key = SigningKey::from_bytes(&secret_key_bytes);
        let verifying_key = signing_key.verifying_key();

        Self {
            public_key: PublicKey {
                key_bytes: verifying_key.to_bytes().to_vec(),
                verifying_key: Some(verifying_key),
            },
            private_key: PrivateKey { signing_key },
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Sign a message with the private key
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from(self.private_key.signing_key.sign(message))
    }
}

impl PublicKey {
    /// Create a public key from raw bytes, rejecting anything that is not a
    /// valid Ed25519 point
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyFormat(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        let verifying_key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;

        Ok(Self {
            key_bytes: bytes.to_vec(),
            verifying_key: Some(verifying_key),
        })
    }

    /// Create a public key from its standard base64 encoding
    pub fn from_base64(encoded: &str) -> crate::Result<Self> {
        let bytes = BASE64.decode(encoded.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.key_bytes
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.key_bytes)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_bytes == other.key_bytes
    }
}

impl Eq for PublicKey {}
