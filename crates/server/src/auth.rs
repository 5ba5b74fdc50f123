//! Caller authentication
//!
//! Every agent endpoint runs behind [`require_auth`], which resolves the
//! presented API key to a [`Caller`] and stores it in the request
//! extensions for the handlers.

use std::collections::HashMap;

use agentid_types::OrganizationId;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::config::ApiKeyEntry;
use crate::error::ApiError;
use crate::state::AppState;

/// Header accepted as an alternative to `Authorization: Bearer`
pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated party behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub organization_id: OrganizationId,
    /// Short, non-secret label for logs
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid API key")]
    InvalidKey,
}

/// Resolves presented credentials to a caller
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Caller, AuthError>;
}

/// Authenticator over a fixed set of API keys.
///
/// Only SHA-256 hashes of the keys are kept in memory.
#[derive(Debug, Default)]
pub struct ApiKeyAuthenticator {
    keys: HashMap<String, Caller>,
}

impl ApiKeyAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[ApiKeyEntry]) -> Self {
        let mut authenticator = Self::new();
        for entry in entries {
            authenticator.add_key(&entry.key, entry.organization_id);
        }
        authenticator
    }

    pub fn add_key(&mut self, key: &str, organization_id: OrganizationId) {
        let hash = hash_key(key);
        let name = format!("key-{}", &hash[..8]);
        self.keys.insert(
            hash,
            Caller {
                organization_id,
                name,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Caller, AuthError> {
        self.keys
            .get(&hash_key(token))
            .cloned()
            .ok_or(AuthError::InvalidKey)
    }
}

/// Hex-encoded SHA-256 of a key
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(req: &Request<Body>) -> Option<&str> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;

    // Case insensitive scheme
    let prefix = auth_header.get(..7)?;
    if prefix.eq_ignore_ascii_case("Bearer ") {
        let token = auth_header[7..].trim();
        return (!token.is_empty()).then_some(token);
    }
    None
}

fn extract_token(req: &Request<Body>) -> Option<&str> {
    extract_bearer_token(req).or_else(|| {
        req.headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}

/// Middleware that authenticates the caller and adds [`Caller`] to the
/// request extensions. Responds 401 when no valid key is presented.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&req).ok_or(ApiError::Unauthorized)?;

    let caller = state.authenticator.authenticate(token).await.map_err(|e| {
        tracing::debug!(error = %e, "authentication failed");
        ApiError::Unauthorized
    })?;

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
