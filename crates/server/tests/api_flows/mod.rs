//! HTTP flows against the full router.
//! Each test builds in-memory state, registers agents the way the platform
//! does and drives the router with `oneshot`.

mod capability_api;
mod seed_api;
mod trust_api;
mod verify_api;

use std::sync::Arc;

use agentid_core::CapabilityStore;
use agentid_crypto::KeyPair;
use agentid_server::{create_router, ApiKeyAuthenticator, AppState};
use agentid_trust::TrustConfig;
use agentid_types::{AgentId, AgentKind, AgentStatus, CapabilitySpec, NewAgent, OrganizationId};
use agentid_verify::VerifierConfig;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub(crate) const ACME_KEY: &str = "acme-test-key";
pub(crate) const GLOBEX_KEY: &str = "globex-test-key";

pub(crate) struct TestApp {
    pub state: AppState,
    pub acme: OrganizationId,
    _worker: tokio::sync::watch::Sender<bool>,
}

pub(crate) fn test_app() -> TestApp {
    let acme = OrganizationId::new();
    let mut authenticator = ApiKeyAuthenticator::new();
    authenticator.add_key(ACME_KEY, acme);
    authenticator.add_key(GLOBEX_KEY, OrganizationId::new());

    let (state, worker) = AppState::in_memory(
        TrustConfig::default(),
        VerifierConfig::default(),
        Arc::new(authenticator),
        None,
    )
    .unwrap();
    let (shutdown, _task) = worker.start();

    TestApp {
        state,
        acme,
        _worker: shutdown,
    }
}

impl TestApp {
    /// Register a verified agent owned by the acme organization
    pub async fn agent(&self) -> AgentId {
        self.agent_with(KeyPair::generate()).await
    }

    pub async fn agent_with(&self, keys: KeyPair) -> AgentId {
        let (agent, _) = self
            .state
            .register_agent(NewAgent {
                organization_id: self.acme,
                name: "api-agent".into(),
                kind: AgentKind::Agent,
                public_key: keys.public_key().as_bytes().to_vec(),
                status: AgentStatus::Verified,
            })
            .await
            .unwrap();
        agent.id
    }

    pub async fn grant(&self, agent_id: &AgentId, spec: CapabilitySpec) {
        self.state
            .capabilities
            .grant_capability(agent_id, spec)
            .await
            .unwrap();
    }

    /// Send a request as `key` and return the status and JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = create_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(ACME_KEY), Some(body)).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(ACME_KEY), None).await
    }
}
