use serde::{Deserialize, Serialize};

use crate::AgentId;

/// An in-flight action an agent asks permission for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub agent_id: AgentId,
    /// Capability type name, e.g. `file_read`. Unknown names never match a grant.
    pub action_type: String,
    /// Path, URL, host, table, language or secret name depending on the type
    pub resource: String,
    #[serde(default)]
    pub context: ActionContext,
}

impl ActionRequest {
    pub fn new(
        agent_id: AgentId,
        action_type: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            agent_id,
            action_type: action_type.into(),
            resource: resource.into(),
            context: ActionContext::default(),
        }
    }

    pub fn with_context(mut self, context: ActionContext) -> Self {
        self.context = context;
        self
    }
}

/// Request context.
///
/// The fields scope matching understands are typed; anything else the
/// caller sends is kept verbatim in `extra` for the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "fileSize")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "resultRows")]
    pub result_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
