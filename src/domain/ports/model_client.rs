//! Language model port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ModelError;

/// Result of probing a model backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHealth {
    /// Backend reachable at all.
    pub reachable: bool,
    /// Configured model is available on the backend.
    pub model_available: bool,
    /// Models the backend reported, if it lists them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

impl ModelHealth {
    pub fn is_healthy(&self) -> bool {
        self.reachable && self.model_available
    }
}

/// A chat-style completion backend.
///
/// Implementations only report transport and availability failures. Whatever
/// text comes back is returned as-is; interpreting it is the caller's job.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier of the model being called.
    fn model_id(&self) -> &str;

    /// Complete a prompt. An empty `system_prompt` means no system message.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ModelError>;

    /// Probe the backend.
    async fn health_check(&self) -> Result<ModelHealth, ModelError>;
}
