//! Inference module for talking to the model server
//!
//! Exposes the `InferenceBackend` seam used by the orchestrator and the
//! connection monitor, plus the Ollama-compatible HTTP implementation.

mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ollama::OllamaClient;

/// Identifier of a model as reported by the server catalog
pub type ModelId = String;

/// A single enhancement call, built fresh for every trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementRequest {
    /// Text to enhance, already trimmed and non-empty
    pub source_text: String,
    /// Model to run
    pub model_id: ModelId,
    /// Instructions controlling the enhancement
    pub system_prompt: String,
}

/// Failures of the model server round trip
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum InferenceError {
    #[error("the model server did not answer in time")]
    Timeout,

    #[error("the model server is unreachable")]
    Unreachable,

    #[error("the model server returned no usable text")]
    EmptyResult,

    #[error("no model is available")]
    NoModelAvailable,

    #[error("the model server responded with status {0}")]
    ServerError(u16),
}

impl InferenceError {
    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceError::Timeout => "timeout",
            InferenceError::Unreachable => "unreachable",
            InferenceError::EmptyResult => "empty_result",
            InferenceError::NoModelAvailable => "no_model_available",
            InferenceError::ServerError(_) => "server_error",
        }
    }
}

/// Request/response access to a text-completion server
///
/// Implementations never retry: one call, one answer.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run one enhancement and return the trimmed, non-empty result
    async fn enhance(&self, request: &EnhancementRequest) -> Result<String, InferenceError>;

    /// Fetch the model catalog in server order
    async fn list_models(&self) -> Result<Vec<ModelId>, InferenceError>;

    /// Check reachability without running inference
    async fn test_connection(&self) -> Result<(), InferenceError>;
}
