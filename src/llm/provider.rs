use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Model server collaborator: chat completions plus embeddings.
///
/// Both the assistant and the injection detector talk to an
/// implementation of this trait; the hybrid retriever uses `embed`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "lmstudio")
    fn name(&self) -> &str;

    /// check if the provider is healthy/reachable
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError>;

    /// generate embeddings, one vector per input
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;
}
