//! Input and output guardrails applied around a chat model call.
//!
//! Input guardrails may transform the outgoing prompt or reject it before
//! the model is called; output guardrails inspect the model's reply.
//! Rejections are verdicts, not errors: collaborator failures are the only
//! thing surfaced as `Err`.

pub mod canary;
pub mod injection;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::errors::ApiError;

pub use canary::{CanaryInputGuardrail, CanaryOutputGuardrail, CanaryStore};
pub use injection::{InjectionDetector, LlmInjectionDetector, PromptInjectionGuardrail};

/// Identifies one in-flight request. Guardrail state (the canary binding)
/// is keyed by this id, never by the executing thread or task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// Verdict of an input guardrail. `Accept` carries the prompt to forward,
/// which may differ from the one inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputVerdict {
    Accept(String),
    Reject(String),
}

/// Verdict of an output guardrail over the model's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputVerdict {
    Accept,
    Reject(String),
}

#[async_trait]
pub trait InputGuardrail: Send + Sync {
    async fn validate(&self, ctx: ContextId, prompt: &str) -> Result<InputVerdict, ApiError>;
}

#[async_trait]
pub trait OutputGuardrail: Send + Sync {
    async fn validate(&self, ctx: ContextId, response: &str) -> Result<OutputVerdict, ApiError>;
}
