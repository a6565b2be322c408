use thiserror::Error;

/// Failures surfaced by external collaborators (chat model, injection
/// detector, embedding service, search backend) or by configuration.
///
/// Guardrail rejections are not errors; they are ordinary verdicts the
/// orchestration layer branches on. Anything here is fatal to the request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("chat provider error: {0}")]
    Provider(String),
    #[error("injection detector error: {0}")]
    Detector(String),
    #[error("search backend error: {0}")]
    Search(String),
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Provider(err.to_string())
    }

    pub fn search<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Search(err.to_string())
    }
}
