use thiserror::Error;

/// Failures raised by a completion provider. They are propagated unchanged to
/// the agent's stream; the runtime never retries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider not found: {0}")]
    NotFound(String),

    #[error("Token stream failed: {0}")]
    Stream(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
