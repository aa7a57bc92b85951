//! Error Types

use thiserror::Error;

/// Result type alias for conductor operations
pub type Result<T> = std::result::Result<T, ConductorError>;

/// Errors surfaced by the scheduling and admission core.
///
/// Every `Scheduler::submit` call resolves to exactly one of these, or a
/// successful response.
#[derive(Error, Debug, Clone)]
pub enum ConductorError {
    /// The bounded admission queue was full at enqueue time.
    #[error("request queue is full")]
    QueueFull,

    /// `submit` exceeded its wait deadline before the request was dispatched.
    #[error("timed out waiting for available capacity")]
    Timeout,

    /// The worker exhausted its selection attempts without acquiring any key.
    #[error("no provider capacity available")]
    NoCapacity,

    /// The upstream provider returned a non-2xx response or the transport failed.
    #[error("provider error: {cause}")]
    Provider {
        status: Option<u16>,
        body: Option<String>,
        cause: String,
    },

    /// No providers are registered with the scheduler.
    #[error("configuration error: {0}")]
    Config(String),

    /// `submit` was called after `Scheduler::stop` was invoked.
    #[error("scheduler is shutting down")]
    ShuttingDown,

    /// The request asked for a feature the gateway does not support (e.g. streaming).
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
}

impl ConductorError {
    /// Whether retrying the same `submit` call might succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConductorError::QueueFull | ConductorError::Timeout | ConductorError::NoCapacity
        )
    }

    /// The HTTP status code the server boundary maps this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            ConductorError::QueueFull => 503,
            ConductorError::Timeout => 504,
            ConductorError::NoCapacity => 503,
            ConductorError::Provider { .. } => 500,
            ConductorError::Config(_) => 503,
            ConductorError::ShuttingDown => 503,
            ConductorError::UnsupportedFeature(_) => 400,
        }
    }
}
