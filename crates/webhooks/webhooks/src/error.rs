//! Webhook error types.

use thiserror::Error;

/// Result type for webhook operations.
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Error type for webhook operations.
///
/// Validation failures are not errors; they are reported through
/// [`ValidationErrors`](crate::ValidationErrors) on the entity.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No webhook with this id.
    #[error("No webhook exists with the ID \"{0}\"")]
    NotFound(u64),

    /// No group with this id.
    #[error("No webhook group exists with the ID \"{0}\"")]
    GroupNotFound(u64),

    /// Invalid payload.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The job queue could not accept or return a job.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered outside the 2xx range.
    #[error("Unexpected response status {status} from {url}")]
    UnexpectedStatus {
        /// Response status code.
        status: u16,
        /// Target URL.
        url: String,
    },

    /// The attempt exceeded its deadline.
    #[error("Request timeout")]
    Timeout,

    /// Registry storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WebhookError {
    /// Checks if this is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WebhookError::NotFound(_) | WebhookError::GroupNotFound(_))
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::InvalidPayload(err.to_string())
    }
}

#[cfg(feature = "http-client")]
impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WebhookError::Timeout
        } else {
            WebhookError::Http(err.to_string())
        }
    }
}

impl From<crate::queue::QueueError> for WebhookError {
    fn from(err: crate::queue::QueueError) -> Self {
        WebhookError::Queue(err.0)
    }
}
