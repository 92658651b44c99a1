//! Event error types.

use thiserror::Error;

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;

/// Error type for event handling.
#[derive(Debug, Error)]
pub enum EventError {
    /// A handler failed while processing an event. Dispatch stops at the
    /// first failing handler.
    #[error("Handler '{handler}' failed: {message}")]
    HandlerFailed {
        /// Identifier of the failing handler.
        handler: String,
        /// Error message reported by the handler.
        message: String,
    },

    /// Event serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The source type is not present in the source registry.
    #[error("Unknown source type: {0}")]
    UnknownSource(String),

    /// The source type does not publish the named event.
    #[error("Source type '{source_type}' does not publish event '{event}'")]
    UnknownEvent {
        /// Source type identifier.
        source_type: String,
        /// Event name.
        event: String,
    },
}

impl EventError {
    /// Creates a handler failure for the given handler id.
    pub fn handler(handler: impl Into<String>, message: impl Into<String>) -> Self {
        EventError::HandlerFailed {
            handler: handler.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::SerializationError(err.to_string())
    }
}
