/// Failures the streaming core can observe.
///
/// None of these abort the process: each one degrades to a visible,
/// finalized transcript entry or is discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Record payload was not a structured object; rendered as an informational note.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },
    /// Transport ended in the middle of a record; the partial tail is dropped.
    #[error("stream truncated: discarded {discarded_bytes} bytes of an incomplete record")]
    TruncatedStream { discarded_bytes: usize },
    /// Chunk source reported a hard error or the request was rejected.
    #[error("transport failure: {message}")]
    TransportFailure {
        message: String,
        status_code: Option<u16>,
    },
    /// Events arrived in an order the turn lifecycle did not expect.
    #[error("unexpected event ordering: {message}")]
    UnexpectedEventOrdering { message: String },
    /// A new turn was started before the previous one finalized or was abandoned.
    #[error("a turn is already in progress")]
    TurnInProgress,
    /// Invalid endpoint configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl StreamError {
    /// Creates a malformed-record error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Creates a transport failure without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a transport failure for a rejected HTTP response.
    pub fn http_status(status_code: u16, message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Creates an event-ordering error.
    pub fn ordering(message: impl Into<String>) -> Self {
        Self::UnexpectedEventOrdering {
            message: message.into(),
        }
    }

    /// Returns the message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::TransportFailure { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
