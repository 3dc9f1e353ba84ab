//! Processing results handed back to the transport.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SharedError;

/// Why a message could not be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageProcessingError {
    /// The handler broke, was cancelled or panicked.
    ProcessingInterrupted,
    /// No registration accepted the message.
    CannotFindMatchedHandler,
    /// A registration accepted the message but its handler reported failure.
    MatchedHandlerFailed,
}

impl MessageProcessingError {
    /// Returns the stable name of this error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessingInterrupted => "ProcessingInterrupted",
            Self::CannotFindMatchedHandler => "CannotFindMatchedHandler",
            Self::MatchedHandlerFailed => "MatchedHandlerFailed",
        }
    }
}

impl fmt::Display for MessageProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal outcome of routing one message.
///
/// Constructed once by the router and never changed afterwards. The
/// transport decides from [`is_successful`](Self::is_successful) and
/// [`error`](Self::error) whether to acknowledge, abandon or dead-letter.
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    /// A handler processed the message.
    Success {
        /// The processed message.
        message_id: String,
    },
    /// The message was not processed.
    Failure {
        /// The unprocessed message.
        message_id: String,
        /// The failure classification.
        error: MessageProcessingError,
        /// Human-readable description.
        message: String,
        /// The captured cause, if any.
        cause: Option<SharedError>,
    },
}

impl ProcessingResult {
    /// Creates a successful result.
    pub fn success(message_id: impl Into<String>) -> Self {
        Self::Success {
            message_id: message_id.into(),
        }
    }

    /// Creates a failed result without a cause.
    pub fn failure(
        message_id: impl Into<String>,
        error: MessageProcessingError,
        message: impl Into<String>,
    ) -> Self {
        Self::Failure {
            message_id: message_id.into(),
            error,
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a failed result with a captured cause.
    pub fn failure_with(
        message_id: impl Into<String>,
        error: MessageProcessingError,
        message: impl Into<String>,
        cause: SharedError,
    ) -> Self {
        Self::Failure {
            message_id: message_id.into(),
            error,
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// Returns `true` if the message was processed.
    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the identifier of the routed message.
    pub fn message_id(&self) -> &str {
        match self {
            Self::Success { message_id } | Self::Failure { message_id, .. } => message_id,
        }
    }

    /// Returns the failure classification, if any.
    pub fn error(&self) -> Option<MessageProcessingError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(*error),
        }
    }

    /// Returns the failure description, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }

    /// Returns the captured cause, if any.
    pub fn cause(&self) -> Option<&SharedError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { cause, .. } => cause.as_ref(),
        }
    }
}

/// Results compare field by field; causes compare by their rendered text
/// (or by identity when both point at the same error).
impl PartialEq for ProcessingResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Success { message_id: a }, Self::Success { message_id: b }) => a == b,
            (
                Self::Failure {
                    message_id: id_a,
                    error: err_a,
                    message: msg_a,
                    cause: cause_a,
                },
                Self::Failure {
                    message_id: id_b,
                    error: err_b,
                    message: msg_b,
                    cause: cause_b,
                },
            ) => {
                id_a == id_b
                    && err_a == err_b
                    && msg_a == msg_b
                    && match (cause_a, cause_b) {
                        (None, None) => true,
                        (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a.to_string() == b.to_string(),
                        _ => false,
                    }
            }
            _ => false,
        }
    }
}

impl fmt::Display for ProcessingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { message_id } => write!(f, "message '{message_id}' processed"),
            Self::Failure {
                message_id,
                error,
                message,
                ..
            } => write!(f, "message '{message_id}' failed ({error}): {message}"),
        }
    }
}
