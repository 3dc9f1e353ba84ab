//! Error types shared across the Switchyard crates.
//!
//! Routing outcomes are never reported through these types directly; the
//! router folds them into a [`ProcessingResult`](crate::ProcessingResult).

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A boxed error that can cross task boundaries.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// A reference-counted error, used wherever a captured cause must stay `Clone`.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

// =============================================================================
// Handler Errors
// =============================================================================

/// Errors a message handler can return from its invocation.
///
/// The variant decides how the router classifies the outcome:
///
/// | variant | classification |
/// |---------|----------------|
/// | [`Failed`](Self::Failed), [`Declined`](Self::Declined) | `MatchedHandlerFailed` |
/// | [`Cancelled`](Self::Cancelled), [`Interrupted`](Self::Interrupted), [`Panicked`](Self::Panicked) | `ProcessingInterrupted` |
///
/// A `Declined` coming from the fallback handler is reported as
/// `CannotFindMatchedHandler` instead.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler processed the message and signalled an expected failure.
    #[error("{reason}")]
    Failed {
        /// Human-readable failure reason.
        reason: String,
        /// Optional underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The handler refused to take ownership of the message.
    #[error("message declined by handler")]
    Declined,

    /// The handler observed cancellation and stopped.
    #[error("handler was cancelled")]
    Cancelled,

    /// The handler broke with an unexpected error.
    #[error("handler interrupted: {0}")]
    Interrupted(#[source] BoxError),

    /// The handler panicked; the payload is rendered into a message.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Creates a declared failure with the given reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates a declared failure carrying an underlying error.
    pub fn failed_with(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failed {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    /// Wraps an unexpected error.
    pub fn interrupted(source: impl Into<BoxError>) -> Self {
        Self::Interrupted(source.into())
    }

    /// Returns `true` if this error means processing was cut short rather
    /// than completed with a declared failure.
    pub fn is_interruption(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Interrupted(_) | Self::Panicked(_)
        )
    }
}

/// Result type returned by message handlers.
pub type HandlerResult = Result<(), HandlerError>;

// =============================================================================
// Context Errors
// =============================================================================

/// Errors raised while constructing a message context.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    /// Every message needs a non-empty identifier.
    #[error("message id must not be empty")]
    EmptyMessageId,
}

// =============================================================================
// Body Errors
// =============================================================================

/// Errors produced by the default structured-body deserializer.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The body is not valid structured text for the target type.
    #[error("body is not valid JSON for '{target}': {source}")]
    Malformed {
        /// Target type name.
        target: &'static str,
        /// The parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The body parsed, but to an empty value.
    #[error("body deserialized to an empty value for '{target}'")]
    Empty {
        /// Target type name.
        target: &'static str,
    },

    /// The body carries fields the target type does not declare.
    #[error("body contains fields unknown to '{target}': {}", .fields.join(", "))]
    UnknownFields {
        /// Target type name.
        target: &'static str,
        /// Dotted paths of the unknown fields.
        fields: Vec<String>,
    },
}

impl BodyError {
    /// Returns a short reason suitable for a summary line; the full error
    /// stays available as the captured cause.
    pub fn reason(&self) -> String {
        match self {
            Self::Malformed { .. } => "body is not valid JSON for the target type".to_string(),
            Self::Empty { .. } => "body deserialized to an empty value".to_string(),
            Self::UnknownFields { fields, .. } => format!("unknown fields: {}", fields.join(", ")),
        }
    }
}

// =============================================================================
// Aggregate Errors
// =============================================================================

/// Several errors captured during a single handler attempt.
#[derive(Debug, Clone)]
pub struct AggregateError {
    errors: Vec<SharedError>,
}

impl AggregateError {
    /// Creates an aggregate from the captured errors.
    pub fn new(errors: Vec<SharedError>) -> Self {
        Self { errors }
    }

    /// Returns the aggregated errors in capture order.
    pub fn errors(&self) -> &[SharedError] {
        &self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            write!(f, "; [{i}] {err}")?;
        }
        Ok(())
    }
}

impl StdError for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interruption_classification() {
        assert!(HandlerError::Cancelled.is_interruption());
        assert!(HandlerError::Panicked("boom".into()).is_interruption());
        assert!(HandlerError::interrupted("io").is_interruption());
        assert!(!HandlerError::failed("nope").is_interruption());
        assert!(!HandlerError::Declined.is_interruption());
    }

    #[test]
    fn test_failed_with_keeps_source() {
        let err = HandlerError::failed_with("order rejected", "stock exhausted");
        assert_eq!(err.to_string(), "order rejected");
        assert_eq!(
            err.source().map(|s| s.to_string()).as_deref(),
            Some("stock exhausted")
        );
    }

    #[test]
    fn test_unknown_fields_message() {
        let err = BodyError::UnknownFields {
            target: "Order",
            fields: vec!["extra".into(), "lines[0].note".into()],
        };
        assert_eq!(
            err.to_string(),
            "body contains fields unknown to 'Order': extra, lines[0].note"
        );
    }

    #[test]
    fn test_aggregate_display() {
        let agg = AggregateError::new(vec![
            Arc::new(HandlerError::failed("first")),
            Arc::new(HandlerError::failed("second")),
        ]);
        assert_eq!(agg.to_string(), "2 errors occurred; [0] first; [1] second");
        assert_eq!(agg.errors().len(), 2);
    }
}
