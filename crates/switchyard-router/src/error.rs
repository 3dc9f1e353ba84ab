//! Errors captured by the gate chain.
//!
//! None of these leave the router as an `Err`: they are recorded in the
//! attempt's [`HandlerSummary`](switchyard_core::HandlerSummary) and the
//! registration is skipped.

use std::any::Any;

use thiserror::Error;

use crate::filter::FilterAxis;

/// A gate broke instead of answering.
#[derive(Debug, Error)]
pub enum GateError {
    /// A context or body predicate panicked.
    #[error("{axis} filter #{index} panicked: {message}")]
    PredicatePanicked {
        axis: FilterAxis,
        /// Position of the predicate in its chain.
        index: usize,
        /// Rendered panic payload.
        message: String,
    },

    /// A custom deserializer panicked.
    #[error("custom deserializer panicked: {0}")]
    DeserializerPanicked(String),

    /// A custom deserializer succeeded with a value of another type.
    #[error("custom deserializer returned a value that is not '{expected}'")]
    UnexpectedMessageType {
        /// The registration's message type.
        expected: &'static str,
    },
}

/// Renders a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(static_str.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_gate_error_display() {
        let err = GateError::PredicatePanicked {
            axis: FilterAxis::Context,
            index: 0,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "context filter #0 panicked: boom");

        let err = GateError::PredicatePanicked {
            axis: FilterAxis::Body,
            index: 2,
            message: "bad".into(),
        };
        assert_eq!(err.to_string(), "body filter #2 panicked: bad");
    }
}
