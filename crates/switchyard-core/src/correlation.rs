//! Correlation information carried alongside each message.

use serde::{Deserialize, Serialize};

/// The correlation triple of one message.
///
/// The router never inspects these values; they are handed to the matched
/// handler untouched so it can continue the caller's trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageCorrelation {
    operation_id: String,
    transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation_parent_id: Option<String>,
}

impl MessageCorrelation {
    /// Creates correlation information without a parent operation.
    pub fn new(operation_id: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            transaction_id: transaction_id.into(),
            operation_parent_id: None,
        }
    }

    /// Sets the parent operation (builder pattern).
    pub fn with_parent(mut self, operation_parent_id: impl Into<String>) -> Self {
        self.operation_parent_id = Some(operation_parent_id.into());
        self
    }

    /// Returns the operation identifier.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Returns the transaction identifier.
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Returns the parent operation identifier, if any.
    pub fn operation_parent_id(&self) -> Option<&str> {
        self.operation_parent_id.as_deref()
    }
}
