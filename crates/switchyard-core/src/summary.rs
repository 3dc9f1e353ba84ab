//! Audit trail of one handler match attempt.
//!
//! The router creates a fresh [`HandlerSummary`] for every registration it
//! tries and records one [`CheckLine`] per gate:
//!
//! ```text
//! ✓ job scope matched (job_id=pump-1)
//! ✓ context type matched (context_type=MessageContext)
//! ✗ custom context filter failed (filters=1)
//! ```
//!
//! Errors captured by a gate are kept apart from the rendered text so log
//! lines stay free of raw error dumps.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::error::{AggregateError, SharedError};

/// One pass/fail entry of a [`HandlerSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLine {
    passed: bool,
    description: String,
    members: Vec<(String, String)>,
    reason: Option<String>,
}

impl CheckLine {
    fn new(passed: bool, description: impl Into<String>) -> Self {
        Self {
            passed,
            description: description.into(),
            members: Vec::new(),
            reason: None,
        }
    }

    /// Attaches a structured `key=value` member.
    pub fn member(&mut self, key: impl Into<String>, value: impl fmt::Display) -> &mut Self {
        self.members.push((key.into(), value.to_string()));
        self
    }

    /// Attaches a short reason, rendered after the members.
    pub fn reason(&mut self, reason: impl Into<String>) -> &mut Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns `true` if the check passed.
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Returns the check description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the structured members.
    pub fn members(&self) -> &[(String, String)] {
        &self.members
    }
}

impl fmt::Display for CheckLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { '✓' } else { '✗' };
        write!(f, "{mark} {}", self.description)?;

        if !self.members.is_empty() {
            f.write_str(" (")?;
            for (i, (key, value)) in self.members.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str(")")?;
        }

        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

/// Ordered pass/fail record of one match attempt, plus the errors it captured.
#[derive(Debug, Clone, Default)]
pub struct HandlerSummary {
    lines: Vec<CheckLine>,
    errors: Vec<SharedError>,
}

impl HandlerSummary {
    /// Creates an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a passed check.
    pub fn add_passed(&mut self, description: impl Into<String>) -> &mut CheckLine {
        self.push(CheckLine::new(true, description))
    }

    /// Records a failed check.
    pub fn add_failed(&mut self, description: impl Into<String>) -> &mut CheckLine {
        self.push(CheckLine::new(false, description))
    }

    /// Records a failed check and captures the error that caused it.
    pub fn add_failed_with(
        &mut self,
        error: SharedError,
        description: impl Into<String>,
    ) -> &mut CheckLine {
        self.errors.push(error);
        self.push(CheckLine::new(false, description))
    }

    fn push(&mut self, line: CheckLine) -> &mut CheckLine {
        self.lines.push(line);
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    /// Returns the recorded checks in order.
    pub fn lines(&self) -> &[CheckLine] {
        &self.lines
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns `true` if every recorded check passed.
    pub fn all_passed(&self) -> bool {
        self.lines.iter().all(CheckLine::passed)
    }

    /// Returns the captured errors in capture order.
    pub fn errors(&self) -> &[SharedError] {
        &self.errors
    }

    /// Returns the captured error: the error itself when exactly one was
    /// captured, an [`AggregateError`] when several were.
    pub fn captured_error(&self) -> Option<SharedError> {
        match self.errors.as_slice() {
            [] => None,
            [single] => Some(Arc::clone(single)),
            many => Some(Arc::new(AggregateError::new(many.to_vec()))
                as Arc<dyn StdError + Send + Sync>),
        }
    }
}

impl fmt::Display for HandlerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}
