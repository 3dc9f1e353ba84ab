//! Ordered predicate lists for the context and body gates.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::panic_message;

/// A type-erased predicate.
pub type PredicateFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Which gate a [`FilterChain`] guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterAxis {
    /// Predicates over the routing context.
    Context,
    /// Predicates over the deserialized message.
    Body,
}

impl FilterAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Body => "body",
        }
    }

    /// Gate description used in summary lines.
    pub fn gate(&self) -> &'static str {
        match self {
            Self::Context => "custom context filter",
            Self::Body => "custom body filter",
        }
    }
}

impl fmt::Display for FilterAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating a [`FilterChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// No predicate configured.
    Unfiltered,
    /// Every predicate returned `true`.
    Passed,
    /// The predicate at `index` returned `false`.
    Rejected { index: usize },
    /// The predicate at `index` panicked.
    Panicked { index: usize, message: String },
}

/// Predicates combined with logical AND, evaluated in insertion order.
///
/// Evaluation stops at the first predicate that does not return `true`.
pub struct FilterChain<T: ?Sized> {
    predicates: Vec<PredicateFn<T>>,
}

impl<T: ?Sized> FilterChain<T> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Appends a predicate.
    pub fn push<F>(&mut self, predicate: F)
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
    }

    /// Returns the number of predicates.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Returns `true` if no predicate is configured.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluates the chain against `value`.
    pub fn evaluate(&self, value: &T) -> FilterOutcome {
        if self.predicates.is_empty() {
            return FilterOutcome::Unfiltered;
        }

        for (index, predicate) in self.predicates.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| predicate(value))) {
                Ok(true) => {}
                Ok(false) => return FilterOutcome::Rejected { index },
                Err(payload) => {
                    return FilterOutcome::Panicked {
                        index,
                        message: panic_message(payload.as_ref()),
                    };
                }
            }
        }
        FilterOutcome::Passed
    }
}

impl<T: ?Sized> Default for FilterChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for FilterChain<T> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for FilterChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("len", &self.predicates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_chain_is_unfiltered() {
        let chain = FilterChain::<u32>::new();
        assert!(chain.is_empty());
        assert_eq!(chain.evaluate(&1), FilterOutcome::Unfiltered);
    }

    #[test]
    fn test_all_predicates_must_pass() {
        let mut chain = FilterChain::<u32>::new();
        chain.push(|n| *n > 1);
        chain.push(|n| *n % 2 == 0);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.evaluate(&4), FilterOutcome::Passed);
        assert_eq!(chain.evaluate(&3), FilterOutcome::Rejected { index: 1 });
        assert_eq!(chain.evaluate(&0), FilterOutcome::Rejected { index: 0 });
    }

    #[test]
    fn test_short_circuits_on_first_rejection() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut chain = FilterChain::<u32>::new();
        chain.push(|_| false);
        chain.push(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert_eq!(chain.evaluate(&1), FilterOutcome::Rejected { index: 0 });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_predicate_is_contained() {
        let mut chain = FilterChain::<str>::new();
        chain.push(|s| !s.is_empty());
        chain.push(|_| panic!("bad predicate"));
        assert_eq!(
            chain.evaluate("x"),
            FilterOutcome::Panicked {
                index: 1,
                message: "bad predicate".to_string()
            }
        );
    }

    #[test]
    fn test_axis_labels() {
        assert_eq!(FilterAxis::Context.gate(), "custom context filter");
        assert_eq!(FilterAxis::Body.gate(), "custom body filter");
        assert_eq!(FilterAxis::Context.to_string(), "context");
        assert_eq!(FilterAxis::Body.to_string(), "body");
    }
}
