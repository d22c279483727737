//! Error types for reconciliation passes

use crate::types::{Operation, ReconcileReport};
use std::fmt;
use thiserror::Error;

/// One callback that returned an error
#[derive(Debug)]
pub struct OperationFailure<K> {
    pub operation: Operation<K>,
    pub error: anyhow::Error,
}

impl<K> fmt::Display for OperationFailure<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

/// Callback failures of a pass, in invocation order
///
/// Displays as the newline-joined failure messages.
#[derive(Debug)]
pub struct Failures<K>(Vec<OperationFailure<K>>);

impl<K> Failures<K> {
    pub(crate) fn new(failures: Vec<OperationFailure<K>>) -> Self {
        Self(failures)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OperationFailure<K>> {
        self.0.iter()
    }

    /// Individual failure messages, in invocation order
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn into_inner(self) -> Vec<OperationFailure<K>> {
        self.0
    }
}

impl<K> fmt::Display for Failures<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl<'a, K> IntoIterator for &'a Failures<K> {
    type Item = &'a OperationFailure<K>;
    type IntoIter = std::slice::Iter<'a, OperationFailure<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Errors that end a reconciliation pass
///
/// Every variant carries the report of what did succeed, so partial
/// progress stays visible to the caller.
#[derive(Error, Debug)]
pub enum ReconcileError<K: fmt::Debug> {
    /// The pass ran to completion but one or more callbacks failed
    #[error("{failures}")]
    Failed {
        failures: Failures<K>,
        report: ReconcileReport<K>,
    },

    /// The cancel token tripped before the pass finished
    #[error("reconciliation cancelled after {} operations", .report.operations.len())]
    Cancelled {
        failures: Failures<K>,
        report: ReconcileReport<K>,
    },

    /// The deadline passed before the pass finished
    #[error("reconciliation deadline exceeded after {} operations", .report.operations.len())]
    DeadlineExceeded {
        failures: Failures<K>,
        report: ReconcileReport<K>,
    },
}

impl<K: fmt::Debug> ReconcileError<K> {
    /// Callback failures recorded before the pass ended
    pub fn failures(&self) -> &Failures<K> {
        match self {
            Self::Failed { failures, .. }
            | Self::Cancelled { failures, .. }
            | Self::DeadlineExceeded { failures, .. } => failures,
        }
    }

    /// Operations that succeeded before the pass ended
    pub fn report(&self) -> &ReconcileReport<K> {
        match self {
            Self::Failed { report, .. }
            | Self::Cancelled { report, .. }
            | Self::DeadlineExceeded { report, .. } => report,
        }
    }

    /// Number of operations that succeeded before the pass ended
    pub fn applied(&self) -> usize {
        self.report().operations.len()
    }

    /// Whether the pass stopped early rather than running to completion
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::DeadlineExceeded { .. })
    }
}

/// Result type for reconciliation passes
pub type Result<T, K> = std::result::Result<T, ReconcileError<K>>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn failure(key: &str, message: &str) -> OperationFailure<String> {
        OperationFailure {
            operation: Operation::Delete {
                key: key.to_string(),
            },
            error: anyhow!("{message}"),
        }
    }

    #[test]
    fn test_failed_message_is_newline_joined() {
        let err = ReconcileError::Failed {
            failures: Failures::new(vec![
                failure("a", "cannot delete a"),
                failure("b", "cannot delete b"),
            ]),
            report: ReconcileReport::default(),
        };
        assert_eq!(err.to_string(), "cannot delete a\ncannot delete b");
        assert_eq!(err.failures().len(), 2);
        assert!(!err.is_interrupted());
    }

    #[test]
    fn test_failure_message_includes_context() {
        let error = anyhow!("404 not found").context("deleting alias www");
        let failure = OperationFailure {
            operation: Operation::Delete {
                key: "www".to_string(),
            },
            error,
        };
        assert_eq!(failure.to_string(), "deleting alias www: 404 not found");
    }

    #[test]
    fn test_interrupted_variants() {
        let report = ReconcileReport {
            operations: vec![
                Operation::Add { key: "a".to_string() },
                Operation::Add { key: "b".to_string() },
                Operation::Add { key: "c".to_string() },
            ],
            ..Default::default()
        };
        let err = ReconcileError::Cancelled {
            failures: Failures::new(vec![failure("x", "boom")]),
            report,
        };
        assert!(err.is_interrupted());
        assert_eq!(err.applied(), 3);
        assert_eq!(err.to_string(), "reconciliation cancelled after 3 operations");
        assert_eq!(err.failures().messages(), vec!["boom".to_string()]);
    }
}
