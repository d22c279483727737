//! Execution engine for converge
//!
//! The engine orchestrates:
//! 1. Planning - Pair each configured collection with its stored members
//! 2. Passing - Run one reconciliation pass per collection
//! 3. Executing - Run independent passes in parallel and report

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, execute};
pub use planner::ExecutionPlan;

use anyhow::{Context, Result};
use reconcile::{
    Operation, OperationKind, ReconcileError, ReconcileOptions, ReconcileReport, ReconcileSummary,
    Tag, parse_tags, reconcile_by, reconcile_with,
};
use serde::Serialize;
use std::fmt;

use crate::config::{CollectionKind, Policy};
use crate::state::{CollectionState, StoreHandler};

/// One operation rendered for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationLine {
    pub kind: OperationKind,
    pub key: String,
    /// Previous key for updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    /// Update that leaves the key as it is
    pub unchanged: bool,
}

impl OperationLine {
    fn from_operation<K: fmt::Display + PartialEq>(op: &Operation<K>) -> Self {
        let previous = match op {
            Operation::Update { old, .. } => Some(old.to_string()),
            _ => None,
        };
        Self {
            kind: op.kind(),
            key: op.key().to_string(),
            previous,
            unchanged: op.is_noop(),
        }
    }

    fn from_operations<K: fmt::Display + PartialEq>(ops: &[Operation<K>]) -> Vec<Self> {
        ops.iter().map(Self::from_operation).collect()
    }
}

/// A callback failure rendered for display
#[derive(Debug, Clone, Serialize)]
pub struct FailureLine {
    pub operation: OperationLine,
    pub message: String,
}

/// Result of one pass over one collection
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    pub name: String,
    pub kind: CollectionKind,
    pub dry_run: bool,
    /// Operations that succeeded, or would run in a dry run
    pub operations: Vec<OperationLine>,
    /// Operations the policy does not allow
    pub skipped: Vec<OperationLine>,
    pub failures: Vec<FailureLine>,
    /// Aggregate error text, one failure per line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the pass stopped before finishing
    pub interrupted: bool,
}

impl PassOutcome {
    fn from_result<K>(
        name: &str,
        kind: CollectionKind,
        result: Result<ReconcileReport<K>, ReconcileError<K>>,
    ) -> Self
    where
        K: fmt::Display + fmt::Debug + PartialEq,
    {
        let (report, error) = match &result {
            Ok(report) => (report, None),
            Err(err) => (err.report(), Some(err)),
        };

        let failures = error
            .map(|err| {
                err.failures()
                    .iter()
                    .map(|f| FailureLine {
                        operation: OperationLine::from_operation(&f.operation),
                        message: f.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: name.to_string(),
            kind,
            dry_run: report.dry_run,
            operations: OperationLine::from_operations(&report.operations),
            skipped: OperationLine::from_operations(&report.skipped),
            failures,
            error: error.map(ToString::to_string),
            interrupted: error.is_some_and(ReconcileError::is_interrupted),
        }
    }

    /// Outcome for a collection whose keys could not be decoded
    pub fn rejected(name: &str, kind: CollectionKind, err: &anyhow::Error) -> Self {
        Self {
            name: name.to_string(),
            kind,
            dry_run: false,
            operations: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            error: Some(format!("{err:#}")),
            interrupted: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Operations that change the collection
    pub fn changes(&self) -> impl Iterator<Item = &OperationLine> {
        self.operations.iter().filter(|line| !line.unchanged)
    }

    /// Counts with identity updates left out
    pub fn summary(&self) -> ReconcileSummary {
        let mut summary = ReconcileSummary {
            skipped: self.skipped.iter().filter(|line| !line.unchanged).count(),
            failed: self.failures.len(),
            ..Default::default()
        };
        for line in self.changes() {
            summary.add_operation(line.kind);
        }
        summary
    }
}

/// Run one pass over a collection, decoding keys for its kind
pub fn run_pass(
    name: &str,
    kind: CollectionKind,
    desired: &[String],
    state: &mut CollectionState,
    policy: Policy,
    options: &ReconcileOptions,
) -> Result<PassOutcome> {
    let outcome = match kind {
        CollectionKind::Set => {
            let current = state.members.clone();
            let mut handler = StoreHandler::new(name, state, policy);
            let result = reconcile_with(current, desired.to_vec(), &mut handler, options);
            PassOutcome::from_result(name, kind, result)
        }
        CollectionKind::Tags => {
            let current = parse_tags(&state.members)
                .with_context(|| format!("Stored tags of '{name}' are invalid"))?;
            let desired = parse_tags(desired)
                .with_context(|| format!("Desired tags of '{name}' are invalid"))?;
            canonicalize_tags(name, state, &current);

            let mut handler = StoreHandler::new(name, state, policy);
            let result = reconcile_by(current, desired, Tag::by_key, &mut handler, options);
            PassOutcome::from_result(name, kind, result)
        }
    };

    Ok(outcome)
}

/// Rewrite stored tags in the form the handler looks them up by
fn canonicalize_tags(name: &str, state: &mut CollectionState, parsed: &[Tag]) {
    let canonical: Vec<String> = parsed.iter().map(ToString::to_string).collect();
    if canonical != state.members {
        log::debug!("Normalized stored tags of {name}");
        state.members = canonical;
    }

    for locked in &mut state.locked {
        if let Ok(tag) = locked.parse::<Tag>() {
            *locked = tag.to_string();
        }
    }
}
