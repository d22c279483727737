//! Core types for collection reconciliation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Class of an operation, used to decide whether a handler supports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Update,
    Delete,
}

impl OperationKind {
    /// Single-character marker used in plan listings
    pub fn symbol(&self) -> char {
        match self {
            Self::Add => '+',
            Self::Update => '~',
            Self::Delete => '-',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single effectful action against the remote collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation<K> {
    /// Key is desired but not present
    Add { key: K },
    /// Key is present on both sides; `new` carries the desired attributes
    Update { old: K, new: K },
    /// Key is present but no longer desired
    Delete { key: K },
}

impl<K> Operation<K> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Add { .. } => OperationKind::Add,
            Self::Update { .. } => OperationKind::Update,
            Self::Delete { .. } => OperationKind::Delete,
        }
    }

    /// The key this operation leaves in place (or removes, for deletes)
    pub fn key(&self) -> &K {
        match self {
            Self::Add { key } | Self::Delete { key } => key,
            Self::Update { new, .. } => new,
        }
    }

    /// Borrow the keys of this operation
    pub fn by_ref(&self) -> Operation<&K> {
        match self {
            Self::Add { key } => Operation::Add { key },
            Self::Update { old, new } => Operation::Update { old, new },
            Self::Delete { key } => Operation::Delete { key },
        }
    }
}

impl<K: Clone> Operation<&K> {
    /// Clone borrowed keys into an owned operation
    pub fn cloned(self) -> Operation<K> {
        match self {
            Operation::Add { key } => Operation::Add { key: key.clone() },
            Operation::Update { old, new } => Operation::Update {
                old: old.clone(),
                new: new.clone(),
            },
            Operation::Delete { key } => Operation::Delete { key: key.clone() },
        }
    }
}

impl<K: PartialEq> Operation<K> {
    /// An update whose old and new keys are identical changes nothing
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Update { old, new } if old == new)
    }
}

impl<K: fmt::Display> fmt::Display for Operation<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { key } => write!(f, "add {key}"),
            Self::Update { old, new } => write!(f, "update {old} -> {new}"),
            Self::Delete { key } => write!(f, "delete {key}"),
        }
    }
}

/// Shared flag used to stop a pass between callback invocations
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for a reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Compute the operations without invoking any callback
    pub dry_run: bool,
    /// Stop before the next callback once this instant has passed
    pub deadline: Option<Instant>,
    /// Stop before the next callback once this token is cancelled
    pub cancel: Option<CancelToken>,
}

impl ReconcileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline relative to now
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Counts of operations performed by one or more passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Operations whose class had no handler
    pub skipped: usize,
    pub failed: usize,
}

impl ReconcileSummary {
    /// Count one operation of the given kind
    pub fn add_operation(&mut self, kind: OperationKind) {
        match kind {
            OperationKind::Add => self.added += 1,
            OperationKind::Update => self.updated += 1,
            OperationKind::Delete => self.deleted += 1,
        }
    }

    pub fn total_changes(&self) -> usize {
        self.added + self.updated + self.deleted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ReconcileSummary) {
        self.added += other.added;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// What a completed pass did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport<K> {
    /// Whether callbacks were withheld
    pub dry_run: bool,
    /// Operations whose callback succeeded, or would have run in a dry run
    pub operations: Vec<Operation<K>>,
    /// Operations dropped because the handler does not support their class
    pub skipped: Vec<Operation<K>>,
}

impl<K> Default for ReconcileReport<K> {
    fn default() -> Self {
        Self {
            dry_run: false,
            operations: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<K> ReconcileReport<K> {
    pub fn summary(&self) -> ReconcileSummary {
        let mut summary = ReconcileSummary {
            skipped: self.skipped.len(),
            ..Default::default()
        };
        for operation in &self.operations {
            summary.add_operation(operation.kind());
        }
        summary
    }
}
