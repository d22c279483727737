//! Reconciliation engine - applies the sorted-merge diff through a handler

use crate::diff::{SortedMerge, sort_keys};
use crate::error::{Failures, OperationFailure, ReconcileError, Result};
use crate::handler::Handler;
use crate::types::{Operation, ReconcileOptions, ReconcileReport};
use std::cmp::Ordering;
use std::fmt;
use std::time::Instant;

/// Reconcile naturally ordered keys with default options
///
/// Sorts both collections, walks them in ascending order and invokes the
/// handler at most once per key. Callback failures do not stop the pass;
/// they are collected and returned together as [`ReconcileError::Failed`].
pub fn reconcile<K, H>(
    current: impl IntoIterator<Item = K>,
    desired: impl IntoIterator<Item = K>,
    handler: &mut H,
) -> Result<ReconcileReport<K>, K>
where
    K: Ord + Clone + fmt::Debug,
    H: Handler<K> + ?Sized,
{
    reconcile_by(current, desired, K::cmp, handler, &ReconcileOptions::default())
}

/// Reconcile naturally ordered keys with explicit options
pub fn reconcile_with<K, H>(
    current: impl IntoIterator<Item = K>,
    desired: impl IntoIterator<Item = K>,
    handler: &mut H,
    options: &ReconcileOptions,
) -> Result<ReconcileReport<K>, K>
where
    K: Ord + Clone + fmt::Debug,
    H: Handler<K> + ?Sized,
{
    reconcile_by(current, desired, K::cmp, handler, options)
}

/// Reconcile keys ordered by an injected comparator
///
/// Keys comparing `Equal` are treated as the same element and produce an
/// update, even when they are not `==`. This lets composite keys such as
/// tags be matched on identity while carrying differing attributes.
pub fn reconcile_by<K, F, H>(
    current: impl IntoIterator<Item = K>,
    desired: impl IntoIterator<Item = K>,
    mut cmp: F,
    handler: &mut H,
    options: &ReconcileOptions,
) -> Result<ReconcileReport<K>, K>
where
    K: Clone + fmt::Debug,
    F: FnMut(&K, &K) -> Ordering,
    H: Handler<K> + ?Sized,
{
    let current = sort_keys(current, &mut cmp);
    let desired = sort_keys(desired, &mut cmp);

    log::debug!(
        "Reconciling {} current against {} desired keys{}",
        current.len(),
        desired.len(),
        if options.dry_run { " (dry run)" } else { "" }
    );

    let mut report = ReconcileReport {
        dry_run: options.dry_run,
        ..Default::default()
    };
    let mut failures = Vec::new();

    for operation in SortedMerge::new(&current, &desired, &mut cmp) {
        if !handler.handles(operation.kind()) {
            log::trace!("Skipping {:?}: no {} handler", operation, operation.kind());
            report.skipped.push(operation.cloned());
            continue;
        }

        if options.dry_run {
            report.operations.push(operation.cloned());
            continue;
        }

        if let Some(stop) = interruption(options) {
            log::warn!(
                "Reconciliation stopped after {} operations: {stop}",
                report.operations.len()
            );
            let failures = Failures::new(failures);
            return Err(match stop {
                Interruption::Cancelled => ReconcileError::Cancelled { failures, report },
                Interruption::Deadline => ReconcileError::DeadlineExceeded { failures, report },
            });
        }

        log::debug!("Applying {operation:?}");
        let result = match operation {
            Operation::Add { key } => handler.add(key),
            Operation::Update { old, new } => handler.update(old, new),
            Operation::Delete { key } => handler.delete(key),
        };

        match result {
            Ok(()) => report.operations.push(operation.cloned()),
            Err(error) => {
                log::warn!("Failed to {} {:?}: {:#}", operation.kind(), operation.key(), error);
                failures.push(OperationFailure {
                    operation: operation.cloned(),
                    error,
                });
            }
        }
    }

    let summary = report.summary();
    log::info!(
        "Reconciled: {} added, {} updated, {} deleted, {} skipped, {} failed",
        summary.added,
        summary.updated,
        summary.deleted,
        summary.skipped,
        failures.len()
    );

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(ReconcileError::Failed {
            failures: Failures::new(failures),
            report,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Interruption {
    Cancelled,
    Deadline,
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::Deadline => f.write_str("deadline exceeded"),
        }
    }
}

/// Check the cancel token, then the deadline
fn interruption(options: &ReconcileOptions) -> Option<Interruption> {
    if options.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
        return Some(Interruption::Cancelled);
    }
    if options.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return Some(Interruption::Deadline);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Callbacks;
    use crate::types::{CancelToken, OperationKind};
    use anyhow::bail;
    use std::cell::RefCell;
    use std::time::Duration;

    /// Records every invocation; fails the keys listed in `fail`
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail: Vec<&'static str>,
        skip: Vec<OperationKind>,
        cancel_after: Option<(usize, CancelToken)>,
    }

    impl Recorder {
        fn failing(keys: &[&'static str]) -> Self {
            Self {
                fail: keys.to_vec(),
                ..Default::default()
            }
        }

        fn record(&mut self, call: String, key: &str) -> anyhow::Result<()> {
            self.calls.push(call.clone());
            if let Some((after, token)) = &self.cancel_after
                && self.calls.len() >= *after
            {
                token.cancel();
            }
            if self.fail.iter().any(|f| *f == key) {
                bail!("{call} failed");
            }
            Ok(())
        }
    }

    impl Handler<&'static str> for Recorder {
        fn handles(&self, kind: OperationKind) -> bool {
            !self.skip.contains(&kind)
        }

        fn add(&mut self, key: &&'static str) -> anyhow::Result<()> {
            self.record(format!("add({key})"), key)
        }

        fn update(&mut self, old: &&'static str, new: &&'static str) -> anyhow::Result<()> {
            self.record(format!("update({old},{new})"), old)
        }

        fn delete(&mut self, key: &&'static str) -> anyhow::Result<()> {
            self.record(format!("delete({key})"), key)
        }
    }

    #[test]
    fn test_identical_sets_only_update() {
        let set = vec!["c", "a", "b"];
        let mut recorder = Recorder::default();
        let report = reconcile(set.clone(), set, &mut recorder).unwrap();

        assert_eq!(recorder.calls, vec!["update(a,a)", "update(b,b)", "update(c,c)"]);
        assert_eq!(report.summary().updated, 3);
        assert_eq!(report.summary().added + report.summary().deleted, 0);
    }

    #[test]
    fn test_identical_sets_without_update_do_nothing() {
        let mut recorder = Recorder {
            skip: vec![OperationKind::Update],
            ..Default::default()
        };
        let report = reconcile(vec!["a", "b"], vec!["b", "a"], &mut recorder).unwrap();
        assert!(recorder.calls.is_empty());
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn test_empty_desired_deletes_in_order() {
        let mut recorder = Recorder {
            skip: vec![OperationKind::Add, OperationKind::Update],
            ..Default::default()
        };
        reconcile(vec!["b", "c", "a"], Vec::new(), &mut recorder).unwrap();
        assert_eq!(recorder.calls, vec!["delete(a)", "delete(b)", "delete(c)"]);
    }

    #[test]
    fn test_empty_current_adds_in_order() {
        let mut recorder = Recorder {
            skip: vec![OperationKind::Update, OperationKind::Delete],
            ..Default::default()
        };
        reconcile(Vec::new(), vec!["y", "x"], &mut recorder).unwrap();
        assert_eq!(recorder.calls, vec!["add(x)", "add(y)"]);
    }

    #[test]
    fn test_missing_callback_skips_class() {
        let mut callbacks = Callbacks::new();
        let report = reconcile(vec!["a"], Vec::new(), &mut callbacks).unwrap();
        assert!(report.operations.is_empty());
        assert_eq!(report.skipped, vec![Operation::Delete { key: "a" }]);
    }

    #[test]
    fn test_exclusive_callbacks_in_sorted_order() {
        let mut recorder = Recorder::default();
        reconcile(vec!["m", "d", "a"], vec!["z", "a", "b", "m"], &mut recorder).unwrap();
        assert_eq!(
            recorder.calls,
            vec!["update(a,a)", "add(b)", "delete(d)", "update(m,m)", "add(z)"]
        );
    }

    #[test]
    fn test_failures_accumulate_and_pass_continues() {
        let mut recorder = Recorder::failing(&["a"]);
        let err = reconcile(vec!["a", "b"], vec!["b", "c"], &mut recorder).unwrap_err();

        assert_eq!(recorder.calls, vec!["delete(a)", "update(b,b)", "add(c)"]);
        assert!(err.to_string().contains("delete(a) failed"));
        assert!(!err.is_interrupted());
        assert_eq!(err.applied(), 2);

        let failures: Vec<_> = err.failures().iter().map(|f| f.operation).collect();
        assert_eq!(failures, vec![Operation::Delete { key: "a" }]);
    }

    #[test]
    fn test_multiple_failures_join_in_invocation_order() {
        let mut recorder = Recorder::failing(&["a", "c"]);
        let err = reconcile(vec!["a"], vec!["c"], &mut recorder).unwrap_err();
        assert_eq!(err.to_string(), "delete(a) failed\nadd(c) failed");
    }

    #[test]
    fn test_dry_run_invokes_nothing() {
        let mut recorder = Recorder {
            skip: vec![OperationKind::Delete],
            ..Default::default()
        };
        let options = ReconcileOptions::new().dry_run(true);
        let report = reconcile_with(vec!["a", "b"], vec!["b", "c"], &mut recorder, &options).unwrap();

        assert!(recorder.calls.is_empty());
        assert!(report.dry_run);
        assert_eq!(
            report.operations,
            vec![Operation::Update { old: "b", new: "b" }, Operation::Add { key: "c" }]
        );
        assert_eq!(report.skipped, vec![Operation::Delete { key: "a" }]);
    }

    #[test]
    fn test_cancel_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let options = ReconcileOptions::new().cancel_token(token);
        let mut recorder = Recorder::default();

        let err = reconcile_with(vec!["a"], vec!["b"], &mut recorder, &options).unwrap_err();
        assert!(recorder.calls.is_empty());
        assert!(matches!(err, ReconcileError::Cancelled { .. }));
        assert_eq!(err.applied(), 0);
    }

    #[test]
    fn test_cancel_between_callbacks() {
        let token = CancelToken::new();
        let mut recorder = Recorder {
            cancel_after: Some((2, token.clone())),
            fail: vec!["a"],
            ..Default::default()
        };
        let options = ReconcileOptions::new().cancel_token(token);

        let err = reconcile_with(
            Vec::new(),
            vec!["a", "b", "c", "d"],
            &mut recorder,
            &options,
        )
        .unwrap_err();

        assert_eq!(recorder.calls, vec!["add(a)", "add(b)"]);
        match err {
            ReconcileError::Cancelled { failures, report } => {
                assert_eq!(report.operations, vec![Operation::Add { key: "b" }]);
                assert_eq!(failures.messages(), vec!["add(a) failed".to_string()]);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[test]
    fn test_deadline_exceeded() {
        let options = ReconcileOptions::new().deadline(Instant::now() - Duration::from_millis(1));
        let mut recorder = Recorder::default();

        let err = reconcile_with(vec!["a"], Vec::new(), &mut recorder, &options).unwrap_err();
        assert!(recorder.calls.is_empty());
        assert!(matches!(err, ReconcileError::DeadlineExceeded { .. }));
        assert_eq!(err.applied(), 0);
        assert!(err.is_interrupted());
    }

    #[test]
    fn test_generous_timeout_completes() {
        let options = ReconcileOptions::new().timeout(Duration::from_secs(60));
        let mut recorder = Recorder::default();
        reconcile_with(vec!["a"], vec!["b"], &mut recorder, &options).unwrap();
        assert_eq!(recorder.calls, vec!["delete(a)", "add(b)"]);
    }

    #[test]
    fn test_comparator_on_prefix_matches_updates() {
        let calls = RefCell::new(Vec::new());
        let mut callbacks = Callbacks::new()
            .on_add(|k: &&str| {
                calls.borrow_mut().push(format!("add({k})"));
                Ok(())
            })
            .on_update(|o: &&str, n: &&str| {
                calls.borrow_mut().push(format!("update({o},{n})"));
                Ok(())
            })
            .on_delete(|k: &&str| {
                calls.borrow_mut().push(format!("delete({k})"));
                Ok(())
            });

        let name = |s: &str| s.split(':').next().unwrap_or_default().to_string();
        let by_name = |a: &&str, b: &&str| name(*a).cmp(&name(*b));
        reconcile_by(
            vec!["x:1", "y:2"],
            vec!["y:3", "z:4"],
            by_name,
            &mut callbacks,
            &ReconcileOptions::default(),
        )
        .unwrap();

        assert_eq!(
            *calls.borrow(),
            vec!["delete(x:1)", "update(y:2,y:3)", "add(z:4)"]
        );
    }
}
