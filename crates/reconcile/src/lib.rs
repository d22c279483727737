//! # Reconcile
//!
//! Converge a managed child collection (aliases, tags, team members) from
//! its current keys to its desired keys.
//!
//! ## Core Concepts
//!
//! - **Key**: a totally ordered identifier of one collection element
//! - **Operation**: `Add`, `Update` or `Delete` of a single key
//! - **Handler**: performs each operation against the remote system
//! - **Plan**: the operations a pass would perform, without side effects
//!
//! Both collections are sorted and walked together. Keys present on both
//! sides are updated, keys only desired are added and keys only current are
//! deleted, all in ascending key order. Every key is touched at most once
//! per pass. A failing callback does not stop the pass; all failures are
//! returned together at the end.
//!
//! ## Example
//!
//! ```
//! use reconcile::{Callbacks, Operation, plan, reconcile};
//!
//! let current = vec!["api".to_string(), "old".to_string()];
//! let desired = vec!["www".to_string(), "api".to_string()];
//!
//! let preview = plan(current.clone(), desired.clone());
//! assert_eq!(preview.operations[0], Operation::Update {
//!     old: "api".to_string(),
//!     new: "api".to_string(),
//! });
//!
//! let mut callbacks = Callbacks::new()
//!     .on_add(|alias: &String| {
//!         println!("create alias {alias}");
//!         Ok(())
//!     })
//!     .on_delete(|alias: &String| {
//!         println!("delete alias {alias}");
//!         Ok(())
//!     });
//!
//! let report = reconcile(current, desired, &mut callbacks).unwrap();
//! assert_eq!(report.summary().added, 1);
//! assert_eq!(report.summary().deleted, 1);
//! assert_eq!(report.skipped.len(), 1); // no update callback
//! ```
//!
//! ## Composite Keys
//!
//! [`reconcile_by`] takes a comparator. Keys that compare equal are the
//! same element, so [`Tag::by_key`] matches tags by key and reports a value
//! change as one update.

pub mod diff;
pub mod error;
pub mod executor;
pub mod handler;
pub mod tag;
pub mod types;

// Re-export main types at crate root
pub use diff::{DiffSummary, Plan, SortedMerge, plan, plan_by, sort_keys};
pub use error::{Failures, OperationFailure, ReconcileError};
pub use executor::{reconcile, reconcile_by, reconcile_with};
pub use handler::{Callbacks, Handler, NoOp};
pub use tag::{Tag, TagParseError, parse_tags};
pub use types::{
    CancelToken, Operation, OperationKind, ReconcileOptions, ReconcileReport, ReconcileSummary,
};
