//! Sorted-merge diff between current and desired keys

use crate::types::{Operation, OperationKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Collect keys and sort them ascending by `cmp`
///
/// The sort is stable, so duplicate keys keep their relative input order.
pub fn sort_keys<K, F>(keys: impl IntoIterator<Item = K>, mut cmp: F) -> Vec<K>
where
    F: FnMut(&K, &K) -> Ordering,
{
    let mut keys: Vec<K> = keys.into_iter().collect();
    keys.sort_by(|a, b| cmp(a, b));
    keys
}

/// Two-pointer walk over sorted current and desired keys
///
/// Yields one operation per step, in ascending key order:
/// - equal keys produce `Update`
/// - a desired key smaller than the current one produces `Add`
/// - a current key smaller than the desired one produces `Delete`
///
/// Once either side is exhausted the rest of the other side drains as
/// adds or deletes. Both slices must already be sorted by `cmp`.
pub struct SortedMerge<'a, K, F> {
    current: &'a [K],
    desired: &'a [K],
    i: usize,
    j: usize,
    cmp: F,
}

impl<'a, K, F> SortedMerge<'a, K, F>
where
    F: FnMut(&K, &K) -> Ordering,
{
    pub fn new(current: &'a [K], desired: &'a [K], cmp: F) -> Self {
        Self {
            current,
            desired,
            i: 0,
            j: 0,
            cmp,
        }
    }
}

impl<'a, K, F> Iterator for SortedMerge<'a, K, F>
where
    F: FnMut(&K, &K) -> Ordering,
{
    type Item = Operation<&'a K>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.get(self.i);
        let desired = self.desired.get(self.j);

        match (current, desired) {
            (None, None) => None,
            (None, Some(key)) => {
                self.j += 1;
                Some(Operation::Add { key })
            }
            (Some(key), None) => {
                self.i += 1;
                Some(Operation::Delete { key })
            }
            (Some(old), Some(new)) => match (self.cmp)(old, new) {
                Ordering::Equal => {
                    self.i += 1;
                    self.j += 1;
                    Some(Operation::Update { old, new })
                }
                Ordering::Greater => {
                    self.j += 1;
                    Some(Operation::Add { key: new })
                }
                Ordering::Less => {
                    self.i += 1;
                    Some(Operation::Delete { key: old })
                }
            },
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.current.len() - self.i;
        let right = self.desired.len() - self.j;
        (left.max(right), Some(left + right))
    }
}

/// The full ordered list of operations one pass would perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan<K> {
    pub operations: Vec<Operation<K>>,
}

impl<K> Plan<K> {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation<K>> {
        self.operations.iter()
    }

    /// Operations of a single class, in plan order
    pub fn of_kind(&self, kind: OperationKind) -> impl Iterator<Item = &Operation<K>> {
        self.operations.iter().filter(move |op| op.kind() == kind)
    }
}

impl<K: PartialEq> Plan<K> {
    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_operations(&self.operations)
    }

    /// Operations that change the collection, excluding identity updates
    pub fn changes(&self) -> impl Iterator<Item = &Operation<K>> {
        self.operations.iter().filter(|op| !op.is_noop())
    }
}

impl<K> IntoIterator for Plan<K> {
    type Item = Operation<K>;
    type IntoIter = std::vec::IntoIter<Operation<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

/// Compute the plan for naturally ordered keys without invoking callbacks
pub fn plan<K: Ord + Clone>(
    current: impl IntoIterator<Item = K>,
    desired: impl IntoIterator<Item = K>,
) -> Plan<K> {
    plan_by(current, desired, K::cmp)
}

/// Compute the plan with an injected comparator
pub fn plan_by<K, F>(
    current: impl IntoIterator<Item = K>,
    desired: impl IntoIterator<Item = K>,
    mut cmp: F,
) -> Plan<K>
where
    K: Clone,
    F: FnMut(&K, &K) -> Ordering,
{
    let current = sort_keys(current, &mut cmp);
    let desired = sort_keys(desired, &mut cmp);
    let operations = SortedMerge::new(&current, &desired, &mut cmp)
        .map(|op| op.cloned())
        .collect();
    Plan { operations }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    /// Updates where old and new differ
    pub updates: usize,
    /// Updates where old and new are identical
    pub unchanged: usize,
}

impl DiffSummary {
    pub fn from_operations<K: PartialEq>(operations: &[Operation<K>]) -> Self {
        let mut summary = Self::default();
        for op in operations {
            match op.kind() {
                OperationKind::Add => summary.additions += 1,
                OperationKind::Delete => summary.removals += 1,
                OperationKind::Update if op.is_noop() => summary.unchanged += 1,
                OperationKind::Update => summary.updates += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.updates
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
