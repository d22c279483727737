//! File-backed collection store
//!
//! Stands in for the remote system that owns each collection. Every
//! mutation is all-or-nothing, so a failed callback leaves the stored
//! members exactly as they were.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconcile::{Handler, OperationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::Policy;

// ============================================================================
// State Structures
// ============================================================================

/// All stored collections
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Store {
    /// Collections by name
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionState>,

    /// Last time the store was written
    pub last_updated: DateTime<Utc>,
}

/// Members currently attached to one collection
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct CollectionState {
    /// Attached keys, in their stored encoding
    #[serde(default)]
    pub members: Vec<String>,

    /// Keys the store refuses to change or remove
    #[serde(default)]
    pub locked: Vec<String>,

    /// Last time a pass completed without failures
    #[serde(default)]
    pub last_reconciled: Option<DateTime<Utc>>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            collections: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// Store Implementation
// ============================================================================

impl Store {
    /// Load the store, or return an empty one if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Store {} does not exist, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read store: {}", path.display()))?;
        let store: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse store: {}", path.display()))?;

        log::debug!("Loaded store from {}", path.display());
        Ok(store)
    }

    /// Write the store to disk, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize store to TOML")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write store: {}", path.display()))?;

        log::debug!("Saved store to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    /// Members of a collection; unknown collections are empty
    pub fn members(&self, name: &str) -> &[String] {
        self.collections
            .get(name)
            .map(|c| c.members.as_slice())
            .unwrap_or_default()
    }

    /// Remove a collection's state for exclusive use by one pass
    pub fn take(&mut self, name: &str) -> CollectionState {
        self.collections.remove(name).unwrap_or_default()
    }

    /// Put a collection's state back after a pass
    pub fn put(&mut self, name: &str, state: CollectionState) {
        self.collections.insert(name.to_string(), state);
    }
}

// ============================================================================
// Mutations
// ============================================================================

/// Reasons the store rejects a mutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("{collection}: '{key}' is locked")]
    Locked { collection: String, key: String },

    #[error("{collection}: '{key}' is already attached")]
    AlreadyAttached { collection: String, key: String },

    #[error("{collection}: '{key}' is not attached")]
    NotAttached { collection: String, key: String },
}

impl CollectionState {
    fn position(&self, key: &str) -> Option<usize> {
        self.members.iter().position(|m| m == key)
    }

    fn check_unlocked(&self, collection: &str, key: &str) -> Result<(), MutationError> {
        if self.locked.iter().any(|l| l == key) {
            return Err(MutationError::Locked {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    pub fn attach(&mut self, collection: &str, key: &str) -> Result<(), MutationError> {
        self.check_unlocked(collection, key)?;
        if self.position(key).is_some() {
            return Err(MutationError::AlreadyAttached {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }
        self.members.push(key.to_string());
        Ok(())
    }

    /// Replace `old` with `new`; replacing a key with itself leaves it
    /// untouched, so it is allowed even when the key is locked
    pub fn replace(&mut self, collection: &str, old: &str, new: &str) -> Result<(), MutationError> {
        if old != new {
            self.check_unlocked(collection, old)?;
        }
        let index = self
            .position(old)
            .ok_or_else(|| MutationError::NotAttached {
                collection: collection.to_string(),
                key: old.to_string(),
            })?;
        self.members[index] = new.to_string();
        Ok(())
    }

    pub fn detach(&mut self, collection: &str, key: &str) -> Result<(), MutationError> {
        self.check_unlocked(collection, key)?;
        let index = self
            .position(key)
            .ok_or_else(|| MutationError::NotAttached {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;
        self.members.remove(index);
        Ok(())
    }
}

/// Applies reconciliation operations to one stored collection
pub struct StoreHandler<'a> {
    name: &'a str,
    state: &'a mut CollectionState,
    policy: Policy,
}

impl<'a> StoreHandler<'a> {
    pub fn new(name: &'a str, state: &'a mut CollectionState, policy: Policy) -> Self {
        Self {
            name,
            state,
            policy,
        }
    }
}

impl<K: fmt::Display> Handler<K> for StoreHandler<'_> {
    fn handles(&self, kind: OperationKind) -> bool {
        self.policy.allows(kind)
    }

    fn add(&mut self, key: &K) -> Result<()> {
        Ok(self.state.attach(self.name, &key.to_string())?)
    }

    fn update(&mut self, old: &K, new: &K) -> Result<()> {
        Ok(self
            .state
            .replace(self.name, &old.to_string(), &new.to_string())?)
    }

    fn delete(&mut self, key: &K) -> Result<()> {
        Ok(self.state.detach(self.name, &key.to_string())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(members: &[&str], locked: &[&str]) -> CollectionState {
        CollectionState {
            members: members.iter().map(ToString::to_string).collect(),
            locked: locked.iter().map(ToString::to_string).collect(),
            last_reconciled: None,
        }
    }

    #[test]
    fn test_attach_replace_detach() {
        let mut s = state(&["a"], &[]);
        s.attach("c", "b").unwrap();
        s.replace("c", "a", "a2").unwrap();
        s.detach("c", "b").unwrap();
        assert_eq!(s.members, vec!["a2"]);
    }

    #[test]
    fn test_mutation_errors_leave_state_unchanged() {
        let mut s = state(&["a", "keep"], &["keep"]);
        let before = s.clone();

        assert_eq!(
            s.attach("c", "a"),
            Err(MutationError::AlreadyAttached {
                collection: "c".into(),
                key: "a".into()
            })
        );
        assert!(matches!(
            s.detach("c", "keep"),
            Err(MutationError::Locked { .. })
        ));
        assert!(matches!(
            s.replace("c", "missing", "x"),
            Err(MutationError::NotAttached { .. })
        ));
        assert_eq!(s, before);
    }

    #[test]
    fn test_identity_replace_of_locked_key() {
        let mut s = state(&["www"], &["www"]);
        s.replace("aliases", "www", "www").unwrap();
        assert_eq!(s.members, vec!["www"]);
        assert!(matches!(
            s.replace("aliases", "www", "www2"),
            Err(MutationError::Locked { .. })
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = MutationError::Locked {
            collection: "aliases".into(),
            key: "www".into(),
        };
        assert_eq!(err.to_string(), "aliases: 'www' is locked");
    }

    #[test]
    fn test_store_handler_reconciles() {
        let mut s = state(&["old", "www"], &[]);
        {
            let mut handler = StoreHandler::new("aliases", &mut s, Policy::default());
            reconcile::reconcile(
                vec!["old".to_string(), "www".to_string()],
                vec!["www".to_string(), "api".to_string()],
                &mut handler,
            )
            .unwrap();
        }
        assert_eq!(s.members, vec!["www", "api"]);
    }

    #[test]
    fn test_store_handler_respects_policy() {
        let mut s = state(&["old"], &[]);
        let policy = Policy {
            delete: false,
            ..Default::default()
        };
        let report = {
            let mut handler = StoreHandler::new("aliases", &mut s, policy);
            reconcile::reconcile(vec!["old".to_string()], vec!["new".to_string()], &mut handler)
                .unwrap()
        };
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(s.members, vec!["old", "new"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut store = Store::default();
        store.put("aliases", state(&["www"], &["www"]));
        store.touch(&path).unwrap();

        let loaded = Store::load(&path).unwrap();
        assert_eq!(loaded.members("aliases"), ["www".to_string()]);
        assert_eq!(loaded.collections["aliases"].locked, vec!["www"]);
        assert!(loaded.members("unknown").is_empty());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(&dir.path().join("state.toml")).unwrap();
        assert!(store.collections.is_empty());
    }

    #[test]
    fn test_take_and_put() {
        let mut store = Store::default();
        store.put("tags", state(&["env:prod"], &[]));
        let taken = store.take("tags");
        assert!(store.collections.is_empty());
        assert_eq!(taken.members, vec!["env:prod"]);
        assert_eq!(store.take("missing"), CollectionState::default());
    }
}
