//! Desired-state configuration
//!
//! ```toml
//! [policy]
//! delete = false
//!
//! [collections.aliases]
//! desired = ["www", "api"]
//!
//! [collections.tags]
//! kind = "tags"
//! desired = ["env:prod", "team:core"]
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{OperationKind, parse_tags};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

// ============================================================================
// Config Schema
// ============================================================================

/// The converge configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvergeConfig {
    /// Default policy for every collection
    #[serde(default)]
    pub policy: Policy,

    /// Managed collections by name
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionConfig>,
}

/// Which classes of operation a pass may perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default = "default_true")]
    pub add: bool,
    #[serde(default = "default_true")]
    pub update: bool,
    /// `false` leaves unwanted keys attached
    #[serde(default = "default_true")]
    pub delete: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            add: true,
            update: true,
            delete: true,
        }
    }
}

impl Policy {
    pub fn allows(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Add => self.add,
            OperationKind::Update => self.update,
            OperationKind::Delete => self.delete,
        }
    }
}

/// How keys of a collection are encoded and matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Plain strings matched exactly (aliases, member emails)
    #[default]
    Set,
    /// `key:value` tags matched by key
    Tags,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Tags => "tags",
        }
    }
}

/// One managed collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default)]
    pub kind: CollectionKind,

    /// Keys that should be attached after a pass
    #[serde(default)]
    pub desired: Vec<String>,

    /// Overrides the top-level policy for this collection
    #[serde(default)]
    pub policy: Option<Policy>,
}

// ============================================================================
// Loading
// ============================================================================

impl ConvergeConfig {
    /// Load and validate the config file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "Config file not found: {}\n  Create it or pass --config <PATH>",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;

        config.validate()?;
        log::debug!(
            "Loaded {} collections from {}",
            config.collections.len(),
            path.display()
        );
        Ok(config)
    }

    /// Check that every desired key parses for its collection kind and
    /// appears only once (tags by key)
    pub fn validate(&self) -> Result<()> {
        for (name, collection) in &self.collections {
            let identities: Vec<String> = match collection.kind {
                CollectionKind::Set => collection.desired.clone(),
                CollectionKind::Tags => parse_tags(&collection.desired)
                    .with_context(|| format!("Invalid desired tags in collection '{name}'"))?
                    .into_iter()
                    .map(|tag| tag.key)
                    .collect(),
            };

            let mut seen = BTreeSet::new();
            for key in identities {
                if !seen.insert(key.clone()) {
                    bail!("Duplicate desired key '{key}' in collection '{name}'");
                }
            }
        }
        Ok(())
    }

    /// Effective policy for a collection
    pub fn policy_for(&self, collection: &CollectionConfig) -> Policy {
        collection.policy.unwrap_or(self.policy)
    }

    /// Collections to operate on: one by name, or all of them
    pub fn select(&self, name: Option<&str>) -> Result<Vec<(&str, &CollectionConfig)>> {
        match name {
            Some(name) => match self.collections.get_key_value(name) {
                Some((key, collection)) => Ok(vec![(key.as_str(), collection)]),
                None => bail!(
                    "Unknown collection '{name}'. Known: {}",
                    self.collections
                        .keys()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
            None => Ok(self
                .collections
                .iter()
                .map(|(name, collection)| (name.as_str(), collection))
                .collect()),
        }
    }
}
