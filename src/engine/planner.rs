//! Execution planner - pairs configured collections with stored members

use anyhow::Result;

use crate::config::{CollectionKind, ConvergeConfig, Policy};
use crate::state::{CollectionState, Store};

/// One pass to run: a collection with exclusive ownership of its state
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub kind: CollectionKind,
    pub desired: Vec<String>,
    pub policy: Policy,
    pub state: CollectionState,
}

/// Independent passes, one per selected collection
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub jobs: Vec<Job>,
}

impl ExecutionPlan {
    /// Take the selected collections' states out of the store.
    ///
    /// Each job owns its state until it is put back, so passes never share
    /// a collection.
    pub fn build(config: &ConvergeConfig, target: Option<&str>, store: &mut Store) -> Result<Self> {
        let jobs = config
            .select(target)?
            .into_iter()
            .map(|(name, collection)| Job {
                name: name.to_string(),
                kind: collection.kind,
                desired: collection.desired.clone(),
                policy: config.policy_for(collection),
                state: store.take(name),
            })
            .collect::<Vec<_>>();

        log::debug!("Planned {} passes", jobs.len());
        Ok(Self { jobs })
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
