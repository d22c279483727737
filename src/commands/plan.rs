//! `converge plan` - show what a pass would do without touching the store

use anyhow::{Context as AnyhowContext, Result};

use crate::Context;
use crate::cli::PlanArgs;
use crate::config::ConvergeConfig;
use crate::engine::{self, ExecuteOptions, ExecutionPlan, PassOutcome, differ};
use crate::state::Store;
use crate::ui;

/// Run every selected pass as a dry run against a copy of the store
pub(crate) fn preview(
    config: &ConvergeConfig,
    store: &Store,
    target: Option<&str>,
    jobs: usize,
) -> Result<Vec<PassOutcome>> {
    let mut scratch = store.clone();
    let plan = ExecutionPlan::build(config, target, &mut scratch)?;

    let opts = ExecuteOptions {
        dry_run: true,
        jobs,
        ..Default::default()
    };
    let completed = engine::execute(plan, &opts)?;
    Ok(completed.into_iter().map(|c| c.outcome).collect())
}

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let (config, store) = super::load(ctx)?;
    let outcomes = preview(&config, &store, args.collection.as_deref(), args.jobs)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&outcomes).context("Failed to serialize plan to JSON")?;
        println!("{json}");
        return Ok(());
    }

    if outcomes.is_empty() {
        ui::warn("No collections configured");
        return Ok(());
    }

    let refs: Vec<&PassOutcome> = outcomes.iter().collect();
    differ::display_plan(&refs, args.all);
    differ::display_failures(&refs);
    Ok(())
}
