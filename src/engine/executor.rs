//! Execution engine - runs independent passes in parallel

use anyhow::{Context as AnyhowContext, Result};
use chrono::Utc;
use colored::Colorize;
use rayon::prelude::*;
use reconcile::{CancelToken, ReconcileOptions, ReconcileSummary};
use std::time::Duration;

use crate::progress;
use crate::state::CollectionState;
use crate::ui;

use super::planner::{ExecutionPlan, Job};
use super::{PassOutcome, run_pass};

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Compute operations without touching the store
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Time budget shared by all passes
    pub timeout: Option<Duration>,
    /// Cancel the remaining passes once one fails
    pub fail_fast: bool,
    /// Show a progress bar
    pub progress: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            timeout: None,
            fail_fast: false,
            progress: false,
        }
    }
}

/// A finished pass together with the state it worked on
#[derive(Debug)]
pub struct Completed {
    pub name: String,
    pub state: CollectionState,
    pub outcome: PassOutcome,
}

/// Run every job of the plan, preserving plan order in the results
pub fn execute(plan: ExecutionPlan, opts: &ExecuteOptions) -> Result<Vec<Completed>> {
    if plan.is_empty() {
        return Ok(Vec::new());
    }

    let cancel = CancelToken::new();
    let mut options = ReconcileOptions::new()
        .dry_run(opts.dry_run)
        .cancel_token(cancel.clone());
    if let Some(timeout) = opts.timeout {
        options = options.timeout(timeout);
    }

    let label = if opts.dry_run { "Planning" } else { "Applying" };
    let pb = progress::bar(plan.len() as u64, label, opts.progress);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    let completed: Vec<Completed> = pool.install(|| {
        plan.jobs
            .into_par_iter()
            .map(|job| {
                let done = run_job(job, &options);

                if opts.fail_fast && !done.outcome.is_success() {
                    log::debug!("{} failed, cancelling remaining passes", done.name);
                    cancel.cancel();
                }

                let symbol = if done.outcome.is_success() { "✓" } else { "✗" };
                pb.set_message(format!("{} {}", symbol, ui::truncate(&done.name, 30)));
                pb.inc(1);
                done
            })
            .collect()
    });

    pb.finish_and_clear();
    Ok(completed)
}

fn run_job(mut job: Job, options: &ReconcileOptions) -> Completed {
    log::debug!("Starting pass over {} ({})", job.name, job.kind.as_str());

    let outcome = match run_pass(
        &job.name,
        job.kind,
        &job.desired,
        &mut job.state,
        job.policy,
        options,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("{}: {:#}", job.name, e);
            PassOutcome::rejected(&job.name, job.kind, &e)
        }
    };

    if outcome.is_success() && !outcome.dry_run {
        job.state.last_reconciled = Some(Utc::now());
    }

    Completed {
        name: job.name,
        state: job.state,
        outcome,
    }
}

/// Totals across all passes
pub fn total_summary<'a>(outcomes: impl IntoIterator<Item = &'a PassOutcome>) -> ReconcileSummary {
    let mut total = ReconcileSummary::default();
    for outcome in outcomes {
        total.merge(&outcome.summary());
    }
    total
}

/// Confirm with user
pub fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
pub fn print_summary(completed: &[Completed]) {
    let summary = total_summary(completed.iter().map(|c| &c.outcome));
    let rejected = completed
        .iter()
        .filter(|c| !c.outcome.is_success() && c.outcome.failures.is_empty())
        .count();

    println!();
    if summary.is_success() && rejected == 0 {
        println!("  {} Collections converged", "✓".green().bold());
    } else {
        println!("  {} Collections converged with errors", "⚠".yellow().bold());
    }

    if summary.added > 0 {
        println!("    • {} keys added", summary.added);
    }
    if summary.updated > 0 {
        println!("    • {} keys updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} keys deleted", summary.deleted);
    }
    if summary.skipped > 0 {
        println!("    • {} operations skipped by policy", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "operations".red());
    }
    if rejected > 0 {
        println!("    • {} {} not reconciled", rejected, "collections".red());
    }
}
