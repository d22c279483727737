//! `converge apply` - reconcile stored collections toward the config

use anyhow::{Result, bail};
use colored::Colorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::executor::{confirm_proceed, print_summary};
use crate::engine::{self, ExecuteOptions, ExecutionPlan, PassOutcome, differ};

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let (config, mut store) = super::load(ctx)?;
    let target = args.collection.as_deref();

    // 1. Preview against a copy of the store
    let preview = super::plan::preview(&config, &store, target, args.jobs)?;
    let refs: Vec<&PassOutcome> = preview.iter().collect();
    differ::display_plan(&refs, false);

    if !differ::has_changes(&refs) {
        return Ok(());
    }

    if args.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    // 2. Confirm (unless --yes or nobody can answer)
    let interactive = std::io::stdin().is_terminal();
    if !args.yes && interactive && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    // 3. Run every pass against the real store
    let plan = ExecutionPlan::build(&config, target, &mut store)?;
    println!();
    println!("  {} Reconciling {} collections...", "→".cyan(), plan.len());

    let opts = ExecuteOptions {
        dry_run: false,
        jobs: args.jobs,
        timeout: args.timeout.map(Duration::from_secs),
        fail_fast: args.fail_fast,
        progress: !ctx.quiet && std::io::stderr().is_terminal(),
    };
    let completed = engine::execute(plan, &opts)?;

    print_summary(&completed);
    let outcomes: Vec<&PassOutcome> = completed.iter().map(|c| &c.outcome).collect();
    differ::display_failures(&outcomes);
    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    let total = outcomes.len();

    // 4. Persist everything that was applied, including partial passes
    for done in completed {
        store.put(&done.name, done.state);
    }
    store.touch(&ctx.state_path)?;
    log::info!("Saved store to {}", ctx.state_path.display());

    if failed > 0 {
        bail!("{failed} of {total} collections did not converge");
    }
    Ok(())
}
