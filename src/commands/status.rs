//! `converge status` - dashboard of managed collections

use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::engine::PassOutcome;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Converge Status");

    let (config, store) = super::load(ctx)?;
    let outcomes = super::plan::preview(&config, &store, None, 1)?;

    if !ctx.quiet {
        ui::kv("Config", &ctx.config_path.display().to_string());
        ui::kv("State", &ctx.state_path.display().to_string());
    }

    ui::section("Collections");
    if outcomes.is_empty() {
        ui::dim("(none configured)");
    }

    for outcome in &outcomes {
        let stored = store.collections.get(&outcome.name);
        let members = store.members(&outcome.name).len();
        let desired = config
            .collections
            .get(&outcome.name)
            .map(|c| c.desired.len())
            .unwrap_or(0);

        let (icon, detail) = describe(outcome);
        println!(
            "  {} {:<20} {} {}",
            icon,
            outcome.name.bold(),
            format!("{members}/{desired} keys").dimmed(),
            detail
        );

        if ctx.verbose > 0
            && let Some(state) = stored
        {
            let last = state
                .last_reconciled
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string());
            ui::dim(&format!("    last reconciled: {last}"));
            if !state.locked.is_empty() {
                ui::dim(&format!("    locked: {}", state.locked.join(", ")));
            }
        }
    }

    let unmanaged: Vec<_> = store
        .collections
        .keys()
        .filter(|name| !config.collections.contains_key(*name))
        .collect();
    if !unmanaged.is_empty() {
        ui::section("Unmanaged");
        for name in unmanaged {
            println!("  {} {}", "?".dimmed(), name);
        }
    }

    println!();
    Ok(())
}

fn describe(outcome: &PassOutcome) -> (colored::ColoredString, String) {
    if let Some(error) = &outcome.error
        && outcome.failures.is_empty()
    {
        return ("✗".red(), error.red().to_string());
    }

    let summary = outcome.summary();
    if summary.total_changes() == 0 {
        let detail = if summary.skipped > 0 {
            format!("in sync ({} held by policy)", summary.skipped)
        } else {
            "in sync".to_string()
        };
        return ("✓".green(), detail.green().to_string());
    }

    let detail = format!(
        "drift: +{} ~{} -{}",
        summary.added, summary.updated, summary.deleted
    );
    ("⚠".yellow(), detail.yellow().to_string())
}
