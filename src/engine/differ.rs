//! Plan display

use colored::{ColoredString, Colorize};
use reconcile::OperationKind;

use super::executor::total_summary;
use super::{OperationLine, PassOutcome};

fn symbol(kind: OperationKind) -> ColoredString {
    let s = kind.symbol().to_string();
    match kind {
        OperationKind::Add => s.green(),
        OperationKind::Update => s.yellow(),
        OperationKind::Delete => s.red(),
    }
}

/// One listing line: `+ www`, `~ env:dev → env:prod`, `- old`
pub fn describe(line: &OperationLine) -> String {
    match &line.previous {
        Some(previous) if !line.unchanged => format!("{} → {}", previous, line.key),
        _ => line.key.clone(),
    }
}

/// Whether any pass would change something or has something to report
pub fn has_changes(outcomes: &[&PassOutcome]) -> bool {
    outcomes
        .iter()
        .any(|o| o.changes().next().is_some() || !o.is_success())
}

/// Display the operations each pass would perform
pub fn display_plan(outcomes: &[&PassOutcome], show_unchanged: bool) {
    if !has_changes(outcomes) && !show_unchanged {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Reconciliation Plan".bold()
    );
    println!("│");

    for outcome in outcomes {
        println!(
            "│ {} {}",
            outcome.name.bold(),
            format!("({})", outcome.kind.as_str()).dimmed()
        );

        if let Some(error) = &outcome.error
            && outcome.failures.is_empty()
        {
            println!("│   {} {}", "✗".red(), error);
            println!("│");
            continue;
        }

        let mut shown = 0;
        for line in &outcome.operations {
            if line.unchanged {
                if show_unchanged {
                    println!("│   {} {}", "=".dimmed(), line.key.dimmed());
                    shown += 1;
                }
                continue;
            }
            println!("│   {} {}", symbol(line.kind), describe(line));
            shown += 1;
        }

        for line in outcome.skipped.iter().filter(|l| !l.unchanged) {
            println!(
                "│   {} {} {}",
                "⊘".dimmed(),
                describe(line).dimmed(),
                format!("({} not allowed)", line.kind).dimmed()
            );
            shown += 1;
        }

        if shown == 0 {
            println!("│   {}", "(in sync)".dimmed());
        }
        println!("│");
    }

    let summary = total_summary(outcomes.iter().copied());
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to add, {} to update, {} to delete, {} skipped",
        summary.added.to_string().green(),
        summary.updated.to_string().yellow(),
        summary.deleted.to_string().red(),
        summary.skipped.to_string().dimmed()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Display per-pass failures, one aggregate message block per collection
pub fn display_failures(outcomes: &[&PassOutcome]) {
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_success()).collect();
    if failed.is_empty() {
        return;
    }

    println!();
    println!("  {}", "Failures".red().bold());
    for outcome in failed {
        let status = if outcome.interrupted {
            " (interrupted)".yellow().to_string()
        } else {
            String::new()
        };
        println!("  {} {}{}", "✗".red(), outcome.name.bold(), status);
        if let Some(error) = &outcome.error {
            for line in error.lines() {
                println!("      {}", line);
            }
        }
    }
}
