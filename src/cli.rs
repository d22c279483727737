use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge managed collections toward their desired state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file [default: ~/.config/converge/config.toml]
    #[arg(long, global = true, env = "CONVERGE_CONFIG")]
    pub config: Option<String>,

    /// State store [default: ~/.local/state/converge/state.toml]
    #[arg(long, global = true, env = "CONVERGE_STATE")]
    pub state: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show which collections have drifted
    Status,

    /// Show the operations a pass would perform
    Plan(PlanArgs),

    /// Reconcile collections toward the config
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Only plan this collection
    pub collection: Option<String>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,

    /// Also list keys that are already in sync
    #[arg(short, long)]
    pub all: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Only apply this collection
    pub collection: Option<String>,

    /// Show what would change without applying
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Stop issuing operations after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Cancel the remaining passes once one fails
    #[arg(long)]
    pub fail_fast: bool,
}

impl Cli {
    /// Resolve the config path, expanding `~`
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(crate::paths::expand(path)),
            None => crate::paths::config_file(),
        }
    }

    /// Resolve the state path, expanding `~`
    pub fn state_path(&self) -> anyhow::Result<PathBuf> {
        match &self.state {
            Some(path) => Ok(crate::paths::expand(path)),
            None => crate::paths::state_file(),
        }
    }
}
