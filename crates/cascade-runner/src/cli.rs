//! The `cascade` binary's argument surface: exactly the Runner Options plus a task selector and
//! repository root, sufficient to drive the scheduler end-to-end.

use std::num::NonZeroUsize;

use cascade_types::{ColorConfig, Parallelism, RunOpts};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cascade", version, about = "Monorepo bulk task scheduler")]
pub struct Args {
    /// The script name to run in each selected project, e.g. `build`.
    pub task: String,

    /// Root of the repository; `cascade.json` is read from here.
    #[arg(long, default_value = ".")]
    pub repo_root: String,

    /// Run only the given projects and their transitive dependencies.
    #[arg(long = "to")]
    pub to: Vec<String>,

    /// Run only the given projects and their transitive dependents.
    #[arg(long = "from")]
    pub from: Vec<String>,

    /// Max concurrent tasks: a positive integer or `max`.
    #[arg(long)]
    pub parallelism: Option<String>,

    #[arg(long)]
    pub quiet: bool,

    #[arg(long)]
    pub changed_projects_only: bool,

    /// Warnings (stderr output on an otherwise zero exit) do not fail the overall run.
    #[arg(long, default_value_t = true)]
    pub allow_warnings_in_success: bool,

    /// Disable the incremental skip; every selected task always executes.
    #[arg(long)]
    pub no_incremental: bool,

    /// Ignore dependency edges for scheduling purposes; everything selected runs at once.
    #[arg(long)]
    pub ignore_dependency_order: bool,

    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorArg,

    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ColorArg {
    Always,
    Never,
    Auto,
}

impl From<ColorArg> for ColorConfig {
    fn from(value: ColorArg) -> Self {
        match value {
            ColorArg::Always => ColorConfig::Always,
            ColorArg::Never => ColorConfig::Never,
            ColorArg::Auto => ColorConfig::Auto,
        }
    }
}

impl Args {
    pub fn run_opts(&self) -> Result<RunOpts, cascade_types::ParallelismError> {
        let parallelism = match &self.parallelism {
            Some(raw) => raw.parse()?,
            None => Parallelism::Fixed(
                std::thread::available_parallelism().unwrap_or(NonZeroUsize::new(1).unwrap()),
            ),
        };
        Ok(RunOpts {
            parallelism,
            quiet_mode: self.quiet,
            changed_projects_only: self.changed_projects_only,
            allow_warnings_in_success: self.allow_warnings_in_success,
            incremental: !self.no_incremental,
            ignore_dependency_order: self.ignore_dependency_order,
        })
    }
}
