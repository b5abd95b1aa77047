use std::{num::NonZeroUsize, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParallelismError {
    #[error("parallelism must be a positive integer or \"max\", got {0:?}")]
    Invalid(String),
}

/// How many tasks may execute concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// Use the host's available parallelism.
    Max,
    Fixed(NonZeroUsize),
}

impl Parallelism {
    pub fn resolve(&self) -> usize {
        match self {
            Parallelism::Max => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            Parallelism::Fixed(n) => n.get(),
        }
    }
}

impl Default for Parallelism {
    fn default() -> Self {
        Parallelism::Fixed(NonZeroUsize::new(1).expect("1 is nonzero"))
    }
}

impl FromStr for Parallelism {
    type Err = ParallelismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("max") {
            return Ok(Parallelism::Max);
        }
        let n: usize = s
            .parse()
            .map_err(|_| ParallelismError::Invalid(s.to_string()))?;
        NonZeroUsize::new(n)
            .map(Parallelism::Fixed)
            .ok_or_else(|| ParallelismError::Invalid(s.to_string()))
    }
}

/// Whether the output collator may emit ANSI color codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorConfig {
    Always,
    Never,
    Auto,
}

impl ColorConfig {
    pub fn should_colorize(&self, stream_is_tty: bool) -> bool {
        match self {
            ColorConfig::Always => true,
            ColorConfig::Never => false,
            ColorConfig::Auto => stream_is_tty,
        }
    }
}

/// The subset of runner options enumerated in the external interface: parallelism, output
/// verbosity, and the incremental/cache knobs.
#[derive(Debug, Clone)]
pub struct RunOpts {
    pub parallelism: Parallelism,
    pub quiet_mode: bool,
    pub changed_projects_only: bool,
    pub allow_warnings_in_success: bool,
    pub incremental: bool,
    pub ignore_dependency_order: bool,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            parallelism: Parallelism::default(),
            quiet_mode: false,
            changed_projects_only: false,
            allow_warnings_in_success: true,
            incremental: true,
            ignore_dependency_order: false,
        }
    }
}

/// The runner's sole configuration input. Constructed once by the caller (CLI entry point or
/// embedding library) and passed into the runner's constructor — the core never reads process
/// environment variables or other globals for itself.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub run_opts: RunOpts,
    pub color_config: ColorConfig,
    /// Baked into every cache fingerprint; bump when the runner's own behavior changes in a
    /// way that should invalidate existing cache entries.
    pub tool_version_tag: String,
}

impl RunnerConfig {
    pub fn new(run_opts: RunOpts, color_config: ColorConfig) -> Self {
        Self {
            run_opts,
            color_config,
            tool_version_tag: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
