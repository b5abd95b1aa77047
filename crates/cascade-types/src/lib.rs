//! Capability interfaces and shared value types consumed by the scheduler.
//!
//! The runner (`cascade-runner`) never constructs a concrete [`scm::ChangeAnalyzer`],
//! [`cache::BuildCache`], [`process::ShellRunner`], or [`output::OutputSink`] itself — it is
//! handed `Arc<dyn Trait>` values at construction through a builder. This module is the seam:
//! it defines the traits and the plain data that crosses them, but not a single implementation.

pub mod cache;
pub mod config;
pub mod output;
pub mod process;
pub mod scm;
pub mod status;
pub mod telemetry;

pub use cache::{BuildCache, CacheError, CacheFingerprint, CacheOutcome, StoreOutcome};
pub use config::{ColorConfig, Parallelism, ParallelismError, RunOpts, RunnerConfig};
pub use output::{OutputKind, OutputSink, OutputWriter};
pub use process::{ChildExit, ProcessError, ShellRunner, ShutdownStyle};
pub use scm::{AnalyzerError, ChangeAnalyzer, FileHashMap};
pub use status::TaskStatus;
pub use telemetry::{NoopTelemetrySink, TelemetryEvent, TelemetrySink};
