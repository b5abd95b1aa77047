//! The task runner: coordinates the parallel execution of a task collection, streaming output
//! through a collator and reporting results to telemetry. Built from capability trait objects
//! supplied by a [`builder::TaskRunnerBuilder`]; the runner never constructs a concrete
//! `ChangeAnalyzer`, `BuildCache`, `ShellRunner`, or `OutputSink` itself.

mod builder;
mod coordinator;
pub mod cli;
pub mod logging;
pub mod project_config;
pub mod signal;

pub use builder::TaskRunnerBuilder;
pub use coordinator::{RunSummary, RunnableTask, TaskResult, TaskRunner};
