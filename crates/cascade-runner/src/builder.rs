//! Assembles a [`TaskRunner`] from its four injected capabilities plus an optional process
//! manager for best-effort cancellation. The runner itself never constructs a concrete
//! `ChangeAnalyzer`, `BuildCache`, `ShellRunner`, or `OutputSink` — this builder is the one place
//! that wires trait objects together.

use std::sync::Arc;

use cascade_process::ProcessManager;
use cascade_run_cache::RunCache;
use cascade_task_executor::TaskExecutor;
use cascade_types::{BuildCache, ChangeAnalyzer, NoopTelemetrySink, OutputSink, RunnerConfig, ShellRunner, TelemetrySink};

use crate::coordinator::TaskRunner;

pub struct TaskRunnerBuilder {
    config: RunnerConfig,
    change_analyzer: Arc<dyn ChangeAnalyzer>,
    build_cache: Arc<dyn BuildCache>,
    shell_runner: Arc<dyn ShellRunner>,
    output_sink: Arc<dyn OutputSink>,
    telemetry: Arc<dyn TelemetrySink>,
    process_manager: Option<Arc<ProcessManager>>,
}

impl TaskRunnerBuilder {
    pub fn new(
        config: RunnerConfig,
        change_analyzer: Arc<dyn ChangeAnalyzer>,
        build_cache: Arc<dyn BuildCache>,
        shell_runner: Arc<dyn ShellRunner>,
        output_sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            config,
            change_analyzer,
            build_cache,
            shell_runner,
            output_sink,
            telemetry: Arc::new(NoopTelemetrySink),
            process_manager: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_process_manager(mut self, process_manager: Arc<ProcessManager>) -> Self {
        self.process_manager = Some(process_manager);
        self
    }

    /// Binds each task's declared output globs before the run cache is handed to the executor —
    /// `RunCache::store` only knows a task's globs if `bind` was called for it beforehand.
    pub fn build(self, output_globs: Vec<(cascade_task_id::TaskId, Vec<String>)>) -> TaskRunner {
        let mut run_cache = RunCache::new(self.build_cache);
        for (task, globs) in output_globs {
            run_cache.bind(task, globs);
        }

        let executor = Arc::new(TaskExecutor::new(
            self.change_analyzer,
            self.shell_runner,
            Arc::new(run_cache),
            true,
        ));

        TaskRunner::new(self.config, executor, self.output_sink, self.telemetry, self.process_manager)
    }
}
