//! The task runner: a single coordinator task driving an `mpsc`-fed event loop. The coordinator
//! owns the task graph's state; workers never write task state directly, they submit a finished
//! outcome back through the result channel and the coordinator decides what that unblocks.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use cascade_engine::{Built, TaskCollection};
use cascade_paths::AbsoluteSystemPathBuf;
use cascade_process::ProcessManager;
use cascade_task_executor::{TaskExecutor, TaskSpec};
use cascade_task_id::TaskId;
use cascade_types::{OutputSink, RunnerConfig, TaskStatus, TelemetryEvent, TelemetrySink};
use tokio::sync::{mpsc, Semaphore};

use crate::signal::{SignalSubscriber, SubscriberGuard};

/// Everything the coordinator needs to run one task's command, beyond what the task collection
/// already encodes (its id and dependency edges).
#[derive(Clone)]
pub struct RunnableTask {
    pub command: String,
    pub project_root: AbsoluteSystemPathBuf,
    pub output_globs: Vec<String>,
    pub env: HashMap<String, String>,
}

/// One task's final record in a completed run.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task: TaskId,
    pub status: TaskStatus,
    pub duration_ms: u64,
    pub stderr_tail: Option<String>,
}

/// The result of a full run: every task's final status plus whether the run as a whole counts
/// as successful under `allow-warnings-in-success`.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub results: Vec<TaskResult>,
    pub success: bool,
}

pub struct TaskRunner {
    config: RunnerConfig,
    executor: Arc<TaskExecutor>,
    output_sink: Arc<dyn OutputSink>,
    telemetry: Arc<dyn TelemetrySink>,
    process_manager: Option<Arc<ProcessManager>>,
}

type CancelFuture = Pin<Box<dyn Future<Output = SubscriberGuard> + Send>>;

impl TaskRunner {
    pub fn new(
        config: RunnerConfig,
        executor: Arc<TaskExecutor>,
        output_sink: Arc<dyn OutputSink>,
        telemetry: Arc<dyn TelemetrySink>,
        process_manager: Option<Arc<ProcessManager>>,
    ) -> Self {
        Self { config, executor, output_sink, telemetry, process_manager }
    }

    /// Runs every task in `tasks` under `command_name`, respecting dependency order, up to
    /// `parallelism` concurrently. `cancel` resolves once if the caller requests external
    /// cancellation; the frontier then stops admitting new tasks and in-flight ones are awaited
    /// (their child processes are best-effort signaled through the process manager).
    pub async fn execute(
        &self,
        tasks: &TaskCollection<Built>,
        command_name: &str,
        runnable: &HashMap<TaskId, RunnableTask>,
        cancel: Option<SignalSubscriber>,
    ) -> RunSummary {
        let start = Instant::now();
        let task_ids: Vec<TaskId> = tasks.tasks().cloned().collect();
        self.telemetry.record(TelemetryEvent::RunStarted { task_count: task_ids.len() });

        let mut remaining_deps: HashMap<TaskId, HashSet<TaskId>> = HashMap::new();
        let mut all_deps: HashMap<TaskId, HashSet<TaskId>> = HashMap::new();
        for task in &task_ids {
            let deps: HashSet<TaskId> = tasks.dependencies_of(task).into_iter().cloned().collect();
            remaining_deps.insert(task.clone(), deps.clone());
            all_deps.insert(task.clone(), deps);
        }
        // Tasks whose command actually ran and did real work, as opposed to being skipped or
        // restored from cache — a downstream task forces a rebuild when one of its dependencies
        // lands here, since its declared inputs may have changed as a result.
        let mut rebuilt: HashSet<TaskId> = HashSet::new();

        let priority: HashMap<TaskId, usize> = tasks
            .ordered_tasks()
            .into_iter()
            .enumerate()
            .map(|(rank, task)| (task.clone(), rank))
            .collect();
        let rank_of = |task: &TaskId| priority.get(task).copied().unwrap_or(usize::MAX);

        let (ready_tx, mut ready_rx) = mpsc::unbounded_channel::<TaskId>();
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<TaskResult>();
        let semaphore = Arc::new(Semaphore::new(self.config.run_opts.parallelism.resolve()));

        let mut pending: Vec<TaskId> = Vec::new();
        let mut results: HashMap<TaskId, TaskResult> = HashMap::new();
        let mut active = 0usize;
        let mut cancelled = false;

        for task in &task_ids {
            if remaining_deps[task].is_empty() {
                pending.push(task.clone());
            }
        }
        pending.sort_by(|a, b| rank_of(b).cmp(&rank_of(a)));

        let mut cancel_listen: Option<CancelFuture> =
            cancel.map(|subscriber| Box::pin(subscriber.listen()) as CancelFuture);

        loop {
            if !cancelled {
                while let Some(next) = pending.pop() {
                    let _ = ready_tx.send(next);
                }
            }

            if results.len() == task_ids.len() {
                break;
            }
            if cancelled && active == 0 {
                break;
            }

            tokio::select! {
                biased;

                _guard = async { cancel_listen.as_mut().unwrap().await }, if cancel_listen.is_some() && !cancelled => {
                    cancelled = true;
                    cancel_listen = None;
                    if let Some(manager) = &self.process_manager {
                        manager.stop_all().await;
                    }
                }

                Some(task) = ready_rx.recv(), if !cancelled => {
                    match runnable.get(&task) {
                        Some(task_spec) => {
                            active += 1;
                            let force_rebuild = !self.config.run_opts.changed_projects_only
                                && all_deps
                                    .get(&task)
                                    .map(|deps| deps.iter().any(|d| rebuilt.contains(d)))
                                    .unwrap_or(false);
                            self.spawn_worker(task, task_spec.clone(), command_name, force_rebuild, semaphore.clone(), result_tx.clone());
                        }
                        None => {
                            // No script declared for this project: a no-op success, same as an
                            // empty command string would be.
                            let _ = result_tx.send(TaskResult {
                                task,
                                status: TaskStatus::Success,
                                duration_ms: 0,
                                stderr_tail: None,
                            });
                        }
                    }
                }

                Some(result) = result_rx.recv() => {
                    active -= 1;
                    self.telemetry.record(TelemetryEvent::TaskFinished {
                        task: result.task.clone(),
                        status: result.status,
                        duration_ms: result.duration_ms,
                    });

                    if matches!(result.status, TaskStatus::Success | TaskStatus::SuccessWithWarning | TaskStatus::Failure) {
                        rebuilt.insert(result.task.clone());
                    }

                    let newly_ready = self.unblock_dependents(tasks, &result, &mut remaining_deps, &mut results);
                    results.insert(result.task.clone(), result);
                    if !cancelled {
                        pending.extend(newly_ready);
                        pending.sort_by(|a, b| rank_of(b).cmp(&rank_of(a)));
                    }
                }
            }
        }

        // A task that never got a result (cancellation drained the frontier before it ran) is
        // recorded as Blocked so every task id has a final status.
        for task in &task_ids {
            results.entry(task.clone()).or_insert_with(|| TaskResult {
                task: task.clone(),
                status: TaskStatus::Blocked,
                duration_ms: 0,
                stderr_tail: None,
            });
        }

        let all_success_like = results.values().all(|r| r.status.is_success_like());
        let warnings_ok = self.config.run_opts.allow_warnings_in_success
            || !results.values().any(|r| r.status == TaskStatus::SuccessWithWarning);
        let success = all_success_like && warnings_ok;

        let duration_ms = start.elapsed().as_millis() as u64;
        self.telemetry.record(TelemetryEvent::RunFinished { success, duration_ms });

        let mut ordered_results: Vec<TaskResult> = results.into_values().collect();
        ordered_results.sort_by(|a, b| a.task.as_ref().cmp(b.task.as_ref()));
        RunSummary { results: ordered_results, success }
    }

    fn spawn_worker(
        &self,
        task: TaskId,
        runnable: RunnableTask,
        command_name: &str,
        force_rebuild: bool,
        semaphore: Arc<Semaphore>,
        result_tx: mpsc::UnboundedSender<TaskResult>,
    ) {
        let executor = self.executor.clone();
        let output_sink = self.output_sink.clone();
        let command_name = command_name.to_string();
        let incremental = self.config.run_opts.incremental;
        let tool_version_tag = self.config.tool_version_tag.clone();

        tokio::spawn(async move {
            let _permit = semaphore.acquire().await.expect("semaphore is never closed");
            let mut writer = output_sink.writer_for(&task);

            let spec = TaskSpec {
                command_name: &command_name,
                command: &runnable.command,
                project_root: &runnable.project_root,
                output_globs: &runnable.output_globs,
                env: &runnable.env,
                tool_version_tag: &tool_version_tag,
                incremental,
                force_rebuild,
            };

            let outcome = executor.execute(&task, spec, &mut *writer).await;
            writer.finish(outcome.status.label());

            let _ = result_tx.send(TaskResult {
                task,
                status: outcome.status,
                duration_ms: outcome.duration_ms,
                stderr_tail: outcome.stderr_tail,
            });
        });
    }

    /// Applies a finished task's result to its dependents: on a success-like terminal state,
    /// removes the finished task from each direct dependent's remaining-dependency set; on a
    /// failure-like state, marks every transitive dependent `Blocked` (they can never run) via a
    /// worklist over `dependents_of`. Returns the tasks whose remaining-dependency set just
    /// became empty and are therefore ready to run.
    fn unblock_dependents(
        &self,
        tasks: &TaskCollection<Built>,
        result: &TaskResult,
        remaining_deps: &mut HashMap<TaskId, HashSet<TaskId>>,
        results: &mut HashMap<TaskId, TaskResult>,
    ) -> Vec<TaskId> {
        if result.status.is_failure_like() {
            let mut stack: Vec<TaskId> = tasks.dependents_of(&result.task).into_iter().cloned().collect();
            while let Some(dependent) = stack.pop() {
                if results.contains_key(&dependent) {
                    continue;
                }
                results.insert(
                    dependent.clone(),
                    TaskResult {
                        task: dependent.clone(),
                        status: TaskStatus::Blocked,
                        duration_ms: 0,
                        stderr_tail: None,
                    },
                );
                stack.extend(tasks.dependents_of(&dependent).into_iter().cloned());
            }
            return Vec::new();
        }

        let mut newly_ready = Vec::new();
        for dependent in tasks.dependents_of(&result.task) {
            if results.contains_key(dependent) {
                continue;
            }
            if let Some(deps) = remaining_deps.get_mut(dependent) {
                deps.remove(&result.task);
                if deps.is_empty() {
                    newly_ready.push(dependent.clone());
                }
            }
        }
        newly_ready
    }
}
