//! Executes a single task: the per-task pipeline described by the scheduler (read prior state,
//! ask the change analyzer for current file hashes, compute a fingerprint, try the cache, compare
//! against prior state for an incremental skip, and finally spawn the command).
//!
//! Deliberately ignorant of the task graph — [`TaskExecutor`] runs exactly one task and reports
//! its outcome; the frontier, concurrency limit, and `Blocked` propagation all live in the
//! scheduler that owns many of these.

mod state_file;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use cascade_paths::AbsoluteSystemPathBuf;
use cascade_run_cache::RunCache;
use cascade_task_id::TaskId;
use cascade_types::cache::CacheOutcome;
use cascade_types::output::{OutputKind, OutputWriter};
use cascade_types::process::ShellRunner;
use cascade_types::scm::ChangeAnalyzer;
use cascade_types::status::TaskStatus;

pub use state_file::{StateFile, STATE_DIR_NAME};

/// Everything [`TaskExecutor::execute`] needs to run one task, besides the output writer.
pub struct TaskSpec<'a> {
    /// The task's script name (e.g. `"build"`), used to namespace its state file.
    pub command_name: &'a str,
    /// The shell command to run. An empty/whitespace-only command is a no-op: state is written,
    /// the task terminates `Success`, and no child process is spawned.
    pub command: &'a str,
    pub project_root: &'a AbsoluteSystemPathBuf,
    pub output_globs: &'a [String],
    pub env: &'a HashMap<String, String>,
    pub tool_version_tag: &'a str,
    pub incremental: bool,
    /// Set by the scheduler when an upstream dependency actually rebuilt (rather than being
    /// skipped or restored from cache) and `changed-projects-only` is not in effect — forces this
    /// task past the incremental-skip shortcut even if its own files are unchanged.
    pub force_rebuild: bool,
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub duration_ms: u64,
    /// Present for `Failure`; the tail of what the command wrote to stderr.
    pub stderr_tail: Option<String>,
}

/// Runs one task's command (or recognizes that it can be skipped/restored), wiring together the
/// four injected capabilities: change analysis, the build cache, and shell execution.
pub struct TaskExecutor {
    change_analyzer: Arc<dyn ChangeAnalyzer>,
    shell_runner: Arc<dyn ShellRunner>,
    run_cache: Arc<RunCache>,
    cache_enabled: bool,
}

impl TaskExecutor {
    pub fn new(
        change_analyzer: Arc<dyn ChangeAnalyzer>,
        shell_runner: Arc<dyn ShellRunner>,
        run_cache: Arc<RunCache>,
        cache_enabled: bool,
    ) -> Self {
        Self { change_analyzer, shell_runner, run_cache, cache_enabled }
    }

    pub async fn execute(
        &self,
        task: &TaskId,
        spec: TaskSpec<'_>,
        writer: &mut dyn OutputWriter,
    ) -> TaskOutcome {
        let start = Instant::now();

        if spec.command.trim().is_empty() {
            let _ = state_file::write(
                spec.project_root,
                spec.command_name,
                &StateFile { files: Default::default(), arguments: String::new() },
            );
            return TaskOutcome { status: TaskStatus::Success, duration_ms: 0, stderr_tail: None };
        }

        // `Unavailable` degrades the task to always-run, uncacheable, rather than failing it.
        let file_hashes = self.change_analyzer.file_hashes(spec.project_root).await.ok();

        let fingerprint = file_hashes.as_ref().map(|hashes| {
            cascade_task_hash::fingerprint(
                spec.command,
                hashes,
                spec.tool_version_tag,
                &spec.output_globs.join(","),
            )
        });

        if self.cache_enabled {
            if let Some(fingerprint) = &fingerprint {
                if let Ok(CacheOutcome::Restored) =
                    self.run_cache.restore(fingerprint, spec.project_root).await
                {
                    if let Some(hashes) = &file_hashes {
                        let _ = state_file::write(
                            spec.project_root,
                            spec.command_name,
                            &StateFile { files: hashes.clone(), arguments: spec.command.to_string() },
                        );
                    }
                    return TaskOutcome {
                        status: TaskStatus::FromCache,
                        duration_ms: start.elapsed().as_millis() as u64,
                        stderr_tail: None,
                    };
                }
            }
        }

        if !spec.force_rebuild && spec.incremental {
            if let Some(current) = &file_hashes {
                if let Some(prior) = state_file::read(spec.project_root, spec.command_name) {
                    if prior.arguments == spec.command && &prior.files == current {
                        return TaskOutcome {
                            status: TaskStatus::Skipped,
                            duration_ms: start.elapsed().as_millis() as u64,
                            stderr_tail: None,
                        };
                    }
                }
            }
        }

        // An interrupted rebuild must not leave stale "success" state behind.
        state_file::remove(spec.project_root, spec.command_name);

        let mut tracking = StderrTrackingWriter { inner: writer, tail: Vec::new() };
        let exit = self
            .shell_runner
            .run(spec.command, spec.project_root, spec.env, &mut tracking)
            .await;
        let saw_stderr = !tracking.tail.is_empty();
        let stderr_tail = tracking.tail_text();
        let duration_ms = start.elapsed().as_millis() as u64;

        let exit = match exit {
            Ok(exit) => exit,
            Err(err) => {
                return TaskOutcome {
                    status: TaskStatus::Failure,
                    duration_ms,
                    stderr_tail: Some(err.to_string()),
                }
            }
        };

        if !exit.is_success() {
            return TaskOutcome {
                status: TaskStatus::Failure,
                duration_ms,
                stderr_tail: Some(
                    stderr_tail.unwrap_or_else(|| format!("command exited with {exit:?}")),
                ),
            };
        }

        if let Some(hashes) = &file_hashes {
            let _ = state_file::write(
                spec.project_root,
                spec.command_name,
                &StateFile { files: hashes.clone(), arguments: spec.command.to_string() },
            );
        }

        let mut status = TaskStatus::Success;
        if self.cache_enabled {
            if let Some(fingerprint) = &fingerprint {
                if self.run_cache.store(task, fingerprint, spec.project_root, duration_ms).await.is_err()
                {
                    status = TaskStatus::SuccessWithWarning;
                }
            }
        }
        if saw_stderr {
            status = TaskStatus::SuccessWithWarning;
        }

        TaskOutcome { status, duration_ms, stderr_tail: None }
    }
}

/// Keep at most this many trailing bytes of stderr for a failure report; enough for a handful of
/// lines without holding a whole noisy build's output in memory.
const STDERR_TAIL_BYTES: usize = 4096;

/// Forwards every write to the real writer while keeping a bounded tail of what landed on
/// stderr, so a failing task's report shows the command's actual error output and a zero exit
/// code that still produced warnings can be reported as `SuccessWithWarning`.
struct StderrTrackingWriter<'a> {
    inner: &'a mut dyn OutputWriter,
    tail: Vec<u8>,
}

impl StderrTrackingWriter<'_> {
    fn tail_text(&self) -> Option<String> {
        if self.tail.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&self.tail).trim().to_string())
    }
}

impl OutputWriter for StderrTrackingWriter<'_> {
    fn write(&mut self, kind: OutputKind, chunk: &[u8]) {
        if kind == OutputKind::Stderr {
            self.tail.extend_from_slice(chunk);
            if self.tail.len() > STDERR_TAIL_BYTES {
                let overflow = self.tail.len() - STDERR_TAIL_BYTES;
                self.tail.drain(..overflow);
            }
        }
        self.inner.write(kind, chunk);
    }

    fn finish(&mut self, status_label: &str) {
        self.inner.finish(status_label);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use cascade_types::cache::{BuildCache, CacheError, CacheFingerprint, StoreOutcome};
    use cascade_types::process::{ChildExit, ProcessError};
    use cascade_types::scm::{AnalyzerError, FileHashMap};

    use super::*;

    struct StubAnalyzer(FileHashMap);

    #[async_trait]
    impl ChangeAnalyzer for StubAnalyzer {
        async fn file_hashes(
            &self,
            _project_root: &AbsoluteSystemPathBuf,
        ) -> Result<FileHashMap, AnalyzerError> {
            Ok(self.0.clone())
        }
    }

    struct UnavailableAnalyzer;

    #[async_trait]
    impl ChangeAnalyzer for UnavailableAnalyzer {
        async fn file_hashes(
            &self,
            project_root: &AbsoluteSystemPathBuf,
        ) -> Result<FileHashMap, AnalyzerError> {
            Err(AnalyzerError::Unavailable(project_root.clone(), "no git".to_string()))
        }
    }

    struct ScriptedRunner {
        exit: ChildExit,
        stderr: Option<&'static [u8]>,
    }

    #[async_trait]
    impl ShellRunner for ScriptedRunner {
        async fn run(
            &self,
            _command: &str,
            _cwd: &AbsoluteSystemPathBuf,
            _env: &HashMap<String, String>,
            output: &mut dyn OutputWriter,
        ) -> Result<ChildExit, ProcessError> {
            if let Some(stderr) = self.stderr {
                output.write(OutputKind::Stderr, stderr);
            }
            Ok(self.exit)
        }
    }

    #[derive(Default)]
    struct NoCache;

    #[async_trait]
    impl BuildCache for NoCache {
        async fn try_restore(
            &self,
            _fingerprint: &CacheFingerprint,
            _restore_root: &AbsoluteSystemPathBuf,
        ) -> Result<CacheOutcome, CacheError> {
            Ok(CacheOutcome::Miss)
        }

        async fn try_store(
            &self,
            _fingerprint: &CacheFingerprint,
            _project_root: &AbsoluteSystemPathBuf,
            _output_globs: &[String],
            _duration_ms: u64,
        ) -> Result<StoreOutcome, CacheError> {
            Ok(StoreOutcome::Skipped)
        }
    }

    struct NullWriter;
    impl OutputWriter for NullWriter {
        fn write(&mut self, _kind: OutputKind, _chunk: &[u8]) {}
        fn finish(&mut self, _status_label: &str) {}
    }

    fn executor(analyzer: Arc<dyn ChangeAnalyzer>, runner: Arc<dyn ShellRunner>) -> TaskExecutor {
        let run_cache = Arc::new(RunCache::new(Arc::new(NoCache)));
        TaskExecutor::new(analyzer, runner, run_cache, false)
    }

    fn project_root() -> (tempfile::TempDir, AbsoluteSystemPathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = AbsoluteSystemPathBuf::new(dir.path().canonicalize().unwrap()).unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn empty_command_is_a_no_op_success() {
        let (_dir, root) = project_root();
        let executor = executor(
            Arc::new(StubAnalyzer(FileHashMap::new())),
            Arc::new(ScriptedRunner { exit: ChildExit::Finished(0), stderr: None }),
        );
        let task = TaskId::new("web#build").unwrap();
        let spec = TaskSpec {
            command_name: "build",
            command: "",
            project_root: &root,
            output_globs: &[],
            env: &HashMap::new(),
            tool_version_tag: "0.1.0",
            incremental: true,
            force_rebuild: false,
        };
        let outcome = executor.execute(&task, spec, &mut NullWriter).await;
        assert_eq!(outcome.status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn second_identical_run_is_skipped() {
        let (_dir, root) = project_root();
        let mut hashes = FileHashMap::new();
        hashes.insert("src/lib.rs", "abc123");
        let executor = executor(
            Arc::new(StubAnalyzer(hashes)),
            Arc::new(ScriptedRunner { exit: ChildExit::Finished(0), stderr: None }),
        );
        let task = TaskId::new("web#build").unwrap();
        let make_spec = || TaskSpec {
            command_name: "build",
            command: "cargo build",
            project_root: &root,
            output_globs: &[],
            env: &HashMap::new(),
            tool_version_tag: "0.1.0",
            incremental: true,
            force_rebuild: false,
        };

        let first = executor.execute(&task, make_spec(), &mut NullWriter).await;
        assert_eq!(first.status, TaskStatus::Success);

        let second = executor.execute(&task, make_spec(), &mut NullWriter).await;
        assert_eq!(second.status, TaskStatus::Skipped);
    }

    #[tokio::test]
    async fn force_rebuild_bypasses_the_incremental_skip() {
        let (_dir, root) = project_root();
        let mut hashes = FileHashMap::new();
        hashes.insert("src/lib.rs", "abc123");
        let executor = executor(
            Arc::new(StubAnalyzer(hashes)),
            Arc::new(ScriptedRunner { exit: ChildExit::Finished(0), stderr: None }),
        );
        let task = TaskId::new("web#build").unwrap();
        let make_spec = |force| TaskSpec {
            command_name: "build",
            command: "cargo build",
            project_root: &root,
            output_globs: &[],
            env: &HashMap::new(),
            tool_version_tag: "0.1.0",
            incremental: true,
            force_rebuild: force,
        };

        executor.execute(&task, make_spec(false), &mut NullWriter).await;
        let forced = executor.execute(&task, make_spec(true), &mut NullWriter).await;
        assert_eq!(forced.status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_failure() {
        let (_dir, root) = project_root();
        let executor = executor(
            Arc::new(StubAnalyzer(FileHashMap::new())),
            Arc::new(ScriptedRunner { exit: ChildExit::Finished(1), stderr: None }),
        );
        let task = TaskId::new("web#build").unwrap();
        let spec = TaskSpec {
            command_name: "build",
            command: "cargo build",
            project_root: &root,
            output_globs: &[],
            env: &HashMap::new(),
            tool_version_tag: "0.1.0",
            incremental: true,
            force_rebuild: false,
        };
        let outcome = executor.execute(&task, spec, &mut NullWriter).await;
        assert_eq!(outcome.status, TaskStatus::Failure);
        assert!(outcome.stderr_tail.is_some());
    }

    #[tokio::test]
    async fn failure_stderr_tail_is_the_command_s_actual_stderr() {
        let (_dir, root) = project_root();
        let executor = executor(
            Arc::new(StubAnalyzer(FileHashMap::new())),
            Arc::new(ScriptedRunner {
                exit: ChildExit::Finished(1),
                stderr: Some(b"error: something broke\n"),
            }),
        );
        let task = TaskId::new("web#build").unwrap();
        let spec = TaskSpec {
            command_name: "build",
            command: "cargo build",
            project_root: &root,
            output_globs: &[],
            env: &HashMap::new(),
            tool_version_tag: "0.1.0",
            incremental: true,
            force_rebuild: false,
        };
        let outcome = executor.execute(&task, spec, &mut NullWriter).await;
        assert_eq!(outcome.status, TaskStatus::Failure);
        assert_eq!(outcome.stderr_tail.as_deref(), Some("error: something broke"));
    }

    #[tokio::test]
    async fn zero_exit_with_stderr_is_success_with_warning() {
        let (_dir, root) = project_root();
        let executor = executor(
            Arc::new(StubAnalyzer(FileHashMap::new())),
            Arc::new(ScriptedRunner { exit: ChildExit::Finished(0), stderr: Some(b"deprecation warning\n") }),
        );
        let task = TaskId::new("web#build").unwrap();
        let spec = TaskSpec {
            command_name: "build",
            command: "cargo build",
            project_root: &root,
            output_globs: &[],
            env: &HashMap::new(),
            tool_version_tag: "0.1.0",
            incremental: true,
            force_rebuild: false,
        };
        let outcome = executor.execute(&task, spec, &mut NullWriter).await;
        assert_eq!(outcome.status, TaskStatus::SuccessWithWarning);
    }

    #[tokio::test]
    async fn unavailable_change_analyzer_still_runs_the_command() {
        let (_dir, root) = project_root();
        let executor = executor(
            Arc::new(UnavailableAnalyzer),
            Arc::new(ScriptedRunner { exit: ChildExit::Finished(0), stderr: None }),
        );
        let task = TaskId::new("web#build").unwrap();
        let spec = TaskSpec {
            command_name: "build",
            command: "cargo build",
            project_root: &root,
            output_globs: &[],
            env: &HashMap::new(),
            tool_version_tag: "0.1.0",
            incremental: true,
            force_rebuild: false,
        };
        let outcome = executor.execute(&task, spec, &mut NullWriter).await;
        assert_eq!(outcome.status, TaskStatus::Success);
    }
}
