use std::collections::HashMap;
use std::sync::Arc;

use cascade_cache::LocalFsCache;
use cascade_engine::TaskCollection;
use cascade_errors::{Classify, ErrorClassification};
use cascade_paths::AbsoluteSystemPathBuf;
use cascade_process::{ProcessManager, ProcessShellRunner};
use cascade_repository::ProjectId;
use cascade_runner::project_config::{task_id, ProjectConfigError, RepositoryConfig};
use cascade_runner::signal::SignalHandler;
use cascade_runner::{cli::Args, logging, RunnableTask, TaskRunnerBuilder};
use cascade_scm::GitChangeAnalyzer;
use cascade_task_id::TaskId;
use cascade_telemetry::TracingTelemetrySink;
use cascade_types::RunnerConfig;
use clap::Parser;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("invalid repository root: {0}")]
    RepoRoot(String),
    #[error(transparent)]
    #[diagnostic(code(cascade::config))]
    Config(#[from] cascade_runner::project_config::ProjectConfigError),
    #[error(transparent)]
    #[diagnostic(code(cascade::engine))]
    Engine(#[from] cascade_engine::EngineError),
    #[error(transparent)]
    #[diagnostic(code(cascade::parallelism))]
    Parallelism(#[from] cascade_types::ParallelismError),
    #[error("failed to create cache directory: {0}")]
    Cache(String),
    /// One or more tasks failed; their messages were already written to the output collator as
    /// they ran, so the top-level diagnostic is suppressed and only the exit code matters.
    #[error(transparent)]
    #[diagnostic(code(cascade::task_failure))]
    TaskFailure(#[from] cascade_errors::AlreadyReportedError),
}

impl Classify for CliError {
    fn classify(&self) -> ErrorClassification {
        match self {
            CliError::RepoRoot(_) => ErrorClassification::UserInput,
            CliError::Config(_) => ErrorClassification::Configuration,
            CliError::Engine(_) => ErrorClassification::TaskExecution,
            CliError::Parallelism(_) => ErrorClassification::UserInput,
            CliError::Cache(_) => ErrorClassification::Cache,
            CliError::TaskFailure(_) => ErrorClassification::TaskExecution,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(args.verbose as usize, args.color.into());

    match run(args).await {
        Ok(()) => std::process::exit(0),
        Err(err @ CliError::TaskFailure(_)) => std::process::exit(err.classify().exit_code()),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::exit(err.classify().exit_code());
        }
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let repo_root = AbsoluteSystemPathBuf::new(
        std::fs::canonicalize(&args.repo_root).map_err(|e| CliError::RepoRoot(e.to_string()))?,
    )
    .map_err(|e| CliError::RepoRoot(e.to_string()))?;

    let config_path = repo_root.join("cascade.json");
    let repository = RepositoryConfig::load(&config_path, &repo_root)?;

    let to: Vec<ProjectId> = args.to.iter().map(|s| ProjectId::new(s.clone())).collect();
    let from: Vec<ProjectId> = args.from.iter().map(|s| ProjectId::new(s.clone())).collect();
    let selected = repository.graph.select(&to, &from).map_err(ProjectConfigError::from)?;

    let run_opts = args.run_opts()?;
    let runner_config = RunnerConfig::new(run_opts.clone(), args.color.into());

    let mut building = TaskCollection::new(run_opts.ignore_dependency_order);
    for project in &selected {
        building.add_task(task_id(project.id(), &args.task))?;
    }
    // A task depends on another task of the same command name, for each project dependency that
    // also made it into the selection.
    for project in &selected {
        let project_task = task_id(project.id(), &args.task);
        for dependency in repository.direct_dependencies(project.id()) {
            if selected.iter().any(|p| p.id() == &dependency) {
                building.add_dependencies(&project_task, &[task_id(&dependency, &args.task)])?;
            }
        }
    }
    let tasks = building.build()?;

    let mut runnable: HashMap<TaskId, RunnableTask> = HashMap::new();
    let mut output_globs = Vec::new();
    for project in &selected {
        let project_task = task_id(project.id(), &args.task);
        let globs = repository.output_globs(project.id());
        output_globs.push((project_task.clone(), globs.clone()));
        if let Some(command) = project.script(&args.task) {
            runnable.insert(
                project_task,
                RunnableTask {
                    command: command.to_string(),
                    project_root: project.root().clone(),
                    output_globs: globs,
                    env: task_env(project.root()),
                },
            );
        }
    }

    let cache_dir = repo_root.join(".cascade").join("cache");
    let cache = Arc::new(LocalFsCache::new(cache_dir).map_err(|e| CliError::Cache(e.to_string()))?);
    let change_analyzer = Arc::new(GitChangeAnalyzer::new(vec![".cascade/**".to_string()]));
    let process_manager = Arc::new(ProcessManager::new());
    let shell_runner = Arc::new(ProcessShellRunner::new(process_manager.clone()));
    let output_sink = Arc::new(cascade_ui::TerminalOutputSink::stdout(run_opts.quiet_mode));

    let runner = TaskRunnerBuilder::new(runner_config, change_analyzer, cache, shell_runner, output_sink)
        .with_telemetry(Arc::new(TracingTelemetrySink))
        .with_process_manager(process_manager)
        .build(output_globs);

    let signal_handler = SignalHandler::new(async {
        tokio::signal::ctrl_c().await.ok()
    });
    let cancel = signal_handler.subscribe();

    let summary = runner.execute(&tasks, &args.task, &runnable, cancel).await;
    signal_handler.close().await;

    for result in &summary.results {
        if let Some(tail) = &result.stderr_tail {
            eprintln!("{}: {} ({tail})", result.task, result.status);
        }
    }

    if summary.success {
        Ok(())
    } else {
        Err(cascade_errors::AlreadyReportedError.into())
    }
}

fn task_env(project_root: &AbsoluteSystemPathBuf) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    let bin_dir = project_root.join("node_modules").join(".bin");
    let existing = env.get("PATH").cloned().unwrap_or_default();
    let separator = if cfg!(windows) { ';' } else { ':' };
    env.insert("PATH".to_string(), format!("{}{separator}{existing}", bin_dir));
    env
}
