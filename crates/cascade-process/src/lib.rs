//! Cross-platform child-process spawning, stdio capture, and graceful/forceful shutdown — the
//! concrete [`ShellRunner`](cascade_types::ShellRunner) the task runner spawns project commands
//! through.

mod child;
mod command;

use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use cascade_paths::AbsoluteSystemPathBuf;
use cascade_types::{ChildExit as ApiChildExit, OutputWriter, ProcessError, ShellRunner, ShutdownStyle as ApiShutdownStyle};
pub use child::{Child, ChildExit, ChildPipes};
pub use command::Command;

const GRACE_PERIOD: Duration = Duration::from_secs(10);

fn to_api_exit(exit: ChildExit) -> ApiChildExit {
    match exit {
        ChildExit::Finished(Some(code)) => ApiChildExit::Finished(code),
        ChildExit::Finished(None) => ApiChildExit::Killed,
        ChildExit::Killed => ApiChildExit::Killed,
        ChildExit::KilledExternal => ApiChildExit::KilledExternal,
        ChildExit::Failed => ApiChildExit::Killed,
    }
}

/// Tracks every currently-live child so external cancellation can stop them all without the
/// caller needing a handle to each individual task.
#[derive(Default)]
pub struct ProcessManager {
    children: Mutex<Vec<Child>>,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, child: Child) {
        self.children.lock().expect("lock poisoned").push(child);
    }

    fn unregister(&self, pid: Option<u32>) {
        let mut children = self.children.lock().expect("lock poisoned");
        if let Some(pid) = pid {
            children.retain(|c| c.pid() != Some(pid));
        }
    }

    /// Signals every live child to stop gracefully; does not wait for them to exit.
    pub async fn stop_all(&self) {
        let children = { self.children.lock().expect("lock poisoned").clone() };
        for mut child in children {
            child.stop().await;
        }
    }
}

/// The [`ShellRunner`] implementation backing real builds: spawns the default shell, streams
/// stdio through the collator, and registers the child with a [`ProcessManager`] so an external
/// cancellation can reach it.
pub struct ProcessShellRunner {
    manager: std::sync::Arc<ProcessManager>,
}

impl ProcessShellRunner {
    pub fn new(manager: std::sync::Arc<ProcessManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ShellRunner for ProcessShellRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &AbsoluteSystemPathBuf,
        env: &HashMap<String, String>,
        output: &mut dyn OutputWriter,
    ) -> Result<ApiChildExit, ProcessError> {
        let command = Command::shell(command, cwd.clone(), env.clone());
        let label = command.label().to_string();
        let (child, pipes) = Child::spawn(command, crate::child::ShutdownStyle::Graceful(GRACE_PERIOD))
            .map_err(|e| ProcessError::Spawn(format!("{label}: {e}")))?;

        self.manager.register(child.clone());
        let pid = child.pid();

        pipes
            .drain_into(output)
            .await
            .map_err(|e| ProcessError::Io(e.to_string()))?;

        let mut child = child;
        let exit = child.wait().await;
        self.manager.unregister(pid);
        Ok(to_api_exit(exit))
    }
}

impl From<ApiShutdownStyle> for crate::child::ShutdownStyle {
    fn from(style: ApiShutdownStyle) -> Self {
        match style {
            ApiShutdownStyle::Graceful(d) => crate::child::ShutdownStyle::Graceful(d),
            ApiShutdownStyle::Kill => crate::child::ShutdownStyle::Kill,
        }
    }
}
