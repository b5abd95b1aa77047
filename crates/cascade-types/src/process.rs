use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use cascade_paths::AbsoluteSystemPathBuf;
use thiserror::Error;

use crate::output::OutputWriter;

/// How a still-running child should be asked to stop.
#[derive(Debug, Clone, Copy)]
pub enum ShutdownStyle {
    /// Send a platform interrupt signal and wait up to the given duration before escalating.
    Graceful(Duration),
    /// Kill immediately.
    Kill,
}

/// The outcome of waiting on a spawned child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Finished(i32),
    Killed,
    KilledExternal,
}

impl ChildExit {
    pub fn is_success(&self) -> bool {
        matches!(self, ChildExit::Finished(0))
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn command: {0}")]
    Spawn(String),
    #[error("failed to write child output: {0}")]
    Io(String),
}

/// Spawns a task's command and streams its stdio through an [`OutputWriter`].
///
/// The command string is executed by the operating system's default shell; the working
/// directory is the project folder.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        cwd: &AbsoluteSystemPathBuf,
        env: &HashMap<String, String>,
        output: &mut dyn OutputWriter,
    ) -> Result<ChildExit, ProcessError>;
}
