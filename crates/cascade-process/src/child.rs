use std::time::Duration;

use cascade_types::{OutputKind, OutputWriter};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    process::Child as TokioChild,
    sync::watch,
};
use tracing::{debug, trace};

use crate::command::Command;

/// The outcome of waiting on a spawned child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Finished(Option<i32>),
    Killed,
    KilledExternal,
    Failed,
}

/// How a still-running child should be asked to stop.
#[derive(Debug, Clone, Copy)]
pub enum ShutdownStyle {
    /// Send a platform interrupt signal and wait up to the given duration before escalating
    /// to a kill.
    Graceful(Duration),
    Kill,
}

impl ShutdownStyle {
    #[cfg(unix)]
    fn interrupt(pid: u32) {
        use nix::{
            sys::signal::{kill, Signal},
            unistd::Pid,
        };
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGINT);
    }

    #[cfg(not(unix))]
    fn interrupt(_pid: u32) {}

    async fn apply(&self, child: &mut TokioChild) -> ChildExit {
        match self {
            ShutdownStyle::Kill => {
                let _ = child.kill().await;
                ChildExit::Killed
            }
            ShutdownStyle::Graceful(grace) => {
                let Some(pid) = child.id() else {
                    return ChildExit::KilledExternal;
                };
                Self::interrupt(pid);
                match tokio::time::timeout(*grace, child.wait()).await {
                    Ok(Ok(status)) => ChildExit::Finished(status.code()),
                    Ok(Err(_)) => ChildExit::Failed,
                    Err(_elapsed) => {
                        debug!("task did not exit within grace period, escalating to kill");
                        let _ = child.kill().await;
                        ChildExit::Killed
                    }
                }
            }
        }
    }
}

enum Signal {
    Stop,
    Kill,
}

/// A spawned task command: an actor owning the `tokio::process::Child`, reachable through a
/// cheaply-clonable handle so the runner's cancellation path and the worker awaiting normal
/// exit never race on the same `Child`.
#[derive(Clone)]
pub struct Child {
    pid: Option<u32>,
    label: String,
    signal: tokio::sync::mpsc::Sender<Signal>,
    exit: watch::Receiver<Option<ChildExit>>,
}

impl Child {
    /// Spawns `command`, returning a handle plus the raw stdout/stderr pipes for the caller to
    /// stream. The process is already running by the time this returns.
    pub fn spawn(command: Command, shutdown_style: ShutdownStyle) -> std::io::Result<(Self, ChildPipes)> {
        let label = command.label().to_string();
        let mut tokio_command: tokio::process::Command = command.into();
        let mut child = tokio_command.spawn()?;
        let pid = child.id();

        let stdout = child.stdout.take().expect("spawned with piped stdout");
        let stderr = child.stderr.take().expect("spawned with piped stderr");

        let (signal_tx, mut signal_rx) = tokio::sync::mpsc::channel::<Signal>(1);
        let (exit_tx, exit_rx) = watch::channel(None);

        let task_label = label.clone();
        tokio::spawn(async move {
            let label = task_label;
            let outcome = tokio::select! {
                biased;
                signal = signal_rx.recv() => {
                    match signal {
                        Some(Signal::Kill) => ShutdownStyle::Kill.apply(&mut child).await,
                        Some(Signal::Stop) | None => shutdown_style.apply(&mut child).await,
                    }
                }
                status = child.wait() => match status {
                    Ok(status) => ChildExit::Finished(status.code()),
                    Err(_) => ChildExit::Failed,
                },
            };
            trace!(label = %label, outcome = ?outcome, "child process finished");
            let _ = exit_tx.send(Some(outcome));
        });

        Ok((
            Self { pid, label, signal: signal_tx, exit: exit_rx },
            ChildPipes { stdout, stderr },
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Waits for the child to reach a terminal state.
    pub async fn wait(&mut self) -> ChildExit {
        let _ = self.exit.changed().await;
        self.exit.borrow().unwrap_or(ChildExit::Failed)
    }

    /// Best-effort graceful shutdown (see [`ShutdownStyle`]).
    pub async fn stop(&mut self) -> ChildExit {
        let _ = self.signal.send(Signal::Stop).await;
        self.wait().await
    }

    pub async fn kill(&mut self) -> ChildExit {
        let _ = self.signal.send(Signal::Kill).await;
        self.wait().await
    }
}

pub struct ChildPipes {
    stdout: tokio::process::ChildStdout,
    stderr: tokio::process::ChildStderr,
}

impl ChildPipes {
    /// Streams stdout/stderr into `writer`, tagging each chunk, until both pipes hit EOF.
    /// Returns once streaming is done; the caller separately awaits [`Child::wait`] for the
    /// exit status.
    pub async fn drain_into(self, writer: &mut dyn OutputWriter) -> std::io::Result<()> {
        let mut stdout = BufReader::new(self.stdout);
        let mut stderr = BufReader::new(self.stderr);

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut stdout_done = false;
        let mut stderr_done = false;

        while !(stdout_done && stderr_done) {
            tokio::select! {
                result = read_chunk(&mut stdout, &mut stdout_buf), if !stdout_done => {
                    match result? {
                        Some(chunk) => writer.write(OutputKind::Stdout, &chunk),
                        None => stdout_done = true,
                    }
                }
                result = read_chunk(&mut stderr, &mut stderr_buf), if !stderr_done => {
                    match result? {
                        Some(chunk) => writer.write(OutputKind::Stderr, &chunk),
                        None => stderr_done = true,
                    }
                }
            }
        }
        Ok(())
    }
}

async fn read_chunk<R: AsyncBufRead + Unpin>(
    stream: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<Vec<u8>>> {
    buf.clear();
    let n = stream.read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(buf.clone()))
}
