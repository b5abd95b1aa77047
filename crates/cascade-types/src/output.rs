use cascade_task_id::TaskId;

/// Which of a task's two byte streams a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Stdout,
    Stderr,
}

/// A task's handle into the output collator. Every byte a running command produces enters
/// the pipeline through `write`; dropping (or explicitly finishing) the handle flushes any
/// buffered segment and releases foreground claim.
pub trait OutputWriter: Send {
    fn write(&mut self, kind: OutputKind, chunk: &[u8]);

    /// Called once the task has reached a terminal state, with its final status label, so the
    /// collator can print a trailing summary line and release foreground claim.
    fn finish(&mut self, status_label: &str);
}

/// Constructs per-task [`OutputWriter`] handles and owns the human-facing stream.
pub trait OutputSink: Send + Sync {
    fn writer_for(&self, task: &TaskId) -> Box<dyn OutputWriter>;
}
