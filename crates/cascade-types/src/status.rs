use std::fmt;

/// A task's position in the per-task state machine.
///
/// `Ready -> Executing -> {Success, SuccessWithWarning, Skipped, FromCache, Failure, Blocked}`.
/// `Blocked` is also reachable directly from `Ready` when a dependency fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Ready,
    Executing,
    Success,
    SuccessWithWarning,
    Skipped,
    FromCache,
    Failure,
    Blocked,
}

impl TaskStatus {
    /// Terminal states a dependent may safely start after.
    pub fn is_success_like(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success
                | TaskStatus::SuccessWithWarning
                | TaskStatus::Skipped
                | TaskStatus::FromCache
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Ready | TaskStatus::Executing)
    }

    pub fn is_failure_like(&self) -> bool {
        matches!(self, TaskStatus::Failure | TaskStatus::Blocked)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Ready => "ready",
            TaskStatus::Executing => "executing",
            TaskStatus::Success => "success",
            TaskStatus::SuccessWithWarning => "success (warning)",
            TaskStatus::Skipped => "skipped",
            TaskStatus::FromCache => "cached",
            TaskStatus::Failure => "failed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
