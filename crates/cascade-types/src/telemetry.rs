use cascade_task_id::TaskId;

use crate::status::TaskStatus;

/// Best-effort run/task events reported to an injected [`TelemetrySink`].
///
/// Failure to record telemetry never fails the run; sinks are expected to swallow their own
/// I/O errors rather than propagate them.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    RunStarted { task_count: usize },
    TaskFinished { task: TaskId, status: TaskStatus, duration_ms: u64 },
    RunFinished { success: bool, duration_ms: u64 },
}

pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// The default sink: discards every event.
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn record(&self, _event: TelemetryEvent) {}
}
