//! Structured, best-effort reporting of run duration and per-task results to a configured sink.

pub use cascade_types::telemetry::{NoopTelemetrySink, TelemetryEvent, TelemetrySink};
use tracing::info;

/// Logs every event through `tracing` at `info` level; the default non-noop sink for CLI runs.
#[derive(Debug, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::RunStarted { task_count } => {
                info!(task_count, "run started");
            }
            TelemetryEvent::TaskFinished { task, status, duration_ms } => {
                info!(%task, ?status, duration_ms, "task finished");
            }
            TelemetryEvent::RunFinished { success, duration_ms } => {
                info!(success, duration_ms, "run finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cascade_task_id::TaskId;

    use cascade_types::status::TaskStatus;

    use super::*;

    #[test]
    fn tracing_sink_does_not_panic_on_any_event() {
        let sink = TracingTelemetrySink;
        sink.record(TelemetryEvent::RunStarted { task_count: 3 });
        sink.record(TelemetryEvent::TaskFinished {
            task: TaskId::new("web#build").unwrap(),
            status: TaskStatus::Success,
            duration_ms: 120,
        });
        sink.record(TelemetryEvent::RunFinished { success: true, duration_ms: 500 });
    }

    #[test]
    fn noop_sink_discards_events() {
        let sink = NoopTelemetrySink;
        sink.record(TelemetryEvent::RunStarted { task_count: 1 });
    }
}
