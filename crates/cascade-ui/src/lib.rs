//! Serializes concurrent per-task output streams into one coherent human-facing stream while
//! capturing a full per-task transcript on the side.
//!
//! At most one task is ever "foreground": the first task to write after the stream is free
//! claims it and streams straight through. Tasks that lose the race buffer their chunks and
//! flush the whole buffer in one write the moment they claim the stream (or finish), so the
//! human-facing stream never interleaves two tasks' lines within one segment.

mod color;

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Condvar, Mutex};

use cascade_task_id::TaskId;
pub use cascade_types::output::{OutputKind, OutputSink, OutputWriter};

pub use color::ColorSelector;

struct Shared {
    foreground: Mutex<Option<TaskId>>,
    claim_released: Condvar,
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
    transcripts: Mutex<HashMap<TaskId, Vec<u8>>>,
    quiet: bool,
    colors: ColorSelector,
}

/// The concrete [`OutputSink`] used by the CLI: writes to real (or redirected) stdout/stderr.
pub struct TerminalOutputSink {
    shared: std::sync::Arc<Shared>,
}

impl TerminalOutputSink {
    pub fn new(
        out: impl Write + Send + 'static,
        err: impl Write + Send + 'static,
        quiet: bool,
    ) -> Self {
        Self {
            shared: std::sync::Arc::new(Shared {
                foreground: Mutex::new(None),
                claim_released: Condvar::new(),
                out: Mutex::new(Box::new(out)),
                err: Mutex::new(Box::new(err)),
                transcripts: Mutex::new(HashMap::new()),
                quiet,
                colors: ColorSelector,
            }),
        }
    }

    /// Mirrors the source's "redirect stderr to stdout" option: both streams land on the same
    /// writer.
    pub fn redirect_stderr_to_stdout(out: impl Write + Send + Clone + 'static, quiet: bool) -> Self {
        Self::new(out.clone(), out, quiet)
    }

    pub fn stdout(quiet: bool) -> Self {
        Self::new(std::io::stdout(), std::io::stderr(), quiet)
    }

    /// The full, unsegmented byte transcript captured for a task so far, used for log files and
    /// failure summaries. CRLF is normalized to LF and every line is newline-terminated; no color
    /// prefix is applied.
    pub fn transcript(&self, task: &TaskId) -> Vec<u8> {
        self.shared.transcripts.lock().unwrap().get(task).cloned().unwrap_or_default()
    }
}

impl OutputSink for TerminalOutputSink {
    fn writer_for(&self, task: &TaskId) -> Box<dyn OutputWriter> {
        Box::new(TerminalOutputWriter {
            task: task.clone(),
            prefix: self.shared.colors.prefix(task.as_ref()),
            shared: self.shared.clone(),
            buffer: Vec::new(),
            is_foreground: false,
        })
    }
}

struct BufferedChunk {
    kind: OutputKind,
    bytes: Vec<u8>,
}

struct TerminalOutputWriter {
    task: TaskId,
    prefix: String,
    shared: std::sync::Arc<Shared>,
    buffer: Vec<BufferedChunk>,
    is_foreground: bool,
}

impl TerminalOutputWriter {
    /// Splits `chunk` into lines, normalizing CRLF to LF and guaranteeing a trailing newline on
    /// every line kept. Blank lines are dropped. No prefix is applied.
    fn normalize(chunk: &[u8]) -> Vec<u8> {
        let mut normalized = Vec::with_capacity(chunk.len());
        for line in chunk.split_inclusive(|&byte| byte == b'\n') {
            let line = line.strip_suffix(b"\r\n").or_else(|| line.strip_suffix(b"\n")).unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            normalized.extend_from_slice(line);
            normalized.push(b'\n');
        }
        normalized
    }

    fn format(&self, chunk: &[u8]) -> Vec<u8> {
        let normalized = Self::normalize(chunk);
        let mut formatted = Vec::with_capacity(normalized.len() + self.prefix.len());
        for line in normalized.split_inclusive(|&byte| byte == b'\n') {
            formatted.extend_from_slice(self.prefix.as_bytes());
            formatted.extend_from_slice(line);
        }
        formatted
    }

    /// Non-blocking: claims the stream if it's free, but never waits for it.
    fn try_claim_foreground(&mut self) -> bool {
        if self.is_foreground {
            return true;
        }
        let mut foreground = self.shared.foreground.lock().unwrap();
        match &*foreground {
            None => {
                *foreground = Some(self.task.clone());
                self.is_foreground = true;
                true
            }
            Some(holder) if *holder == self.task => {
                self.is_foreground = true;
                true
            }
            Some(_) => false,
        }
    }

    /// Blocks until this task can claim the stream, used by `finish` so the final summary line
    /// is never left stranded behind another task's segment indefinitely.
    fn claim_foreground_blocking(&mut self) {
        if self.is_foreground {
            return;
        }
        let mut foreground = self.shared.foreground.lock().unwrap();
        loop {
            match &*foreground {
                None => {
                    *foreground = Some(self.task.clone());
                    self.is_foreground = true;
                    return;
                }
                Some(holder) if *holder == self.task => {
                    self.is_foreground = true;
                    return;
                }
                Some(_) => {
                    foreground = self.shared.claim_released.wait(foreground).unwrap();
                }
            }
        }
    }

    fn release_foreground(&mut self) {
        if !self.is_foreground {
            return;
        }
        let mut foreground = self.shared.foreground.lock().unwrap();
        if foreground.as_ref() == Some(&self.task) {
            *foreground = None;
        }
        self.is_foreground = false;
        self.shared.claim_released.notify_all();
    }

    fn drain_buffer(&mut self) {
        for chunk in self.buffer.drain(..) {
            self.write_stream(chunk.kind, &chunk.bytes);
        }
    }

    fn write_stream(&self, kind: OutputKind, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let stream = match kind {
            OutputKind::Stdout => &self.shared.out,
            OutputKind::Stderr => &self.shared.err,
        };
        let _ = stream.lock().unwrap().write_all(bytes);
    }
}

impl OutputWriter for TerminalOutputWriter {
    fn write(&mut self, kind: OutputKind, chunk: &[u8]) {
        self.shared
            .transcripts
            .lock()
            .unwrap()
            .entry(self.task.clone())
            .or_default()
            .extend_from_slice(&Self::normalize(chunk));

        if self.shared.quiet && kind == OutputKind::Stdout {
            return;
        }

        let formatted = self.format(chunk);
        if formatted.is_empty() {
            return;
        }
        self.buffer.push(BufferedChunk { kind, bytes: formatted });
        if self.try_claim_foreground() {
            self.drain_buffer();
        }
    }

    fn finish(&mut self, status_label: &str) {
        let summary = self.format(format!("{status_label}\n").as_bytes());
        self.claim_foreground_blocking();
        self.drain_buffer();
        self.write_stream(OutputKind::Stdout, &summary);
        self.release_foreground();
    }
}

impl Drop for TerminalOutputWriter {
    fn drop(&mut self) {
        self.release_foreground();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone, Default)]
    struct SharedVec(Arc<StdMutex<Vec<u8>>>);

    impl Write for SharedVec {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn foreground_segments_do_not_interleave() {
        let out = SharedVec::default();
        let err = SharedVec::default();
        let sink = TerminalOutputSink::new(out.clone(), err.clone(), false);

        let task_a = TaskId::new("a#build").unwrap();
        let task_b = TaskId::new("b#build").unwrap();

        let mut writer_a = sink.writer_for(&task_a);
        writer_a.write(OutputKind::Stdout, b"line one from a\n");
        writer_a.write(OutputKind::Stdout, b"line two from a\n");
        writer_a.finish("success");
        drop(writer_a);

        let mut writer_b = sink.writer_for(&task_b);
        writer_b.write(OutputKind::Stdout, b"line one from b\n");
        writer_b.finish("success");

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("line one from a"));
        assert!(lines[1].contains("line two from a"));
        assert!(lines[2].contains("success"));
        assert!(lines[3].contains("line one from b"));
        assert!(lines[4].contains("success"));
    }

    #[test]
    fn quiet_mode_drops_stdout_from_the_human_facing_stream() {
        let out = SharedVec::default();
        let err = SharedVec::default();
        let sink = TerminalOutputSink::new(out.clone(), err.clone(), true);
        let task = TaskId::new("web#build").unwrap();

        let mut writer = sink.writer_for(&task);
        writer.write(OutputKind::Stdout, b"noisy build output\n");
        writer.write(OutputKind::Stderr, b"a real warning\n");
        writer.finish("success with warnings");

        let stdout_text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(!stdout_text.contains("noisy build output"));
        assert!(stdout_text.contains("success with warnings"));

        let stderr_text = String::from_utf8(err.0.lock().unwrap().clone()).unwrap();
        assert!(stderr_text.contains("a real warning"));
    }

    #[test]
    fn transcript_captures_everything_regardless_of_quiet_mode() {
        let sink = TerminalOutputSink::new(SharedVec::default(), SharedVec::default(), true);
        let task = TaskId::new("web#build").unwrap();

        let mut writer = sink.writer_for(&task);
        writer.write(OutputKind::Stdout, b"every byte is kept\n");
        writer.finish("success");

        let transcript = String::from_utf8(sink.transcript(&task)).unwrap();
        assert_eq!(transcript, "every byte is kept\n");
    }

    #[test]
    fn transcript_normalizes_crlf_and_has_no_color_prefix() {
        let sink = TerminalOutputSink::new(SharedVec::default(), SharedVec::default(), false);
        let task = TaskId::new("web#build").unwrap();

        let mut writer = sink.writer_for(&task);
        writer.write(OutputKind::Stdout, b"line one\r\nline two");
        writer.finish("success");

        let transcript = String::from_utf8(sink.transcript(&task)).unwrap();
        assert_eq!(transcript, "line one\nline two\n");
    }

    #[test]
    fn concurrent_tasks_from_threads_each_print_a_contiguous_segment() {
        let out = SharedVec::default();
        let sink = Arc::new(TerminalOutputSink::new(out.clone(), SharedVec::default(), false));

        std::thread::scope(|scope| {
            for name in ["foo", "bar"] {
                let sink = sink.clone();
                scope.spawn(move || {
                    let task = TaskId::new(format!("{name}#build")).unwrap();
                    let mut writer = sink.writer_for(&task);
                    writer.write(OutputKind::Stdout, format!("running {name}\n").as_bytes());
                    writer.write(OutputKind::Stdout, format!("hello from {name}\n").as_bytes());
                    writer.finish("success");
                });
            }
        });

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6, "two tasks, three lines each (two body lines plus summary)");
    }
}
