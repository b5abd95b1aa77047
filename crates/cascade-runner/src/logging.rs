use std::marker::PhantomData;

use cascade_types::ColorConfig;
use chrono::Local;
use owo_colors::{
    colors::{Black, Default, Red, Yellow},
    Color, OwoColorize,
};
use tracing::{field::Visit, metadata::LevelFilter, Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        format::{DefaultFields, Writer},
        FmtContext, FormatEvent, FormatFields,
    },
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Registry,
};

/// Installs the process-wide `tracing` subscriber: a single stderr layer using
/// [`CascadeFormatter`], filtered by `RUST_LOG` (or `CASCADE_LOG_VERBOSITY`) with a
/// verbosity-derived default.
///
/// No daemon log file and no chrome tracing output — those are out of scope here; a real build
/// orchestrator would add them as additional layers on top of this same registry.
pub fn init(verbosity: usize, color_config: ColorConfig) {
    let level_override = match verbosity {
        0 => None,
        1 => Some(LevelFilter::INFO),
        2 => Some(LevelFilter::DEBUG),
        _ => Some(LevelFilter::TRACE),
    };

    let mut filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var("CASCADE_LOG_VERBOSITY")
        .from_env_lossy();
    if let Some(max_level) = level_override {
        filter = filter.add_directive(max_level.into());
    }

    let is_ansi = color_config.should_colorize(atty_stderr());
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(CascadeFormatter::new_with_ansi(is_ansi));

    Registry::default().with(filter).with(stderr).init();
}

fn atty_stderr() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

/// Errors red, warnings yellow, info plain, debug/trace prefixed with a timestamp and target.
/// No span information is printed.
pub struct CascadeFormatter {
    is_ansi: bool,
}

impl CascadeFormatter {
    pub fn new_with_ansi(is_ansi: bool) -> Self {
        Self { is_ansi }
    }
}

impl<S, N> FormatEvent<S, N> for CascadeFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let level = event.metadata().level();
        let target = event.metadata().target();

        match *level {
            Level::ERROR => write_string::<Red, Black>(writer.by_ref(), self.is_ansi, " ERROR ")
                .and_then(|_| write_message::<Red, Default>(writer, self.is_ansi, event)),
            Level::WARN => write_string::<Yellow, Black>(writer.by_ref(), self.is_ansi, " WARNING ")
                .and_then(|_| write_message::<Yellow, Default>(writer, self.is_ansi, event)),
            Level::INFO => write_message::<Default, Default>(writer, self.is_ansi, event),
            _ => {
                let now = Local::now();
                write!(writer, "{} [{}] {}: ", now.format("%Y-%m-%dT%H:%M:%S.%3f%z"), level, target)
                    .and_then(|_| write_message::<Default, Default>(writer, self.is_ansi, event))
            }
        }
    }
}

struct MessageVisitor<'a, FG: Color, BG: Color> {
    colorize: bool,
    writer: Writer<'a>,
    _fg: PhantomData<FG>,
    _bg: PhantomData<BG>,
}

impl<'a, FG: Color, BG: Color> Visit for MessageVisitor<'a, FG, BG> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            if self.colorize {
                let value = value.fg::<FG>().bg::<BG>();
                let _ = write!(self.writer, "{:?}", value);
            } else {
                let _ = write!(self.writer, "{:?}", value);
            }
        }
    }
}

fn write_string<FG: Color, BG: Color>(
    mut writer: Writer<'_>,
    colorize: bool,
    value: &str,
) -> std::fmt::Result {
    if colorize {
        let value = value.fg::<FG>().bg::<BG>();
        write!(writer, "{} ", value)
    } else {
        write!(writer, "{} ", value)
    }
}

fn write_message<FG: Color, BG: Color>(
    mut writer: Writer<'_>,
    colorize: bool,
    event: &Event,
) -> std::fmt::Result {
    let mut visitor =
        MessageVisitor::<FG, BG> { colorize, writer: writer.by_ref(), _fg: PhantomData, _bg: PhantomData };
    event.record(&mut visitor);
    writeln!(writer)
}
