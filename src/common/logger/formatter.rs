use core::fmt as core_fmt;

use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        FmtContext,
        format::{FormatEvent, FormatFields, Writer},
    },
    registry::LookupSpan,
};

const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

fn level_colour(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[34m",
        Level::TRACE => "\x1b[35m",
    }
}

/// One line per event:
/// `[timestamp] LEVEL target:line span{fields}: > message`.
///
/// Span scope is printed so lines from the engine actor carry the track
/// they belong to.
pub struct LineFormatter {
    ansi: bool,
}

impl LineFormatter {
    pub fn new(ansi: bool) -> Self {
        Self { ansi }
    }

    fn paint(&self, style: &'static str) -> (&'static str, &'static str) {
        if self.ansi { (style, RESET) } else { ("", "") }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> core_fmt::Result {
        let meta = event.metadata();
        let (dim, reset) = self.paint(DIM);

        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        match now.format(TIMESTAMP) {
            Ok(ts) => write!(writer, "{dim}[{ts}]{reset} ")?,
            Err(_) => write!(writer, "{dim}[?]{reset} ")?,
        }

        if self.ansi {
            write!(writer, "{}{BOLD}{:<5}{RESET} ", level_colour(meta.level()), meta.level())?;
        } else {
            write!(writer, "{:<5} ", meta.level())?;
        }

        write!(writer, "{dim}{}", meta.target())?;
        match meta.line() {
            Some(line) => write!(writer, ":{line}")?,
            None => write!(writer, ":??")?,
        }
        write!(writer, "{reset} ")?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<tracing_subscriber::fmt::FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        write!(writer, "> ")?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer, "{reset}")
    }
}
