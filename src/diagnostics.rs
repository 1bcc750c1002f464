//! `ESP_DEBUG_TRACE`-gated diagnostics.
//!
//! The loader reports through `tracing`. [`EspTraceLayer`] turns those events
//! into plain stderr lines, filtered by an integer verbosity read from the
//! environment on every event so external tooling can toggle it mid-run:
//!
//! | level | rank |
//! |-------|------|
//! | ERROR | 0    |
//! | WARN  | 1    |
//! | INFO  | 2    |
//! | DEBUG | 3    |
//! | TRACE | 4    |
//!
//! An event is printed when its rank is at most the configured verbosity. An
//! unset or non-numeric variable means 0 (errors only); a negative value
//! silences everything. The first printed line is preceded by the process
//! path and command line.

use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::io::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Default verbosity variable.
pub const TRACE_ENV: &str = "ESP_DEBUG_TRACE";

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Installs an [`EspTraceLayer`] on stderr as the global subscriber.
///
/// Only the first call has any effect. Returns `false` when another
/// subscriber was already in place, in which case loader events go there.
pub fn install(trace_env: impl Into<Cow<'static, str>>) -> bool {
    *INSTALLED.get_or_init(|| {
        tracing_subscriber::registry()
            .with(EspTraceLayer::stderr(trace_env))
            .try_init()
            .is_ok()
    })
}

/// Rank of a `tracing` level on the verbosity scale.
pub fn level_rank(level: &Level) -> i64 {
    match *level {
        Level::ERROR => 0,
        Level::WARN => 1,
        Level::INFO => 2,
        Level::DEBUG => 3,
        Level::TRACE => 4,
    }
}

/// Current verbosity from `var`; unset or non-numeric is 0.
pub fn verbosity(var: &str) -> i64 {
    std::env::var(var).map_or(0, |value| parse_level(&value))
}

/// Leading optional sign and digits, like C's `atoi`.
fn parse_level(value: &str) -> i64 {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude = digits[..end].parse::<i64>().unwrap_or(0);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Executable path and command line of the running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub executable: String,
    pub command_line: String,
}

impl ProcessInfo {
    pub fn current() -> Self {
        let executable = std::env::current_exe()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|err| format!("<unknown: {err}>"));
        let command_line = std::env::args_os()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            executable: sanitize(&executable),
            command_line: sanitize(&command_line),
        }
    }
}

/// Control characters become spaces so the header stays on one line each.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c < ' ' { ' ' } else { c })
        .collect()
}

/// Layer printing events whose rank passes the environment's verbosity.
pub struct EspTraceLayer<W = fn() -> io::Stderr> {
    trace_env: Cow<'static, str>,
    make_writer: W,
    header_pending: AtomicBool,
}

impl EspTraceLayer {
    pub fn stderr(trace_env: impl Into<Cow<'static, str>>) -> Self {
        Self::with_writer(trace_env, io::stderr)
    }
}

impl<W> EspTraceLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    pub fn with_writer(trace_env: impl Into<Cow<'static, str>>, make_writer: W) -> Self {
        Self {
            trace_env: trace_env.into(),
            make_writer,
            header_pending: AtomicBool::new(true),
        }
    }

    fn render(&self, event: &Event<'_>) -> String {
        let mut out = String::new();
        if self.header_pending.swap(false, Ordering::AcqRel) {
            let process = ProcessInfo::current();
            let _ = writeln!(out, "{}: proc: {}", self.trace_env, process.executable);
            let _ = writeln!(out, "{}: cmdline: {}", self.trace_env, process.command_line);
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let _ = writeln!(
            out,
            "[{}] {}{}",
            event.metadata().level(),
            visitor.message,
            visitor.fields
        );
        out
    }
}

impl<S, W> Layer<S> for EspTraceLayer<W>
where
    S: Subscriber,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if level_rank(event.metadata().level()) > verbosity(&self.trace_env) {
            return;
        }
        let line = self.render(event);
        let mut writer = self.make_writer.make_writer();
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
