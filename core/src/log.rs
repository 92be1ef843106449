//! PSR-style logging facade used by gateways.
//!
//! # Design
//! Gateways log through the [`Logger`] trait so integrations can route
//! messages anywhere. [`GatewayLogger`] is the default: it starts disabled,
//! interpolates `{name}` placeholders from the context map and forwards to
//! `tracing`, a writer or a callback.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Context key carrying an error description.
pub const EXCEPTION_KEY: &str = "exception";

/// Log context keyed by placeholder name.
pub type Context = Map<String, Value>;

/// Severity levels, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Emergency => "emergency",
            LogLevel::Alert => "alert",
            LogLevel::Critical => "critical",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Notice => "notice",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "emergency" => Ok(LogLevel::Emergency),
            "alert" => Ok(LogLevel::Alert),
            "critical" => Ok(LogLevel::Critical),
            "error" => Ok(LogLevel::Error),
            "warning" => Ok(LogLevel::Warning),
            "notice" => Ok(LogLevel::Notice),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(Error::MalformedInput(format!("unknown log level '{other}'"))),
        }
    }
}

pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, context: &Context);
}

/// Log `message` with `err` attached as the `exception` entry.
pub fn log_with_error(
    logger: &dyn Logger,
    level: LogLevel,
    message: &str,
    err: Option<&dyn std::error::Error>,
) {
    let mut context = Context::new();
    if let Some(err) = err {
        context.insert(EXCEPTION_KEY.to_string(), Value::String(err.to_string()));
    }
    logger.log(level, message, &context);
}

pub fn log_warn(logger: &dyn Logger, message: &str, err: Option<&dyn std::error::Error>) {
    log_with_error(logger, LogLevel::Warning, message, err);
}

pub fn log_error(logger: &dyn Logger, message: &str, err: Option<&dyn std::error::Error>) {
    log_with_error(logger, LogLevel::Error, message, err);
}

pub fn log_info(logger: &dyn Logger, message: &str, err: Option<&dyn std::error::Error>) {
    log_with_error(logger, LogLevel::Info, message, err);
}

pub fn log_debug(logger: &dyn Logger, message: &str, err: Option<&dyn std::error::Error>) {
    log_with_error(logger, LogLevel::Debug, message, err);
}

/// Replace `{name}` placeholders with the string form of `context[name]`.
///
/// Placeholders without a context entry are left as written. The
/// `exception` entry renders as a newline followed by its text; when the
/// message has no `{exception}` placeholder it is appended instead.
pub fn interpolate(message: &str, context: &Context) -> String {
    let mut out = message.to_string();
    for (key, value) in context {
        let placeholder = format!("{{{key}}}");
        if !out.contains(&placeholder) {
            continue;
        }
        let text = if key == EXCEPTION_KEY {
            format!("\n{}", plain_string(value))
        } else {
            plain_string(value)
        };
        out = out.replace(&placeholder, &text);
    }
    if let Some(exception) = context.get(EXCEPTION_KEY) {
        if !message.contains("{exception}") {
            out.push('\n');
            out.push_str(&plain_string(exception));
        }
    }
    out
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

type Callback = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

enum Sink {
    Tracing,
    Writer(Mutex<Box<dyn Write + Send>>),
    Callback(Callback),
}

/// Default [`Logger`]: disabled until [`GatewayLogger::set_enabled`].
pub struct GatewayLogger {
    enabled: AtomicBool,
    sink: Sink,
}

impl GatewayLogger {
    /// Forward to `tracing` at the closest level.
    pub fn new() -> Self {
        Self::with_sink(Sink::Tracing)
    }

    /// Write `[level] message` lines to `writer`.
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self::with_sink(Sink::Writer(Mutex::new(Box::new(writer))))
    }

    pub fn to_callback(callback: impl Fn(LogLevel, &str) + Send + Sync + 'static) -> Self {
        Self::with_sink(Sink::Callback(Box::new(callback)))
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            sink,
        }
    }

    pub fn enabled(self) -> Self {
        self.set_enabled(true);
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Default for GatewayLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GatewayLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match self.sink {
            Sink::Tracing => "tracing",
            Sink::Writer(_) => "writer",
            Sink::Callback(_) => "callback",
        };
        f.debug_struct("GatewayLogger")
            .field("enabled", &self.is_enabled())
            .field("sink", &sink)
            .finish()
    }
}

impl Logger for GatewayLogger {
    fn log(&self, level: LogLevel, message: &str, context: &Context) {
        if !self.is_enabled() {
            return;
        }
        let text = interpolate(message, context);
        match &self.sink {
            Sink::Tracing => match level {
                LogLevel::Emergency | LogLevel::Alert | LogLevel::Critical | LogLevel::Error => {
                    tracing::error!(level = %level, "{text}")
                }
                LogLevel::Warning => tracing::warn!("{text}"),
                LogLevel::Notice | LogLevel::Info => tracing::info!(level = %level, "{text}"),
                LogLevel::Debug => tracing::debug!("{text}"),
            },
            Sink::Writer(writer) => {
                let mut writer = writer.lock();
                // A failing log sink must not fail the call being logged.
                let _ = writeln!(writer, "[{level}] {text}");
                let _ = writer.flush();
            }
            Sink::Callback(callback) => callback(level, &text),
        }
    }
}
