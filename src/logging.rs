//! Routes the crate's `log` records to a sink chosen over the C ABI.
//!
//! Failed operations are logged at `debug` under `wposix::<op>` with two
//! structured fields, `op` and `errno`. Callback sinks receive them in
//! `LogRecord`; the stderr sink appends the errno.

use core::ffi::{c_char, c_void};
use core::fmt;
use std::sync::{OnceLock, RwLock};

use log::kv::{Key, Source};
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::common::error::Error;
use crate::common::types::{LogLevel, LogRecord, LogStatus, StringView};

pub type LogCallback = Option<extern "C" fn(record: *const LogRecord, user_data: *mut c_void)>;

/// Operations that report their failures through the logger.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Op {
    Open,
    Opendir,
    Mkdir,
    Stat,
}

impl Op {
    fn name(self) -> &'static str {
        match self {
            Op::Open => "open",
            Op::Opendir => "opendir",
            Op::Mkdir => "mkdir",
            Op::Stat => "stat",
        }
    }

    fn target(self) -> &'static str {
        match self {
            Op::Open => "wposix::open",
            Op::Opendir => "wposix::dir",
            Op::Mkdir => "wposix::mkdir",
            Op::Stat => "wposix::stat",
        }
    }
}

/// Logs `op(subject)` failing with `err`.
pub(crate) fn failure(op: Op, subject: fmt::Arguments<'_>, err: Error) {
    log::debug!(
        target: op.target(),
        op = op.name(),
        errno = err.errno();
        "{}({subject}) failed: {err}",
        op.name()
    );
}

#[derive(Copy, Clone)]
enum Sink {
    Silent,
    Stderr,
    Callback {
        callback: extern "C" fn(record: *const LogRecord, user_data: *mut c_void),
        user_data: usize,
    },
}

/// Process-wide `log` implementation. Silent until a host picks a sink.
///
/// Filtering is left to `log::max_level()`, which every entry point below
/// keeps in step with the requested level.
pub struct WposixLogger {
    sink: RwLock<Sink>,
}

impl WposixLogger {
    const fn new() -> Self {
        Self {
            sink: RwLock::new(Sink::Silent),
        }
    }

    fn route(&self, sink: Sink) {
        if let Ok(mut current) = self.sink.write() {
            *current = sink;
        }
    }

    fn current(&self) -> Sink {
        self.sink.read().map(|sink| *sink).unwrap_or(Sink::Silent)
    }
}

struct Fields<'a> {
    op: &'a str,
    errno: i32,
}

impl<'a> Fields<'a> {
    fn of(record: &'a Record<'a>) -> Self {
        let source = record.key_values();
        let op = source
            .get(Key::from_str("op"))
            .and_then(|value| value.to_borrowed_str())
            .unwrap_or("");
        let errno = source
            .get(Key::from_str("errno"))
            .and_then(|value| value.to_i64())
            .and_then(|code| i32::try_from(code).ok())
            .unwrap_or(0);
        Self { op, errno }
    }
}

impl Log for WposixLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match self.current() {
            Sink::Silent => {}
            Sink::Stderr => {
                let fields = Fields::of(record);
                if fields.errno != 0 {
                    eprintln!(
                        "[wposix][{}] {} (errno {})",
                        record.level(),
                        record.args(),
                        fields.errno
                    );
                } else {
                    eprintln!("[wposix][{}] {}", record.level(), record.args());
                }
            }
            Sink::Callback {
                callback,
                user_data,
            } => {
                let fields = Fields::of(record);
                let message = record.args().to_string();
                let out = LogRecord {
                    level: record.level().into(),
                    target: view(record.target()),
                    message: view(&message),
                    op: view(fields.op),
                    errno: fields.errno,
                };
                callback(&out, user_data as *mut c_void);
            }
        }
    }

    fn flush(&self) {}
}

static LOGGER: WposixLogger = WposixLogger::new();
static OWNS_PROCESS_LOGGER: OnceLock<bool> = OnceLock::new();

/// Installs `LOGGER` on first use. False when the host already set one.
fn owns_process_logger() -> bool {
    *OWNS_PROCESS_LOGGER.get_or_init(|| log::set_logger(&LOGGER).is_ok())
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warn,
            Level::Info => LogLevel::Info,
            Level::Debug => LogLevel::Debug,
            Level::Trace => LogLevel::Trace,
        }
    }
}

fn view(value: &str) -> StringView {
    StringView {
        ptr: value.as_ptr() as *const c_char,
        len: value.len(),
    }
}

fn route(sink: Sink, level: LogLevel) -> LogStatus {
    if !owns_process_logger() {
        return LogStatus::ExternalLogger;
    }
    LOGGER.route(sink);
    log::set_max_level(level.into());
    LogStatus::Ok
}

pub fn log_set_stderr(level: LogLevel) -> LogStatus {
    route(Sink::Stderr, level)
}

pub fn log_set_callback(callback: LogCallback, user_data: *mut c_void, level: LogLevel) -> LogStatus {
    match callback {
        Some(callback) => route(
            Sink::Callback {
                callback,
                user_data: user_data as usize,
            },
            level,
        ),
        None => log_disable(),
    }
}

/// Adjusts the level only. With a host logger in place this still applies.
pub fn log_set_level(level: LogLevel) -> LogStatus {
    owns_process_logger();
    log::set_max_level(level.into());
    LogStatus::Ok
}

pub fn log_disable() -> LogStatus {
    if owns_process_logger() {
        LOGGER.route(Sink::Silent);
    }
    log::set_max_level(LevelFilter::Off);
    LogStatus::Ok
}
