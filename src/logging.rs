//! Logging setup
//!
//! Errors and warnings are always written. Info and debug events are written
//! only when the configured log level names exactly that level, and only for
//! this crate and the HTTP trace layer. The level lives in a shared atomic so
//! a settings change takes effect immediately.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::subscriber::Interest;
use tracing::{Level, Metadata};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context, Filter, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::store::LogLevel;

const LOCAL_TARGETS: [&str; 2] = ["av_controls", "tower_http"];

/// Runtime-adjustable exact-match level gate
#[derive(Debug, Clone, Default)]
pub struct LogGate {
    level: Arc<AtomicU8>,
}

impl LogGate {
    pub fn new(level: LogLevel) -> Self {
        let gate = Self::default();
        gate.set(level);
        gate
    }

    pub fn set(&self, level: LogLevel) {
        self.level.store(encode(level), Ordering::Relaxed);
    }

    pub fn level(&self) -> LogLevel {
        decode(self.level.load(Ordering::Relaxed))
    }
}

fn encode(level: LogLevel) -> u8 {
    match level {
        LogLevel::Error => 0,
        LogLevel::Info => 1,
        LogLevel::Debug => 2,
    }
}

fn decode(raw: u8) -> LogLevel {
    match raw {
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Error,
    }
}

/// Whether an event at `level` from `target` passes under `configured`
pub fn admits(configured: LogLevel, level: Level, target: &str) -> bool {
    if level == Level::ERROR || level == Level::WARN {
        return true;
    }
    let local = LOCAL_TARGETS
        .iter()
        .any(|prefix| target == *prefix || target.starts_with(&format!("{prefix}::")));
    if !local {
        return false;
    }
    match configured {
        LogLevel::Error => false,
        LogLevel::Info => level == Level::INFO,
        LogLevel::Debug => level == Level::DEBUG,
    }
}

impl<S> Filter<S> for LogGate {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        admits(self.level(), *meta.level(), meta.target())
    }

    // The level can change at runtime, so callsite interest must not be cached
    fn callsite_enabled(&self, _meta: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }
}

/// Install console and file logging. Keep the guard alive for the process lifetime.
pub fn init_tracing(gate: &LogGate, log_file: &Path) -> anyhow::Result<WorkerGuard> {
    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = log_file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file path has no file name: {}", log_file.display()))?;
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(gate.clone()))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(gate.clone()),
        )
        .try_init()?;

    Ok(guard)
}
