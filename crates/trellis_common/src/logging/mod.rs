//! Logging Module
//!
//! Buffered application log fanned out to pluggable routes:
//! - `Logger` keeps entries in memory and notifies observers on flush
//! - `LogRoute` sinks pick entries by level/category and persist them
//! - `LogRouter` is the component that owns the routes
//!
//! This is the application's own log. Framework diagnostics go through
//! `tracing`.

pub mod console;
pub mod email;
pub mod file;
pub mod filter;
pub mod logger;
pub mod route;
pub mod router;

pub use console::ConsoleLogRoute;
pub use email::{EmailLogRoute, MailMessage, MailTransport, SendmailTransport};
pub use file::FileLogRoute;
pub use filter::LogFilter;
pub use logger::{FlushObserver, Logger, ObserverId, DEFAULT_AUTO_FLUSH};
pub use route::{LogRoute, RouteState};
pub use router::LogRouter;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default category for application messages
pub const DEFAULT_CATEGORY: &str = "application";

/// Log level enum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    #[default]
    Info,
    Warning,
    Error,
    Profile,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Profile => "profile",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "profile" => Some(LogLevel::Profile),
            _ => None,
        }
    }

    pub fn all() -> [LogLevel; 5] {
        [
            LogLevel::Trace,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Profile,
        ]
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::parse(s).ok_or_else(|| format!("unknown log level \"{}\"", s))
    }
}

/// A buffered log message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub level: LogLevel,
    pub category: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, level: LogLevel, category: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            category: category.into(),
            timestamp: now_seconds(),
        }
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `YYYY-MM-DD HH:MM:SS` in local time
    pub fn formatted_time(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub fn format_timestamp(timestamp: f64) -> String {
    let secs = timestamp.floor() as i64;
    let nanos = ((timestamp - timestamp.floor()) * 1e9) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => String::from("0000-00-00 00:00:00"),
    }
}
