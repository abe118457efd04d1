//! Structured logging with sensitive data redaction
//!
//! Signature bytes and key material never appear in log output beyond a
//! truncated hex preview.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag to enable/disable debug logging
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable debug logging
pub fn enable_debug() {
    DEBUG_ENABLED.store(true, Ordering::SeqCst);
}

/// Disable debug logging
pub fn disable_debug() {
    DEBUG_ENABLED.store(false, Ordering::SeqCst);
}

/// Check if debug logging is enabled
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Structured log entry
#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((key, value.into()));
        self
    }

    /// Emit the entry. Debug entries are dropped unless the global debug
    /// flag is set.
    pub fn emit(self) {
        if self.level == LogLevel::Debug && !is_debug_enabled() {
            return;
        }

        let mut line = format!("[{}] {}: {}", self.level, self.module, self.message);
        for (key, value) in &self.fields {
            line.push_str(&format!(" {}={}", key, value));
        }
        eprintln!("{}", line);
    }
}

/// Truncated hex preview for byte material that must not be fully logged
pub fn short_hex(bytes: &[u8]) -> String {
    if bytes.len() <= 4 {
        return hex::encode(bytes);
    }
    format!("{}..{}", hex::encode(&bytes[..4]), bytes.len())
}

pub fn debug(module: &'static str, message: impl Into<String>) -> LogEntry {
    LogEntry::new(LogLevel::Debug, module, message)
}

pub fn info(module: &'static str, message: impl Into<String>) -> LogEntry {
    LogEntry::new(LogLevel::Info, module, message)
}

pub fn warn(module: &'static str, message: impl Into<String>) -> LogEntry {
    LogEntry::new(LogLevel::Warn, module, message)
}

pub fn error(module: &'static str, message: impl Into<String>) -> LogEntry {
    LogEntry::new(LogLevel::Error, module, message)
}
