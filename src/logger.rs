//! Logger port for collaborator-level events.
//!
//! The pipeline reports the events an operator cares about (fallbacks,
//! failures, sync summaries) through [`Logger`], which is injected into the
//! generator and orchestrator. [`TracingLogger`] forwards to `tracing`; the
//! CLI decides where that ends up. Logging never alters control flow.

use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        })
    }
}

/// Key/value context attached to a log line.
pub type Context<'a> = &'a [(&'a str, String)];

pub trait Logger {
    fn log(&self, level: Level, message: &str, context: Context<'_>);

    fn info(&self, message: &str, context: Context<'_>) {
        self.log(Level::Info, message, context);
    }

    fn warning(&self, message: &str, context: Context<'_>) {
        self.log(Level::Warning, message, context);
    }

    fn error(&self, message: &str, context: Context<'_>) {
        self.log(Level::Error, message, context);
    }

    fn critical(&self, message: &str, context: Context<'_>) {
        self.log(Level::Critical, message, context);
    }
}

fn render_context(context: Context<'_>) -> String {
    context
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Production logger: one `tracing` event per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, context: Context<'_>) {
        let ctx = render_context(context);
        match level {
            Level::Info => tracing::info!(context = %ctx, "{message}"),
            Level::Warning => tracing::warn!(context = %ctx, "{message}"),
            Level::Error => tracing::error!(context = %ctx, "{message}"),
            Level::Critical => tracing::error!(critical = true, context = %ctx, "{message}"),
        }
    }
}

/// One recorded log call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub level: Level,
    pub message: String,
    pub context: Vec<(String, String)>,
}

/// Logger that keeps every entry in memory. Used by tests and by callers
/// that want to show log lines to a user after the fact.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<Entry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn at_level(&self, level: Level) -> Vec<Entry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    /// True if any entry's message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str, context: Context<'_>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(Entry {
                level,
                message: message.to_string(),
                context: context
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            });
        }
    }
}
