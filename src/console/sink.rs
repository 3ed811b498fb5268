//! Colored log output
//!
//! [`LogSink`] renders each [`LogEntry`] as
//!
//! ```text
//! <fg color>[5/3/2024 02:07] disk full<reset>
//! ```
//!
//! and writes it to whatever stream the [`OutputSinkRegistry`] holds at that
//! moment. Color set, text and reset go out under the stream's lock.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::Command;

use super::stream::OutputSinkRegistry;
use crate::log::{LogEntry, LogHandler, Severity};

/// Timestamp format: day/month/year hour:minute
pub const TIMESTAMP_FORMAT: &str = "%-d/%-m/%Y %I:%M";

/// Severity to foreground color table
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityColorMap {
    colors: HashMap<Severity, Color>,
    fallback: Color,
}

impl Default for SeverityColorMap {
    fn default() -> Self {
        Self::new(Color::White)
            .with(Severity::Info, Color::White)
            .with(Severity::Warning, Color::Yellow)
            .with(Severity::Error, Color::Red)
            .with(Severity::Exception, Color::Red)
    }
}

impl SeverityColorMap {
    /// Empty table; every severity maps to `fallback`
    pub fn new(fallback: Color) -> Self {
        Self {
            colors: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, severity: Severity, color: Color) -> Self {
        self.set(severity, color);
        self
    }

    pub fn set(&mut self, severity: Severity, color: Color) {
        self.colors.insert(severity, color);
    }

    pub fn get(&self, severity: Severity) -> Color {
        self.colors.get(&severity).copied().unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> Color {
        self.fallback
    }
}

/// Source of "now" for timestamps
pub type Clock = fn() -> DateTime<Utc>;

/// Log handler writing colored, timestamped lines to the logical stdout.
#[derive(Clone)]
pub struct LogSink {
    registry: Arc<OutputSinkRegistry>,
    colors: SeverityColorMap,
    clock: Clock,
}

impl LogSink {
    pub fn new(registry: Arc<OutputSinkRegistry>, colors: SeverityColorMap) -> Self {
        Self {
            registry,
            colors,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Format and write one entry.
    ///
    /// The timestamp is taken now, not when the event fired.
    pub fn handle(&self, entry: &LogEntry) -> io::Result<()> {
        let line = self.format_line(entry, (self.clock)());
        self.registry
            .current()
            .with_writer(|w| w.write_all(line.as_bytes()))
    }

    /// Render `entry` as it would be written at `now`, escape codes included
    pub fn format_line(&self, entry: &LogEntry, now: DateTime<Utc>) -> String {
        let mut line = String::with_capacity(entry.message.len() + 48);
        let _ = SetForegroundColor(self.colors.get(entry.severity)).write_ansi(&mut line);
        let _ = write!(line, "[{}] {}", now.format(TIMESTAMP_FORMAT), entry.message);
        let _ = ResetColor.write_ansi(&mut line);
        line.push('\n');
        line
    }
}

impl LogHandler for LogSink {
    fn on_log(&self, entry: &LogEntry) {
        // A closed console must not take the host's logging down with it
        let _ = self.handle(entry);
    }
}
