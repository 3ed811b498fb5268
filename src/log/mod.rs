//! Host log events.
//!
//! - **source**: observer hub that delivers [`LogEntry`] values to subscribers
//! - **bridge**: `tracing` layer that feeds every event into a [`LogEventSource`]
//!
//! # Architecture
//!
//! ```text
//! tracing::info!(..)
//!   └── LogBridgeLayer ──▶ LogEventSource::emit
//!                            ├── handler (LogSink)
//!                            └── handler ...
//! ```

pub mod bridge;
pub mod source;

pub use bridge::LogBridgeLayer;
pub use source::{LogEventSource, LogHandler, Subscription};

use std::fmt;
use std::str::FromStr;

/// Classification of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Exception,
    Assert,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Exception,
        Severity::Assert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Exception => "exception",
            Severity::Assert => "assert",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "log" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "exception" => Ok(Severity::Exception),
            "assert" => Ok(Severity::Assert),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

/// A single log event as delivered to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub message: String,
    /// Carried along for handlers that want it; the console formatter ignores it.
    pub stack_trace: Option<String>,
    pub severity: Severity,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: None,
            severity,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse() {
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("Exception".parse::<Severity>(), Ok(Severity::Exception));
        assert_eq!("ASSERT".parse::<Severity>(), Ok(Severity::Assert));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_display_matches_parse() {
        for severity in Severity::ALL {
            assert_eq!(severity.to_string().parse::<Severity>(), Ok(severity));
        }
    }
}
