//! `tracing` integration
//!
//! [`LogBridgeLayer`] turns every `tracing` event into a [`LogEntry`] and
//! emits it on a [`LogEventSource`]. The level picks the severity unless the
//! event carries an explicit `severity` field:
//!
//! ```text
//! tracing::error!("disk full")                              -> Error
//! tracing::error!(severity = "exception", "unhandled")      -> Exception
//! tracing::warn!(stack_trace = %trace, "slow frame")        -> Warning + stack trace
//! ```

use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::{LogEntry, LogEventSource, Severity};

/// Layer forwarding `tracing` events to a [`LogEventSource`].
pub struct LogBridgeLayer {
    source: LogEventSource,
}

impl LogBridgeLayer {
    pub fn new(source: LogEventSource) -> Self {
        Self { source }
    }
}

impl<S> Layer<S> for LogBridgeLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        let severity = visitor
            .severity
            .unwrap_or_else(|| severity_for_level(event.metadata().level()));

        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&visitor.fields);
        }

        self.source.emit(&LogEntry {
            message,
            stack_trace: visitor.stack_trace,
            severity,
        });
    }
}

fn severity_for_level(level: &Level) -> Severity {
    match *level {
        Level::ERROR => Severity::Error,
        Level::WARN => Severity::Warning,
        _ => Severity::Info,
    }
}

#[derive(Default)]
struct EntryVisitor {
    message: String,
    severity: Option<Severity>,
    stack_trace: Option<String>,
    /// Remaining fields rendered as `key=value`
    fields: String,
}

impl EntryVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "severity" => match value.parse() {
                Ok(severity) => self.severity = Some(severity),
                Err(_) => self.push_field("severity", format_args!("{}", value)),
            },
            "stack_trace" => self.stack_trace = Some(value.to_string()),
            name => self.push_field(name, format_args!("{}", value)),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            // `message` arrives as fmt::Arguments, whose Debug has no quotes
            "message" => self.message = format!("{:?}", value),
            // `severity = ?"exception"` arrives quoted
            "severity" | "stack_trace" => {
                let text = format!("{:?}", value);
                self.record_str(field, text.trim_matches('"'))
            }
            name => self.push_field(name, format_args!("{:?}", value)),
        }
    }
}
