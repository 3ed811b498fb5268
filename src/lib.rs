//! attach-console - attach a console window to a running process
//!
//! Opens a console window on demand, points the process's logical stdout at
//! it and streams `tracing` events into it with severity colors. Stopping
//! the session puts everything back the way it was.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use attach_console::console::{ConsoleManager, NativeBackend, OutputSinkRegistry};
//! use attach_console::log::{LogBridgeLayer, LogEventSource};
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let events = LogEventSource::new();
//! let subscriber = tracing_subscriber::registry().with(LogBridgeLayer::new(events.clone()));
//! tracing::subscriber::set_global_default(subscriber).unwrap();
//!
//! let registry = Arc::new(OutputSinkRegistry::default());
//! let console = ConsoleManager::new(NativeBackend::default(), registry.clone(), events);
//!
//! console.start().unwrap();
//! tracing::warn!("shown in the console, in yellow");
//! registry.println("plain output goes there too").unwrap();
//! console.stop().unwrap();
//! ```

pub mod config;
pub mod console;
pub mod log;
