//! Console lifecycle components.
//!
//! - **backend**: OS console primitives (Win32 console API, fake for tests)
//! - **stream**: lockable output streams and the logical stdout slot
//! - **sink**: colored, timestamped log line writer
//! - **session**: attach → redirect → detach lifecycle
//!
//! # Architecture
//!
//! ```text
//! ConsoleManager
//! ├── ConsoleBackend (attach / detach / CONOUT$)
//! ├── OutputSinkRegistry (original ⇄ console stream)
//! └── LogEventSource
//!     └── LogSink ──▶ OutputSinkRegistry::current()
//! ```
//!
//! # Closing the console window
//!
//! On Windows, closing an attached console window sends a close event to
//! the whole process, which terminates it by default. That is platform
//! behavior outside this module; hosts that need to survive it install
//! their own console control handler.

pub mod backend;
pub mod error;
pub mod session;
pub mod sink;
pub mod stream;

pub use backend::{ConsoleBackend, FakeConsole, NativeBackend, UnsupportedConsole};
#[cfg(windows)]
pub use backend::WindowsConsole;
pub use error::{ConsoleError, Result};
pub use session::{ConsoleManager, ConsoleSession, SessionOptions};
pub use sink::{LogSink, SeverityColorMap};
pub use stream::{LogicalStdout, OutputSinkRegistry, OutputStream, SharedBuffer};
