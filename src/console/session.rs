//! Console session lifecycle
//!
//! [`ConsoleManager`] moves between two states:
//!
//! ```text
//!            start() ok
//! Detached ─────────────▶ Attached
//!    ▲                        │
//!    └──────── stop() ────────┘
//! ```
//!
//! `start()` failing leaves it Detached with the logical stdout untouched.
//! `stop()` always ends Detached, even if the OS refuses to free the console.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use super::backend::ConsoleBackend;
use super::error::{ConsoleError, Result};
use super::sink::{LogSink, SeverityColorMap};
use super::stream::{OutputSinkRegistry, OutputStream};
use crate::log::{LogEventSource, LogHandler, Subscription};

/// Snapshot of the console resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsoleSession {
    pub attached: bool,
}

/// Session options
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Window title set after attaching
    pub title: Option<String>,
    /// Subscribe a [`LogSink`] on start
    pub forward_logs: bool,
    pub colors: SeverityColorMap,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            title: None,
            forward_logs: true,
            colors: SeverityColorMap::default(),
        }
    }
}

/// Stream swap performed by `start()`
struct RedirectedOutput {
    /// Installed before we redirected
    original: OutputStream,
    /// Bound to the console
    current: OutputStream,
}

struct ActiveSession {
    output: RedirectedOutput,
    subscriptions: Vec<Subscription>,
}

struct Inner<B> {
    backend: B,
    active: Option<ActiveSession>,
}

/// Attaches a console, redirects the logical stdout into it and forwards
/// log events there until stopped.
///
/// Transitions are serialized by an internal lock, so `start`/`stop` may be
/// called from any thread.
pub struct ConsoleManager<B: ConsoleBackend> {
    inner: Mutex<Inner<B>>,
    registry: Arc<OutputSinkRegistry>,
    events: LogEventSource,
    options: SessionOptions,
}

impl<B: ConsoleBackend> ConsoleManager<B> {
    pub fn new(backend: B, registry: Arc<OutputSinkRegistry>, events: LogEventSource) -> Self {
        Self::with_options(backend, registry, events, SessionOptions::default())
    }

    pub fn with_options(
        backend: B,
        registry: Arc<OutputSinkRegistry>,
        events: LogEventSource,
        options: SessionOptions,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                backend,
                active: None,
            }),
            registry,
            events,
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<B>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach a console and redirect the logical stdout into it.
    ///
    /// A second `start()` without `stop()` returns
    /// [`ConsoleError::AlreadyAttached`] and changes nothing.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.active.is_some() {
            return Err(ConsoleError::AlreadyAttached);
        }

        inner.backend.attach()?;

        let title_result = match &self.options.title {
            Some(title) => inner.backend.set_title(title),
            None => Ok(()),
        };

        let writer = match inner.backend.open_output() {
            Ok(writer) => writer,
            Err(e) => {
                let detach_result = inner.backend.detach();
                // Log only after unlocking; handlers may query the manager
                drop(inner);
                if let Err(detach_err) = detach_result {
                    warn!("{}", detach_err);
                }
                return Err(ConsoleError::AttachFailed(e));
            }
        };

        let current = OutputStream::buffered(writer);
        let original = self.registry.install(current.clone());

        let mut subscriptions = Vec::new();
        if self.options.forward_logs {
            let sink = LogSink::new(self.registry.clone(), self.options.colors.clone());
            subscriptions.push(self.events.subscribe(sink));
        }

        inner.active = Some(ActiveSession {
            output: RedirectedOutput { original, current },
            subscriptions,
        });
        drop(inner);

        if let Err(e) = title_result {
            debug!("{}", e);
        }
        info!("Console attached");
        Ok(())
    }

    /// Tear the session down. A no-op when nothing is attached.
    ///
    /// Order: unsubscribe handlers, flush and release the console stream,
    /// restore the original stream, free the console.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.lock();
        let Some(session) = inner.active.take() else {
            return Ok(());
        };

        drop(session.subscriptions);

        let RedirectedOutput { original, current } = session.output;
        let flush_result = current.release();
        self.registry.install(original);

        // Best-effort: local state is already restored
        let detach_result = inner.backend.detach();
        drop(inner);

        if let Err(e) = flush_result {
            debug!("Failed to flush console output: {}", e);
        }
        match detach_result {
            Ok(()) => info!("Console detached"),
            Err(e) => warn!("{}", e),
        }

        Ok(())
    }

    /// Register `handler` for every log event until `stop()`.
    pub fn on_log<H>(&self, handler: H) -> Result<()>
    where
        H: LogHandler + 'static,
    {
        let mut inner = self.lock();
        let session = inner.active.as_mut().ok_or(ConsoleError::NotAttached)?;
        session.subscriptions.push(self.events.subscribe(handler));
        Ok(())
    }

    pub fn session(&self) -> ConsoleSession {
        ConsoleSession {
            attached: self.is_attached(),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Stream bound to the console, while attached
    pub fn output(&self) -> Option<OutputStream> {
        self.lock()
            .active
            .as_ref()
            .map(|session| session.output.current.clone())
    }

    pub fn registry(&self) -> &Arc<OutputSinkRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &LogEventSource {
        &self.events
    }
}

impl<B: ConsoleBackend> Drop for ConsoleManager<B> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::backend::FakeConsole;
    use crate::console::stream::SharedBuffer;
    use crate::log::{LogEntry, Severity};
    use std::io::Write;

    fn setup(console: FakeConsole) -> (ConsoleManager<FakeConsole>, OutputStream, SharedBuffer) {
        let (original, original_buf) = OutputStream::memory();
        let registry = Arc::new(OutputSinkRegistry::new(original.clone()));
        let manager = ConsoleManager::new(console, registry, LogEventSource::new());
        (manager, original, original_buf)
    }

    #[test]
    fn test_start_redirects_stdout() {
        let console = FakeConsole::new();
        let (manager, original, original_buf) = setup(console.clone());

        manager.start().unwrap();
        assert!(manager.session().attached);
        assert!(!manager.registry().current().ptr_eq(&original));

        write!(manager.registry().stdout(), "hello console").unwrap();
        assert_eq!(console.screen().to_string_lossy(), "hello console");
        assert!(original_buf.is_empty());
    }

    #[test]
    fn test_second_start_never_creates_second_session() {
        let console = FakeConsole::new();
        let (manager, _, _) = setup(console.clone());

        manager.start().unwrap();
        let installed = manager.registry().current();

        for _ in 0..3 {
            assert!(matches!(manager.start(), Err(ConsoleError::AlreadyAttached)));
        }

        assert_eq!(console.state().sessions_created, 1);
        assert!(manager.registry().current().ptr_eq(&installed));
        assert_eq!(manager.events().handler_count(), 1);
    }

    #[test]
    fn test_stop_while_detached_is_noop() {
        let console = FakeConsole::new();
        let (manager, original, _) = setup(console.clone());

        assert!(manager.stop().is_ok());
        assert!(manager.stop().is_ok());
        assert_eq!(console.state().detach_calls, 0);
        assert!(manager.registry().current().ptr_eq(&original));
    }

    #[test]
    fn test_start_stop_restores_original_stream() {
        let console = FakeConsole::new();
        let (manager, original, original_buf) = setup(console.clone());
        let before = manager.registry().current();

        manager.start().unwrap();
        manager.stop().unwrap();

        assert!(manager.registry().current().ptr_eq(&before));
        assert!(manager.registry().current().ptr_eq(&original));
        assert!(!manager.is_attached());
        assert!(!console.state().attached);

        manager.registry().println("back home").unwrap();
        assert_eq!(original_buf.to_string_lossy(), "back home\n");
    }

    #[test]
    fn test_restart_after_stop() {
        let console = FakeConsole::new();
        let (manager, _, _) = setup(console.clone());

        manager.start().unwrap();
        manager.stop().unwrap();
        manager.start().unwrap();

        assert!(manager.is_attached());
        assert_eq!(console.state().sessions_created, 2);
    }

    #[test]
    fn test_external_console_leaves_sink_untouched() {
        let console = FakeConsole::new().with_external_console();
        let (manager, original, _) = setup(console.clone());

        let err = manager.start().unwrap_err();
        assert!(matches!(err, ConsoleError::AlreadyAttached | ConsoleError::AttachFailed(_)));
        assert!(!manager.is_attached());
        assert!(manager.registry().current().ptr_eq(&original));
        assert_eq!(manager.events().handler_count(), 0);
        assert_eq!(console.state().sessions_created, 0);
    }

    #[test]
    fn test_output_open_failure_detaches_again() {
        let console = FakeConsole::new().with_failing_output();
        let (manager, original, _) = setup(console.clone());

        assert!(matches!(manager.start(), Err(ConsoleError::AttachFailed(_))));
        assert!(!manager.is_attached());
        assert!(!console.state().attached);
        assert!(manager.registry().current().ptr_eq(&original));
    }

    #[test]
    fn test_detach_failure_still_restores_state() {
        let console = FakeConsole::new().with_failing_detach();
        let (manager, original, _) = setup(console.clone());

        manager.start().unwrap();
        assert!(manager.stop().is_ok());

        assert!(!manager.is_attached());
        assert!(manager.registry().current().ptr_eq(&original));
        assert_eq!(manager.events().handler_count(), 0);
        assert_eq!(console.state().detach_calls, 1);
    }

    #[test]
    fn test_log_events_reach_console_only_while_attached() {
        let console = FakeConsole::new();
        let (manager, _, original_buf) = setup(console.clone());
        let events = manager.events().clone();

        manager.start().unwrap();
        events.emit(&LogEntry::new(Severity::Error, "disk full"));
        manager.stop().unwrap();
        events.emit(&LogEntry::new(Severity::Error, "after stop"));

        let screen = console.screen().to_string_lossy();
        assert!(screen.contains("] disk full"));
        assert!(!screen.contains("after stop"));
        assert!(original_buf.is_empty());
        assert_eq!(events.handler_count(), 0);
    }

    #[test]
    fn test_on_log_requires_session() {
        let (manager, _, _) = setup(FakeConsole::new());
        let result = manager.on_log(|_: &LogEntry| {});
        assert!(matches!(result, Err(ConsoleError::NotAttached)));
    }

    #[test]
    fn test_on_log_handlers_removed_on_stop() {
        let (manager, _, _) = setup(FakeConsole::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        manager.start().unwrap();
        manager
            .on_log(move |entry: &LogEntry| recorder.lock().unwrap().push(entry.severity))
            .unwrap();
        manager.events().emit(&LogEntry::new(Severity::Warning, "w"));
        manager.stop().unwrap();
        manager.events().emit(&LogEntry::new(Severity::Error, "e"));

        assert_eq!(*seen.lock().unwrap(), vec![Severity::Warning]);
    }

    #[test]
    fn test_stale_stream_after_stop_is_released() {
        let console = FakeConsole::new();
        let (manager, _, _) = setup(console.clone());

        manager.start().unwrap();
        let stale = manager.output().unwrap();
        manager.stop().unwrap();

        assert!(stale.is_released());
        assert!(stale.write_all(b"ghost").is_err());
        assert!(!console.screen().to_string_lossy().contains("ghost"));
    }

    #[test]
    fn test_title_and_forwarding_options() {
        let console = FakeConsole::new();
        let registry = Arc::new(OutputSinkRegistry::new(OutputStream::memory().0));
        let options = SessionOptions {
            title: Some("Debug Console".to_string()),
            forward_logs: false,
            ..SessionOptions::default()
        };
        let manager =
            ConsoleManager::with_options(console.clone(), registry, LogEventSource::new(), options);

        manager.start().unwrap();
        assert_eq!(console.state().title.as_deref(), Some("Debug Console"));
        assert_eq!(manager.events().handler_count(), 0);
    }

    #[test]
    fn test_drop_restores_stream() {
        let console = FakeConsole::new();
        let (original, _) = OutputStream::memory();
        let registry = Arc::new(OutputSinkRegistry::new(original.clone()));
        {
            let manager =
                ConsoleManager::new(console.clone(), registry.clone(), LogEventSource::new());
            manager.start().unwrap();
        }
        assert!(registry.current().ptr_eq(&original));
        assert!(!console.state().attached);
    }

    /// Drive `f` with the tracing bridge installed and a host handler that
    /// queries the manager on every event. Returns (message, is_attached)
    /// pairs, or `None` if `f` did not finish in time.
    fn with_querying_handler<F>(console: FakeConsole, f: F) -> Option<Vec<(String, bool)>>
    where
        F: FnOnce(&ConsoleManager<FakeConsole>) + Send + 'static,
    {
        use crate::log::LogBridgeLayer;
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;
        use tracing_subscriber::layer::SubscriberExt;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let events = LogEventSource::new();
            let registry = Arc::new(OutputSinkRegistry::new(OutputStream::memory().0));
            let manager = Arc::new(ConsoleManager::new(console, registry, events.clone()));

            let observed = Arc::new(Mutex::new(Vec::new()));
            let record = observed.clone();
            let weak = Arc::downgrade(&manager);
            let _sub = events.subscribe(move |entry: &LogEntry| {
                if let Some(manager) = weak.upgrade() {
                    let attached = manager.is_attached();
                    record.lock().unwrap().push((entry.message.clone(), attached));
                }
            });

            let subscriber = tracing_subscriber::registry().with(LogBridgeLayer::new(events));
            tracing::subscriber::with_default(subscriber, || f(&manager));

            let seen = observed.lock().unwrap().clone();
            let _ = tx.send(seen);
        });

        rx.recv_timeout(Duration::from_secs(5)).ok()
    }

    #[test]
    fn test_handler_can_query_manager_during_start_and_stop() {
        let seen = with_querying_handler(FakeConsole::new(), |manager| {
            manager.start().unwrap();
            manager.stop().unwrap();
        })
        .expect("start/stop did not return");

        assert!(seen.contains(&("Console attached".to_string(), true)));
        assert!(seen.contains(&("Console detached".to_string(), false)));
    }

    #[test]
    fn test_handler_can_query_manager_when_detach_fails() {
        let console = FakeConsole::new().with_failing_detach();
        let seen = with_querying_handler(console, |manager| {
            manager.start().unwrap();
            assert!(manager.stop().is_ok());
        })
        .expect("stop did not return");

        assert!(seen.iter().any(|(message, attached)| message.contains("simulated") && !attached));
    }

    #[test]
    fn test_handler_can_query_manager_when_output_fails() {
        let console = FakeConsole::new().with_failing_output().with_failing_detach();
        let seen = with_querying_handler(console, |manager| {
            assert!(matches!(manager.start(), Err(ConsoleError::AttachFailed(_))));
        })
        .expect("start did not return");

        assert!(seen.iter().any(|(message, attached)| message.contains("simulated") && !attached));
    }

    #[test]
    fn test_title_failure_does_not_fail_start() {
        let console = FakeConsole::new().with_failing_title();
        let registry = Arc::new(OutputSinkRegistry::new(OutputStream::memory().0));
        let options = SessionOptions {
            title: Some("Debug Console".to_string()),
            ..SessionOptions::default()
        };
        let manager =
            ConsoleManager::with_options(console.clone(), registry, LogEventSource::new(), options);

        assert!(manager.start().is_ok());
        assert!(manager.is_attached());
        assert_eq!(console.state().title, None);
    }
}
