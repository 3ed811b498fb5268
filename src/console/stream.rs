//! Output streams and the logical standard-output slot
//!
//! An [`OutputStream`] is a shared handle to one writer behind one mutex.
//! Every multi-part write (color, text, reset) runs while holding that mutex,
//! so concurrent writers never interleave inside a line. Once released, the
//! writer is dropped and any further write fails with `BrokenPipe` instead of
//! touching it.
//!
//! [`OutputSinkRegistry`] is the swappable slot that decides where "print"
//! output goes. It is passed around explicitly rather than living in a static.

use std::fmt;
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex, RwLock};

type BoxedWriter = Box<dyn Write + Send>;

struct StreamInner {
    writer: Mutex<Option<BoxedWriter>>,
    /// Flush after every locked write
    auto_flush: bool,
    label: &'static str,
}

/// Shared, lockable write target.
#[derive(Clone)]
pub struct OutputStream {
    inner: Arc<StreamInner>,
}

fn released_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "output stream has been released")
}

impl OutputStream {
    fn with_parts(writer: BoxedWriter, auto_flush: bool, label: &'static str) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                writer: Mutex::new(Some(writer)),
                auto_flush,
                label,
            }),
        }
    }

    /// The process's real standard output
    pub fn stdout() -> Self {
        Self::with_parts(Box::new(io::stdout()), true, "stdout")
    }

    /// Wrap a writer in a `BufWriter` that is flushed after every write
    pub fn buffered<W: Write + Send + 'static>(writer: W) -> Self {
        Self::with_parts(Box::new(BufWriter::new(writer)), true, "buffered")
    }

    /// In-memory stream plus a handle to read back what was written
    pub fn memory() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let stream = Self::with_parts(Box::new(buffer.clone()), false, "memory");
        (stream, buffer)
    }

    /// Run `f` with exclusive access to the writer.
    ///
    /// Everything `f` writes lands contiguously. Fails with `BrokenPipe`
    /// after [`release`](Self::release).
    pub fn with_writer<R, F>(&self, f: F) -> io::Result<R>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<R>,
    {
        let mut guard = self.inner.writer.lock().unwrap_or_else(|e| e.into_inner());
        let writer = guard.as_mut().ok_or_else(released_error)?;
        let result = f(&mut **writer)?;
        if self.inner.auto_flush {
            writer.flush()?;
        }
        Ok(result)
    }

    pub fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.with_writer(|w| w.write_all(buf))
    }

    pub fn flush(&self) -> io::Result<()> {
        self.with_writer(|w| w.flush())
    }

    /// Flush and drop the underlying writer.
    ///
    /// Idempotent: releasing an already released stream is `Ok`.
    pub fn release(&self) -> io::Result<()> {
        let writer = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        match writer {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner
            .writer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// Whether both handles refer to the same stream
    pub fn ptr_eq(&self, other: &OutputStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for OutputStream {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for OutputStream {}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("kind", &self.inner.label)
            .field("auto_flush", &self.inner.auto_flush)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Growable in-memory byte buffer shared between clones.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The logical standard-output slot.
pub struct OutputSinkRegistry {
    current: RwLock<OutputStream>,
}

impl Default for OutputSinkRegistry {
    fn default() -> Self {
        Self::new(OutputStream::stdout())
    }
}

impl OutputSinkRegistry {
    pub fn new(initial: OutputStream) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// The stream print output currently goes to
    pub fn current(&self) -> OutputStream {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Install `stream`, returning the one it replaces
    pub fn install(&self, stream: OutputStream) -> OutputStream {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *current, stream)
    }

    /// `io::Write` adapter that always targets the current stream
    pub fn stdout(&self) -> LogicalStdout<'_> {
        LogicalStdout { registry: self }
    }

    /// Write one line (newline appended) as a single locked write
    pub fn println(&self, line: &str) -> io::Result<()> {
        self.current().with_writer(|w| {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")
        })
    }
}

impl fmt::Debug for OutputSinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSinkRegistry")
            .field("current", &self.current())
            .finish()
    }
}

/// Writer resolving the installed stream on every call.
pub struct LogicalStdout<'a> {
    registry: &'a OutputSinkRegistry,
}

impl Write for LogicalStdout<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.registry.current().with_writer(|w| w.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.registry.current().flush()
    }
}
