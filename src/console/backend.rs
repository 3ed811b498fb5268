//! OS console backends
//!
//! The lifecycle only talks to the OS through [`ConsoleBackend`]:
//!
//! - **WindowsConsole**: `AllocConsole` / `FreeConsole` and the `CONOUT$` device
//! - **UnsupportedConsole**: stand-in on other platforms, attach always fails
//! - **FakeConsole**: in-memory console for tests and headless embedding

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::error::{ConsoleError, Result};
use super::stream::SharedBuffer;

/// OS-level console primitives.
pub trait ConsoleBackend: Send {
    /// Bind a new console to the process.
    ///
    /// Reports [`ConsoleError::AlreadyAttached`] when the process already
    /// owns a console; a process has at most one.
    fn attach(&mut self) -> Result<()>;

    /// Release the process's console
    fn detach(&mut self) -> Result<()>;

    /// Open a writable handle to the attached console's screen buffer
    fn open_output(&mut self) -> io::Result<Box<dyn Write + Send>>;

    /// Set the console window title. Best-effort.
    fn set_title(&mut self, _title: &str) -> Result<()> {
        Ok(())
    }
}

impl<B: ConsoleBackend + ?Sized> ConsoleBackend for Box<B> {
    fn attach(&mut self) -> Result<()> {
        (**self).attach()
    }

    fn detach(&mut self) -> Result<()> {
        (**self).detach()
    }

    fn open_output(&mut self) -> io::Result<Box<dyn Write + Send>> {
        (**self).open_output()
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        (**self).set_title(title)
    }
}

/// Backend for the current platform
#[cfg(windows)]
pub type NativeBackend = WindowsConsole;

/// Backend for the current platform
#[cfg(not(windows))]
pub type NativeBackend = UnsupportedConsole;

#[cfg(windows)]
pub use self::windows_console::WindowsConsole;

#[cfg(windows)]
mod windows_console {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Write};
    use std::os::windows::io::AsRawHandle;

    use windows::core::HSTRING;
    use windows::Win32::Foundation::{ERROR_ACCESS_DENIED, HANDLE};
    use windows::Win32::System::Console::{
        AllocConsole, FreeConsole, GetConsoleMode, SetConsoleMode, SetConsoleTitleW,
        CONSOLE_MODE, ENABLE_VIRTUAL_TERMINAL_PROCESSING,
    };

    use super::ConsoleBackend;
    use crate::console::error::{ConsoleError, Result};

    /// Real console window via the Win32 console API
    #[derive(Debug, Default)]
    pub struct WindowsConsole {
        _private: (),
    }

    impl WindowsConsole {
        pub fn new() -> Self {
            Self::default()
        }
    }

    /// Let the console interpret ANSI color sequences
    fn enable_virtual_terminal(file: &File) {
        let handle = HANDLE(file.as_raw_handle() as _);
        let mut mode = CONSOLE_MODE::default();

        unsafe {
            if GetConsoleMode(handle, &mut mode).is_ok() {
                let _ = SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING);
            }
        }
    }

    impl ConsoleBackend for WindowsConsole {
        fn attach(&mut self) -> Result<()> {
            unsafe {
                AllocConsole().map_err(|e| {
                    // AllocConsole reports access denied when a console is already bound
                    if e.code() == ERROR_ACCESS_DENIED.to_hresult() {
                        ConsoleError::AlreadyAttached
                    } else {
                        ConsoleError::AttachFailed(e.into())
                    }
                })
            }
        }

        fn detach(&mut self) -> Result<()> {
            unsafe { FreeConsole().map_err(|e| ConsoleError::DetachFailed(e.into())) }
        }

        fn open_output(&mut self) -> io::Result<Box<dyn Write + Send>> {
            let file = OpenOptions::new().read(true).write(true).open("CONOUT$")?;
            enable_virtual_terminal(&file);
            Ok(Box::new(file))
        }

        fn set_title(&mut self, title: &str) -> Result<()> {
            unsafe {
                SetConsoleTitleW(&HSTRING::from(title))
                    .map_err(|e| ConsoleError::TitleFailed(e.into()))
            }
        }
    }
}

/// Backend for platforms without attachable console windows
#[derive(Debug, Default)]
pub struct UnsupportedConsole;

impl ConsoleBackend for UnsupportedConsole {
    fn attach(&mut self) -> Result<()> {
        Err(ConsoleError::AttachFailed(io::Error::new(
            io::ErrorKind::Unsupported,
            "console windows are only supported on Windows",
        )))
    }

    fn detach(&mut self) -> Result<()> {
        Ok(())
    }

    fn open_output(&mut self) -> io::Result<Box<dyn Write + Send>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "no console attached",
        ))
    }
}

/// Observable state of a [`FakeConsole`]
#[derive(Debug, Default, Clone)]
pub struct FakeState {
    /// Console bound by this backend
    pub attached: bool,
    /// Console bound by someone else before we tried
    pub external: bool,
    pub attach_calls: usize,
    pub detach_calls: usize,
    /// Sessions this backend actually created
    pub sessions_created: usize,
    pub title: Option<String>,
    pub fail_detach: bool,
    pub fail_open: bool,
    pub fail_title: bool,
}

/// In-memory console. Clones share state and screen.
#[derive(Clone, Default)]
pub struct FakeConsole {
    state: Arc<Mutex<FakeState>>,
    screen: SharedBuffer,
}

impl FakeConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a console already bound to the process
    pub fn with_external_console(self) -> Self {
        self.update(|s| s.external = true);
        self
    }

    /// Make `detach` report failure
    pub fn with_failing_detach(self) -> Self {
        self.update(|s| s.fail_detach = true);
        self
    }

    /// Make `open_output` report failure
    pub fn with_failing_output(self) -> Self {
        self.update(|s| s.fail_open = true);
        self
    }

    /// Make `set_title` report failure
    pub fn with_failing_title(self) -> Self {
        self.update(|s| s.fail_title = true);
        self
    }

    pub fn state(&self) -> FakeState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Everything written to the console's screen so far
    pub fn screen(&self) -> SharedBuffer {
        self.screen.clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl ConsoleBackend for FakeConsole {
    fn attach(&mut self) -> Result<()> {
        self.update(|s| {
            s.attach_calls += 1;
            if s.attached || s.external {
                return Err(ConsoleError::AlreadyAttached);
            }
            s.attached = true;
            s.sessions_created += 1;
            Ok(())
        })
    }

    fn detach(&mut self) -> Result<()> {
        self.update(|s| {
            s.detach_calls += 1;
            if s.fail_detach {
                return Err(ConsoleError::DetachFailed(io::Error::new(
                    io::ErrorKind::Other,
                    "simulated FreeConsole failure",
                )));
            }
            s.attached = false;
            Ok(())
        })
    }

    fn open_output(&mut self) -> io::Result<Box<dyn Write + Send>> {
        let state = self.state();
        if !state.attached {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no console attached"));
        }
        if state.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "simulated CONOUT$ failure",
            ));
        }
        Ok(Box::new(self.screen.clone()))
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        self.update(|s| {
            if s.fail_title {
                return Err(ConsoleError::TitleFailed(io::Error::new(
                    io::ErrorKind::Other,
                    "simulated SetConsoleTitleW failure",
                )));
            }
            s.title = Some(title.to_string());
            Ok(())
        })
    }
}
