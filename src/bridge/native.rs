use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;

use libloading::Library;
use parking_lot::Mutex;
use tracing::trace;

use super::{BridgeError, LibraryBridge};

/// The host's dynamic loader (`dlopen` family or `LoadLibrary` family).
///
/// Loaded libraries are leaked on purpose: symbols handed out by
/// [`resolve`](LibraryBridge::resolve) must stay mapped until exit.
#[derive(Debug, Default)]
pub struct NativeBridge {
    last_error: Mutex<Option<String>>,
}

impl NativeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, routine: &str, err: &libloading::Error) -> String {
        let message = describe(routine, err);
        *self.last_error.lock() = Some(message.clone());
        message
    }
}

impl LibraryBridge for NativeBridge {
    type Handle = &'static Library;

    fn load(&self, path: &Path) -> Result<Self::Handle, BridgeError> {
        // SAFETY: running a variant library's initializers is the point of
        // loading it; the toolchain trusts its own install tree.
        match unsafe { open_now(path) } {
            Ok(library) => {
                trace!(path = %path.display(), "library opened");
                Ok(Box::leak(Box::new(library)))
            }
            Err(err) => Err(BridgeError::Load(self.record("dlopen", &err))),
        }
    }

    fn resolve(&self, handle: &Self::Handle, symbol: &str) -> Result<NonNull<c_void>, BridgeError> {
        let library: &'static Library = *handle;
        // SAFETY: the symbol is read as a data address only; interpreting the
        // pointee is the caller's responsibility.
        let resolved = unsafe { library.get::<*mut c_void>(symbol.as_bytes()) };
        match resolved {
            Ok(address) => NonNull::new(*address).ok_or_else(|| {
                let message = format!("dlsym: symbol '{symbol}' resolved to a null address");
                *self.last_error.lock() = Some(message.clone());
                BridgeError::Resolve(message)
            }),
            Err(err) => Err(BridgeError::Resolve(self.record("dlsym", &err))),
        }
    }

    /// Returns and clears the last failure, like `dlerror`.
    fn last_error(&self) -> Option<String> {
        self.last_error.lock().take()
    }
}

#[cfg(unix)]
unsafe fn open_now(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};

    UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL).map(Library::from)
}

#[cfg(windows)]
unsafe fn open_now(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::windows::Library as WindowsLibrary;

    WindowsLibrary::new(path).map(Library::from)
}

/// `<routine> error: <loader message>[: <cause>...]`
fn describe(routine: &str, err: &libloading::Error) -> String {
    let mut message = format!("{routine} error: {err}");
    let mut cause = std::error::Error::source(err);
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}
