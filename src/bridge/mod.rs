//! Platform-uniform shared-library loading.
//!
//! [`LibraryBridge`] is the seam between the config cache and the host's
//! dynamic loader. [`NativeBridge`] is the real implementation; tests swap in
//! bridges that serve in-process data.

mod native;

use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;

use thiserror::Error;

pub use native::NativeBridge;

/// A loader operation that failed; the message is already formatted for humans.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("{0}")]
    Load(String),

    #[error("{0}")]
    Resolve(String),
}

impl BridgeError {
    pub fn message(&self) -> &str {
        match self {
            Self::Load(message) | Self::Resolve(message) => message,
        }
    }
}

/// Load a library, resolve symbols in it, report what went wrong last.
///
/// Handles are never closed: the data behind resolved symbols is borrowed for
/// the rest of the process.
pub trait LibraryBridge: Send + Sync {
    /// Opaque reference to a loaded library.
    type Handle: Send + Sync + 'static;

    /// Loads the library at `path`, resolving all of its symbols immediately.
    fn load(&self, path: &Path) -> Result<Self::Handle, BridgeError>;

    /// Address of the exported data symbol `symbol` inside `handle`.
    fn resolve(&self, handle: &Self::Handle, symbol: &str) -> Result<NonNull<c_void>, BridgeError>;

    /// Message describing the most recent failed operation, if any.
    fn last_error(&self) -> Option<String>;
}
