//! Maps a variant name to the shared library that implements it.
//!
//! Libraries live in `<install>/lib/xtensaconfig-<variant>.<ext>`, where
//! `<install>` is two levels above the running executable
//! (`<install>/bin/<tool>`).

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::LoadError;

/// File-name prefix shared by every variant library.
pub const LIBRARY_PREFIX: &str = "xtensaconfig-";

/// Directory, relative to the installation root, holding variant libraries.
pub const LIBRARY_DIR: &str = "lib";

/// Longest path, in bytes, the host loader accepts (terminator included).
#[cfg(unix)]
pub const MAX_PATH_LEN: usize = libc::PATH_MAX as usize;
#[cfg(windows)]
pub const MAX_PATH_LEN: usize = 260;
#[cfg(not(any(unix, windows)))]
pub const MAX_PATH_LEN: usize = 4096;

/// Absolute path of the running executable.
pub fn executable_path() -> Result<PathBuf, LoadError> {
    let path = std::env::current_exe().map_err(LoadError::ExecutablePath)?;
    check_path_len(&path)?;
    Ok(path)
}

/// `<install>/lib` for an executable at `<install>/bin/<tool>`.
///
/// Borrows `exe` and builds a fresh path, so the caller's copy is untouched.
pub fn library_dir_for(exe: &Path) -> Result<PathBuf, LoadError> {
    let root = exe
        .parent()
        .and_then(Path::parent)
        .filter(|root| !root.as_os_str().is_empty())
        .ok_or_else(|| LoadError::NoInstallRoot(exe.to_path_buf()))?;
    let dir = root.join(LIBRARY_DIR);
    check_path_len(&dir)?;
    Ok(dir)
}

/// `xtensaconfig-<variant>.so` (`.dylib` on macOS, `.dll` on Windows).
pub fn library_file_name(variant: &str) -> String {
    format!(
        "{LIBRARY_PREFIX}{variant}.{}",
        std::env::consts::DLL_EXTENSION
    )
}

/// Resolves variant names to library paths.
#[derive(Debug, Clone, Default)]
pub struct LibraryLocator {
    library_dir: Option<PathBuf>,
}

impl LibraryLocator {
    /// Locator deriving the library directory from the executable's location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator that always looks in `dir`.
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
        }
    }

    /// Full path of the library implementing `variant`.
    ///
    /// Recomputed on every call; nothing is cached.
    pub fn locate(&self, variant: &str) -> Result<PathBuf, LoadError> {
        validate_variant(variant)?;
        let dir = match &self.library_dir {
            Some(dir) => dir.clone(),
            None => library_dir_for(&executable_path()?)?,
        };
        let path = dir.join(library_file_name(variant));
        check_path_len(&path)?;
        debug!(variant, path = %path.display(), "derived variant library path");
        Ok(path)
    }
}

fn validate_variant(variant: &str) -> Result<(), LoadError> {
    let bad = variant.is_empty()
        || variant.contains('\0')
        || variant.chars().any(|c| c == '/' || c == '\\' || std::path::is_separator(c));
    if bad {
        return Err(LoadError::InvalidVariant(variant.to_string()));
    }
    Ok(())
}

fn check_path_len(path: &Path) -> Result<(), LoadError> {
    if path.as_os_str().len() >= MAX_PATH_LEN {
        return Err(LoadError::PathTooLong {
            path: path.to_path_buf(),
            limit: MAX_PATH_LEN,
        });
    }
    Ok(())
}
