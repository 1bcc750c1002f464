//! Lazily resolved, process-lifetime configuration.
//!
//! The cache serves the compiled-in default until the option source names a
//! real variant. From then on the variant's `xtensa_config` blob is bound and
//! handed out unchanged, whatever the option source says later, until
//! [`ConfigCache::reset`] is called.
//!
//! The same holds for the library itself: once a variant library is open,
//! every symbol lookup goes to it. Only a reset lets a lookup consult the
//! option source again and open another variant.

use std::ffi::{c_char, c_void, CStr};
use std::path::PathBuf;
use std::ptr::NonNull;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

use crate::blob::{check_config_size, ProcessLifetime, XtensaConfig, DEFAULT_CONFIG};
use crate::bridge::{LibraryBridge, NativeBridge};
use crate::locator::LibraryLocator;
use crate::option::{OptionSource, Selection};
use crate::LoadError;

/// Data symbol holding the variant's [`XtensaConfig`].
pub const CONFIG_SYMBOL: &str = "xtensa_config";

/// Data symbol holding the variant's NULL-terminated define strings.
pub const CONFIG_STRINGS_SYMBOL: &str = "xtensa_config_strings";

/// Observable lifecycle of a [`ConfigCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing resolved yet, or reset since.
    Empty,
    /// The last lookup served the default; the next one asks again.
    UsingDefault,
    /// A variant blob is bound until reset.
    Resolved { variant: String },
}

struct LoadedLibrary<H> {
    variant: String,
    path: PathBuf,
    handle: H,
}

struct Inner<H> {
    state: CacheState,
    config: Option<ProcessLifetime<XtensaConfig>>,
    library: Option<LoadedLibrary<H>>,
    // Set when `library` was opened or reused since the last reset.
    bound: bool,
    // Handles for variants no longer selected. Kept so nothing they exported
    // is ever unmapped.
    retired: Vec<H>,
}

/// One-shot configuration resolver guarded by a mutex.
///
/// The lock is held across the whole `Empty -> Resolved` transition, so
/// concurrent first callers load the library exactly once.
pub struct ConfigCache<B: LibraryBridge = NativeBridge> {
    options: Box<dyn OptionSource>,
    locator: LibraryLocator,
    bridge: B,
    inner: Mutex<Inner<B::Handle>>,
}

impl<B: LibraryBridge> ConfigCache<B> {
    pub fn new(options: impl OptionSource + 'static, locator: LibraryLocator, bridge: B) -> Self {
        Self::with_boxed_source(Box::new(options), locator, bridge)
    }

    pub fn with_boxed_source(
        options: Box<dyn OptionSource>,
        locator: LibraryLocator,
        bridge: B,
    ) -> Self {
        Self {
            options,
            locator,
            bridge,
            inner: Mutex::new(Inner {
                state: CacheState::Empty,
                config: None,
                library: None,
                bound: false,
                retired: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> CacheState {
        self.inner.lock().state.clone()
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// The bound configuration, resolving it on first use.
    ///
    /// With no variant selected, or the `"default"` sentinel, this returns
    /// [`DEFAULT_CONFIG`] without caching anything.
    pub fn get_config(&self) -> Result<ProcessLifetime<XtensaConfig>, LoadError> {
        let mut inner = self.inner.lock();
        if let Some(config) = inner.config {
            trace!(state = ?inner.state, "DYN: cached config");
            return Ok(config);
        }

        let Some(variant) = self.target(&inner, CONFIG_SYMBOL) else {
            inner.state = CacheState::UsingDefault;
            return Ok(ProcessLifetime::from_static(&DEFAULT_CONFIG));
        };

        let ptr = self
            .resolve_in(&mut inner, &variant, CONFIG_SYMBOL)?
            .cast::<XtensaConfig>();
        // SAFETY: `xtensa_config` exports begin with their `config_size` word.
        if let Err(err) = unsafe { check_config_size(ptr) } {
            error!("{err}");
            return Err(err);
        }

        // SAFETY: the size check passed, the library is never unloaded and
        // the exported blob is never written after load.
        let config = unsafe { ProcessLifetime::from_raw(ptr) };
        inner.config = Some(config);
        inner.state = CacheState::Resolved { variant };
        Ok(config)
    }

    /// Resolves an arbitrary data symbol from the selected variant library.
    ///
    /// Returns `default` when no variant is selected or the sentinel is. Once
    /// a library is open it serves every lookup until [`reset`](Self::reset),
    /// even if the option source has moved on; the symbol itself is looked up
    /// on every call.
    ///
    /// # Safety
    ///
    /// Variant libraries must export `symbol` as an immutable `T`.
    pub unsafe fn load_symbol<T: Sync + 'static>(
        &self,
        symbol: &str,
        default: &'static T,
    ) -> Result<ProcessLifetime<T>, LoadError> {
        let mut inner = self.inner.lock();
        let Some(variant) = self.target(&inner, symbol) else {
            return Ok(ProcessLifetime::from_static(default));
        };
        let address = self.resolve_in(&mut inner, &variant, symbol)?;
        Ok(ProcessLifetime::from_raw(address.cast::<T>()))
    }

    /// The builtin define list of the selected variant.
    ///
    /// Falls back to the defines of [`DEFAULT_CONFIG`].
    pub fn config_strings(&self) -> Result<Vec<String>, LoadError> {
        let mut inner = self.inner.lock();
        let Some(variant) = self.target(&inner, CONFIG_STRINGS_SYMBOL) else {
            return Ok(DEFAULT_CONFIG.define_strings());
        };
        let address = self.resolve_in(&mut inner, &variant, CONFIG_STRINGS_SYMBOL)?;
        // SAFETY: the export is a NULL-terminated array of C strings.
        Ok(unsafe { read_string_table(address.cast::<*const c_char>()) })
    }

    /// Forgets the bound configuration; the next lookup starts over.
    ///
    /// The library handle is kept, never closed. It is reused if the next
    /// lookup selects the same variant and retired otherwise.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.config = None;
        inner.bound = false;
        inner.state = CacheState::Empty;
        debug!("configuration cache reset");
    }

    /// The variant serving `symbol`: the bound library's if there is one,
    /// otherwise whatever the option source selects.
    fn target(&self, inner: &Inner<B::Handle>, symbol: &str) -> Option<String> {
        match &inner.library {
            Some(library) if inner.bound => {
                trace!("DYN: {} (bound), symbol: {symbol}", library.variant);
                Some(library.variant.clone())
            }
            _ => self.select(symbol),
        }
    }

    /// The variant to load for `symbol`, or `None` to serve the default.
    fn select(&self, symbol: &str) -> Option<String> {
        match Selection::classify(self.options.variant()) {
            Selection::Unset => {
                info!("Uninitialized DYN, symbol: {symbol}");
                None
            }
            Selection::Default => {
                info!("Default DYN, symbol: {symbol}");
                None
            }
            Selection::Variant(variant) => {
                trace!("DYN: {variant}, symbol: {symbol}");
                Some(variant)
            }
        }
    }

    fn resolve_in(
        &self,
        inner: &mut Inner<B::Handle>,
        variant: &str,
        symbol: &str,
    ) -> Result<NonNull<c_void>, LoadError> {
        let library = match inner.library.take() {
            Some(library) if library.variant == variant => library,
            previous => {
                inner.retired.extend(previous.map(|library| library.handle));
                info!("Use '{variant}' config for {symbol} symbol");
                self.open(variant)?
            }
        };
        let library = inner.library.insert(library);
        inner.bound = true;

        self.bridge
            .resolve(&library.handle, symbol)
            .map_err(|err| {
                let err = LoadError::Symbol {
                    symbol: symbol.to_string(),
                    message: err.message().to_string(),
                };
                error!(path = %library.path.display(), "{err}");
                err
            })
    }

    fn open(&self, variant: &str) -> Result<LoadedLibrary<B::Handle>, LoadError> {
        let path = self.locator.locate(variant).inspect_err(|err| error!("{err}"))?;
        match self.bridge.load(&path) {
            Ok(handle) => {
                info!("Lib \"{}\" loaded", path.display());
                Ok(LoadedLibrary {
                    variant: variant.to_string(),
                    path,
                    handle,
                })
            }
            Err(err) => {
                let err = LoadError::Library {
                    path,
                    message: err.message().to_string(),
                };
                error!("{err}");
                Err(err)
            }
        }
    }
}

/// Copies out a NULL-terminated `const char *[]`.
///
/// # Safety
///
/// `table` must point to an array of valid C strings ending in a null entry.
unsafe fn read_string_table(table: NonNull<*const c_char>) -> Vec<String> {
    let mut strings = Vec::new();
    let mut cursor = table.as_ptr().cast_const();
    loop {
        let entry = cursor.read();
        if entry.is_null() {
            break;
        }
        strings.push(CStr::from_ptr(entry).to_string_lossy().into_owned());
        cursor = cursor.add(1);
    }
    strings
}
