//! Runtime selection of Xtensa core configurations.
//!
//! A single toolchain binary serves many cores by loading
//! `<install>/lib/xtensaconfig-<variant>.so` and reading the `xtensa_config`
//! record it exports. Until a variant is selected the compiled-in default core
//! is used. See [`ConfigCache`] for the resolution rules and [`process`] for
//! the abort-on-failure entry points a toolchain calls.

pub mod blob;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod context;
pub mod diagnostics;
mod error;
pub mod locator;
pub mod option;
pub mod process;

pub use blob::{ProcessLifetime, XtensaConfig, DEFAULT_CONFIG};
pub use bridge::{BridgeError, LibraryBridge, NativeBridge};
pub use cache::{CacheState, ConfigCache, CONFIG_STRINGS_SYMBOL, CONFIG_SYMBOL};
pub use config::{Config, ConfigError, Settings};
pub use context::{ToolchainContext, ToolchainContextBuilder};
pub use error::{Error, LoadError};
pub use locator::LibraryLocator;
pub use option::{EnvOption, FixedOption, OptionSource, DEFAULT_VARIANT};
pub use process::{get_config, load_config, reset_config};
