//! Loader settings: layered TOML files and environment overrides.

mod builder;
mod env;
mod error;
mod settings;

pub use builder::Config;
pub use error::ConfigError;
pub use settings::{Settings, SETTINGS_ENV_PREFIX, SETTINGS_ENV_SEPARATOR};
