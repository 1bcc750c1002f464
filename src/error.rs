use std::path::PathBuf;

use crate::config::ConfigError;
use thiserror::Error;

/// Failures while locating, loading or validating a variant library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("cannot determine the running executable's path: {0}")]
    ExecutablePath(#[source] std::io::Error),

    #[error("executable '{0}' has no installation root two levels up")]
    NoInstallRoot(PathBuf),

    #[error("insufficient buffer size: path '{path}' exceeds {limit} bytes")]
    PathTooLong { path: PathBuf, limit: usize },

    #[error("invalid configuration variant name: {0:?}")]
    InvalidVariant(String),

    #[error("Lib \"{path}\" cannot be loaded: {message}")]
    Library { path: PathBuf, message: String },

    #[error("Symbol \"{symbol}\" cannot be found: {message}")]
    Symbol { symbol: String, message: String },

    #[error("Old or incompatible configuration is loaded: config_size = {found}, expected: {expected}")]
    IncompatibleSize { found: u64, expected: usize },
}

/// Top-level error type for the xtensa-dynconfig library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("settings error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("toolchain context requires loader settings")]
    MissingSettings,
}
