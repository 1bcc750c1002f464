use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{Config, ConfigError};
use crate::diagnostics::TRACE_ENV;

/// Prefix for environment overrides of [`Settings`] fields.
pub const SETTINGS_ENV_PREFIX: &str = "XTENSA_DYNCONFIG";
/// Separator between the prefix and the field path.
pub const SETTINGS_ENV_SEPARATOR: &str = "__";

/// Tunables for the loader itself.
///
/// The library naming contract (`xtensaconfig-<variant>`, the exported
/// `xtensa_config` symbol and the `"default"` sentinel) is fixed and is not
/// part of these settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Environment variable holding the requested variant when the process
    /// context falls back to [`EnvOption`](crate::EnvOption).
    pub variant_env: String,
    /// Environment variable holding the diagnostic verbosity level.
    pub trace_env: String,
    /// Replaces the `<exe>/../../lib` directory derived from the executable.
    pub library_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            variant_env: "XTENSA_DYNCONFIG_VARIANT".to_string(),
            trace_env: TRACE_ENV.to_string(),
            library_dir: None,
        }
    }
}

impl Settings {
    /// Defaults overlaid with `XTENSA_DYNCONFIG__*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .with_env(SETTINGS_ENV_PREFIX, SETTINGS_ENV_SEPARATOR)
            .build()
    }

    /// Like [`load`](Self::load), with an optional TOML file applied before
    /// the environment.
    pub fn load_with_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .with_file(path, false)
            .with_env(SETTINGS_ENV_PREFIX, SETTINGS_ENV_SEPARATOR)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_toolchain_conventions() {
        let settings = Settings::default();
        assert_eq!(settings.trace_env, "ESP_DEBUG_TRACE");
        assert_eq!(settings.variant_env, "XTENSA_DYNCONFIG_VARIANT");
        assert!(settings.library_dir.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn test_file_sets_library_dir() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "library_dir = \"/opt/xtensa/lib\"").unwrap();

        let settings = Settings::load_with_file(file.path()).unwrap();
        assert_eq!(settings.library_dir, Some(PathBuf::from("/opt/xtensa/lib")));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "libary_dir = \"/typo\"").unwrap();

        let result = Settings::load_with_file(file.path());
        assert!(matches!(result, Err(ConfigError::DeserializeError(_))));
    }
}
