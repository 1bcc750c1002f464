use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::env::load_env_vars;
use super::ConfigError;

/// A settings source in the loading pipeline.
#[derive(Debug)]
enum ConfigSource {
    File { path: PathBuf, required: bool },
    Env { prefix: String, separator: String },
}

/// Builder for layering loader settings from TOML files and the environment.
///
/// Sources are merged in registration order, with later sources overriding
/// earlier ones. Nested tables are merged recursively; other values
/// (including arrays) are replaced entirely.
///
/// ## Example
///
/// ```no_run
/// use xtensa_dynconfig::{Config, Settings};
///
/// // defaults -> install-wide file -> environment overrides
/// let settings: Settings = Config::builder()
///     .with_file("/opt/xtensa/lib/xtensa-dynconfig.toml", false)
///     .with_env("XTENSA_DYNCONFIG", "__")
///     .build()?;
/// # Ok::<(), xtensa_dynconfig::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct Config {
    sources: Vec<ConfigSource>,
}

impl Config {
    /// Creates a new settings builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a TOML file to be loaded.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        self.sources.push(ConfigSource::File {
            path: path.as_ref().to_path_buf(),
            required,
        });
        self
    }

    /// Loads settings from environment variables with the given prefix.
    ///
    /// Environment variables are mapped to settings paths by:
    /// 1. Removing the prefix and separator
    /// 2. Splitting remaining segments on the separator
    /// 3. Converting path segments to lowercase
    pub fn with_env(mut self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Env {
            prefix: prefix.into(),
            separator: separator.into(),
        });
        self
    }

    /// Builds the settings by loading, merging, and deserializing every source.
    pub fn build<T: DeserializeOwned>(self) -> Result<T, ConfigError> {
        let mut merged = toml::Table::new();

        for source in self.sources {
            match source {
                ConfigSource::File { path, required } => {
                    if let Some(layer) = read_settings_layer(&path, required)? {
                        overlay(&mut merged, layer);
                    }
                }
                ConfigSource::Env { prefix, separator } => {
                    if separator.is_empty() {
                        return Err(ConfigError::EmptySeparator);
                    }
                    load_env_vars(&mut merged, &prefix, &separator);
                }
            }
        }

        let value = toml::Value::Table(merged);
        value.try_into().map_err(ConfigError::DeserializeError)
    }
}

/// Settings keys holding filesystem paths.
const PATH_KEYS: &[&str] = &["library_dir"];

/// Reads one TOML settings layer.
///
/// A missing optional file contributes nothing, so an install without a
/// settings file runs on defaults. Relative values under [`PATH_KEYS`] are
/// anchored at the file's own directory: an install-wide file can say
/// `library_dir = "."` and keep working when the tree is relocated.
fn read_settings_layer(path: &Path, required: bool) -> Result<Option<toml::Table>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            };
        }
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let mut table: toml::Table = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    if let Some(dir) = path.parent() {
        anchor_paths(&mut table, dir);
    }
    Ok(Some(table))
}

fn anchor_paths(table: &mut toml::Table, dir: &Path) {
    for key in PATH_KEYS {
        if let Some(toml::Value::String(value)) = table.get_mut(*key) {
            if Path::new(value.as_str()).is_relative() {
                *value = dir.join(value.as_str()).to_string_lossy().into_owned();
            }
        }
    }
}

/// Overlays a later settings layer on the accumulated one.
///
/// A layer only replaces the fields it names, so a local file that sets
/// `library_dir` keeps the install-wide variable names. Non-table values,
/// arrays included, are replaced outright.
fn overlay(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                overlay(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_later_file_overrides_earlier() {
        let mut base = NamedTempFile::new().unwrap();
        writeln!(base, "trace_env = \"BASE_TRACE\"\nvariant_env = \"BASE_VARIANT\"").unwrap();
        let mut local = NamedTempFile::new().unwrap();
        writeln!(local, "trace_env = \"LOCAL_TRACE\"").unwrap();

        let settings: Settings = Config::builder()
            .with_file(base.path(), true)
            .with_file(local.path(), true)
            .build()
            .unwrap();

        assert_eq!(settings.trace_env, "LOCAL_TRACE");
        assert_eq!(settings.variant_env, "BASE_VARIANT");
        assert_eq!(settings.library_dir, None);
    }

    #[test]
    fn test_relative_library_dir_is_anchored_at_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xtensa-dynconfig.toml");
        std::fs::write(&path, "library_dir = \"lib\"\n").unwrap();

        let settings: Settings = Config::builder().with_file(&path, true).build().unwrap();

        assert_eq!(settings.library_dir, Some(dir.path().join("lib")));
    }

    #[test]
    #[cfg(unix)]
    fn test_absolute_library_dir_is_kept() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "library_dir = \"/opt/xtensa/lib\"").unwrap();

        let settings: Settings = Config::builder().with_file(file.path(), true).build().unwrap();

        assert_eq!(settings.library_dir, Some(PathBuf::from("/opt/xtensa/lib")));
    }

    #[test]
    fn test_required_missing_file_fails() {
        let result = Config::builder()
            .with_file("/nonexistent/path/xtensa-dynconfig.toml", true)
            .build::<Settings>();

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_optional_missing_file_yields_defaults() {
        let settings: Settings = Config::builder()
            .with_file("/nonexistent/path/xtensa-dynconfig.toml", false)
            .build()
            .unwrap();

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "trace_env = ").unwrap();

        let result = Config::builder()
            .with_file(file.path(), true)
            .build::<Settings>();

        match result {
            Err(ConfigError::ParseError { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_env_separator_is_rejected() {
        let result = Config::builder().with_env("XTENSA_DYNCONFIG", "").build::<Settings>();
        assert!(matches!(result, Err(ConfigError::EmptySeparator)));
    }

    #[test]
    fn test_nested_tables_merge_recursively() {
        let mut a = NamedTempFile::new().unwrap();
        writeln!(a, "[outer]\nx = \"1\"\ny = \"2\"").unwrap();
        let mut b = NamedTempFile::new().unwrap();
        writeln!(b, "[outer]\ny = \"3\"").unwrap();

        let table: toml::Table = Config::builder()
            .with_file(a.path(), true)
            .with_file(b.path(), true)
            .build()
            .unwrap();

        let outer = table.get("outer").and_then(toml::Value::as_table).unwrap();
        assert_eq!(outer.get("x").and_then(toml::Value::as_str), Some("1"));
        assert_eq!(outer.get("y").and_then(toml::Value::as_str), Some("3"));
    }
}
