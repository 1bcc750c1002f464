//! Runtime context owning the loader settings and the configuration cache.

use crate::bridge::{LibraryBridge, NativeBridge};
use crate::cache::ConfigCache;
use crate::config::Settings;
use crate::locator::LibraryLocator;
use crate::option::{EnvOption, OptionSource};
use crate::Error;

/// Everything a toolchain process needs to resolve its core configuration.
///
/// Generic over the loader bridge so hosts and tests can substitute the
/// dynamic loader; production code uses [`NativeBridge`].
///
/// ## Example
///
/// ```no_run
/// use xtensa_dynconfig::{FixedOption, Settings, ToolchainContext};
///
/// let ctx = ToolchainContext::builder()
///     .with_settings(Settings::load()?)
///     .with_option_source(FixedOption::new(Some("esp32".into())))
///     .build()?;
///
/// let config = ctx.cache().get_config()?;
/// println!("windowed ABI: {}", config.xchal_have_windowed);
/// # Ok::<(), xtensa_dynconfig::Error>(())
/// ```
pub struct ToolchainContext<B: LibraryBridge = NativeBridge> {
    settings: Settings,
    cache: ConfigCache<B>,
}

impl<B: LibraryBridge> ToolchainContext<B> {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &ConfigCache<B> {
        &self.cache
    }
}

impl ToolchainContext {
    /// Creates a new builder using the host's dynamic loader.
    pub fn builder() -> ToolchainContextBuilder<NativeBridge> {
        ToolchainContextBuilder {
            settings: None,
            options: None,
            bridge: NativeBridge::new(),
        }
    }
}

/// Builder for constructing a [`ToolchainContext`].
///
/// Settings are mandatory. Without an explicit option source the variant is
/// read from the environment variable named by [`Settings::variant_env`].
#[must_use = "builders do nothing until .build() is called"]
pub struct ToolchainContextBuilder<B> {
    settings: Option<Settings>,
    options: Option<Box<dyn OptionSource>>,
    bridge: B,
}

impl<B: LibraryBridge> ToolchainContextBuilder<B> {
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_option_source(mut self, options: impl OptionSource + 'static) -> Self {
        self.options = Some(Box::new(options));
        self
    }

    /// Swaps the loader used to open variant libraries.
    pub fn with_bridge<B2: LibraryBridge>(self, bridge: B2) -> ToolchainContextBuilder<B2> {
        ToolchainContextBuilder {
            settings: self.settings,
            options: self.options,
            bridge,
        }
    }

    /// Builds the `ToolchainContext`.
    ///
    /// Returns an error if no settings were provided.
    pub fn build(self) -> Result<ToolchainContext<B>, Error> {
        let settings = self.settings.ok_or(Error::MissingSettings)?;
        let locator = match &settings.library_dir {
            Some(dir) => LibraryLocator::with_library_dir(dir),
            None => LibraryLocator::new(),
        };
        let options = self
            .options
            .unwrap_or_else(|| Box::new(EnvOption::new(settings.variant_env.clone())));

        Ok(ToolchainContext {
            cache: ConfigCache::with_boxed_source(options, locator, self.bridge),
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::DEFAULT_CONFIG;
    use crate::option::FixedOption;
    use crate::LoadError;

    #[test]
    fn test_build_requires_settings() {
        let result = ToolchainContext::builder().build();
        assert!(matches!(result, Err(Error::MissingSettings)));
    }

    #[test]
    fn test_default_option_source_reads_variant_env() {
        let settings = Settings {
            variant_env: "XTENSA_DYNCONFIG_TEST_CONTEXT_VARIANT".into(),
            ..Settings::default()
        };
        std::env::set_var(&settings.variant_env, "default");

        let ctx = ToolchainContext::builder()
            .with_settings(settings)
            .build()
            .unwrap();

        assert!(ctx.cache().get_config().unwrap().same_as(&DEFAULT_CONFIG));
        std::env::remove_var(&ctx.settings().variant_env);
    }

    #[test]
    fn test_library_dir_setting_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            library_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };

        let ctx = ToolchainContext::builder()
            .with_settings(settings)
            .with_option_source(FixedOption::new(Some("esp32".into())))
            .build()
            .unwrap();

        match ctx.cache().get_config() {
            Err(LoadError::Library { path, .. }) => assert!(path.starts_with(dir.path())),
            other => panic!("expected load failure inside {:?}, got {other:?}", dir.path()),
        }
    }
}
