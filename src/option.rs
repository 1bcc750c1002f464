//! Where the requested variant name comes from.

use std::borrow::Cow;
use std::fmt;

use parking_lot::RwLock;

/// Reserved variant name meaning "use the compiled-in default".
pub const DEFAULT_VARIANT: &str = "default";

/// Reports which configuration variant, if any, the host selected.
///
/// Called again at every point where resolution may happen, so
/// implementations should be cheap and free of side effects.
pub trait OptionSource: Send + Sync {
    fn variant(&self) -> Option<String>;
}

impl<F> OptionSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn variant(&self) -> Option<String> {
        self()
    }
}

/// How a reported variant should be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// No variant reported yet.
    Unset,
    /// The explicit [`DEFAULT_VARIANT`] sentinel.
    Default,
    /// A named variant backed by a library.
    Variant(String),
}

impl Selection {
    pub fn classify(reported: Option<String>) -> Self {
        match reported {
            None => Self::Unset,
            Some(name) if name == DEFAULT_VARIANT => Self::Default,
            Some(name) => Self::Variant(name),
        }
    }
}

/// Reads the variant from an environment variable on every call.
///
/// An empty value counts as unset.
#[derive(Debug, Clone)]
pub struct EnvOption {
    var: Cow<'static, str>,
}

impl EnvOption {
    pub fn new(var: impl Into<Cow<'static, str>>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl OptionSource for EnvOption {
    fn variant(&self) -> Option<String> {
        std::env::var(self.var.as_ref())
            .ok()
            .filter(|value| !value.is_empty())
    }
}

/// A value the host writes once its own option parsing is done.
#[derive(Default)]
pub struct FixedOption {
    value: RwLock<Option<String>>,
}

impl FixedOption {
    pub fn new(value: Option<String>) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    pub fn set(&self, value: Option<String>) {
        *self.value.write() = value;
    }
}

impl OptionSource for FixedOption {
    fn variant(&self) -> Option<String> {
        self.value.read().clone()
    }
}

impl fmt::Debug for FixedOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedOption")
            .field("value", &*self.value.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Selection::classify(None), Selection::Unset);
        assert_eq!(
            Selection::classify(Some("default".into())),
            Selection::Default
        );
        assert_eq!(
            Selection::classify(Some("esp32".into())),
            Selection::Variant("esp32".into())
        );
    }

    #[test]
    fn test_env_option_rereads_each_call() {
        let source = EnvOption::new("XTENSA_DYNCONFIG_TEST_ENV_OPTION_REREAD");
        std::env::remove_var(source.var());
        assert_eq!(source.variant(), None);

        std::env::set_var(source.var(), "esp32s2");
        assert_eq!(source.variant().as_deref(), Some("esp32s2"));

        std::env::set_var(source.var(), "");
        assert_eq!(source.variant(), None);
        std::env::remove_var(source.var());
    }

    #[test]
    fn test_fixed_option_can_be_updated() {
        let source = FixedOption::default();
        assert_eq!(source.variant(), None);

        source.set(Some("esp32".into()));
        assert_eq!(source.variant().as_deref(), Some("esp32"));
    }

    #[test]
    fn test_closures_are_sources() {
        let source = || Some("esp32s3".to_string());
        assert_eq!(OptionSource::variant(&source).as_deref(), Some("esp32s3"));
    }
}
