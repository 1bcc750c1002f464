//! Process-wide entry points with the toolchain's fail-fast contract.
//!
//! These wrap a single [`ToolchainContext`] and turn every error into an
//! abort with a diagnostic on stderr: a compiler invocation cannot continue
//! with an unknown core configuration.

use std::io::{self, Write as _};

use once_cell::sync::OnceCell;
use tracing::error;

use crate::blob::{ProcessLifetime, XtensaConfig};
use crate::config::Settings;
use crate::context::ToolchainContext;
use crate::{diagnostics, Error};

static CONTEXT: OnceCell<ToolchainContext> = OnceCell::new();

/// Installs the context used by the functions in this module.
///
/// Must run before the first lookup; afterwards the context is fixed and the
/// rejected one is handed back.
pub fn install(context: ToolchainContext) -> Result<(), ToolchainContext> {
    let trace_env = context.settings().trace_env.clone();
    CONTEXT.set(context)?;
    diagnostics::install(trace_env);
    Ok(())
}

/// The installed context, or one built from [`Settings::load`] on first use.
pub fn context() -> &'static ToolchainContext {
    CONTEXT.get_or_init(|| {
        let settings = Settings::load().unwrap_or_else(|err| {
            // No trace variable is configured yet; report through the default one.
            diagnostics::install(diagnostics::TRACE_ENV);
            fatal(&err.into())
        });
        diagnostics::install(settings.trace_env.clone());
        ToolchainContext::builder()
            .with_settings(settings)
            .build()
            .unwrap_or_else(|err| fatal(&err))
    })
}

/// The core configuration for this process; aborts if it cannot be resolved.
pub fn get_config() -> &'static XtensaConfig {
    context()
        .cache()
        .get_config()
        .map(ProcessLifetime::get)
        .unwrap_or_else(|err| fatal(&err.into()))
}

/// Resolves `symbol` from the selected variant, or returns `default`.
///
/// # Safety
///
/// Variant libraries must export `symbol` as an immutable `T`.
pub unsafe fn load_config<T: Sync + 'static>(symbol: &str, default: &'static T) -> &'static T {
    context()
        .cache()
        .load_symbol(symbol, default)
        .map(ProcessLifetime::get)
        .unwrap_or_else(|err| fatal(&err.into()))
}

/// Builtin define strings of the selected variant; aborts on failure.
pub fn config_strings() -> Vec<String> {
    context()
        .cache()
        .config_strings()
        .unwrap_or_else(|err| fatal(&err.into()))
}

/// Forces the next [`get_config`] to resolve again.
pub fn reset_config() {
    context().cache().reset();
}

/// Reports `err` as an error event and on stderr, then aborts the process.
///
/// The stderr line is written even when the trace level silences events.
pub fn fatal(err: &Error) -> ! {
    error!("fatal: {err}");
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "xtensa-dynconfig: fatal: {err}");
    let _ = stderr.flush();
    std::process::abort()
}
