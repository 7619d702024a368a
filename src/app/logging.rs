//! Usage: Tracing subscriber setup for the `ims-oauth` binary.

use tracing_subscriber::EnvFilter;

/// Filter directives are read from this variable (same syntax as `RUST_LOG`).
pub const LOG_ENV_VAR: &str = "IMS_OAUTH_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

/// Installs a stderr `fmt` subscriber. Stdout stays reserved for the credential output.
///
/// `verbose` raises the default to `debug` when `IMS_OAUTH_LOG` is unset. Calling this twice
/// is harmless; the second subscriber is ignored.
pub fn init(verbose: bool) {
    let filter = build_filter(std::env::var(LOG_ENV_VAR).ok().as_deref(), verbose);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_filter(configured: Option<&str>, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { DEFAULT_DIRECTIVE };
    match configured.map(str::trim).filter(|v| !v.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|err| {
            eprintln!("ignoring invalid {LOG_ENV_VAR}='{directives}': {err}");
            EnvFilter::new(fallback)
        }),
        None => EnvFilter::new(fallback),
    }
}
