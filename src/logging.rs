//! Logging setup for the plugin process.
//!
//! All logs go to **stderr**; stdout is reserved for the handshake line.
//!
//! # Environment Variables
//!
//! The filter is taken from the first of these that is set:
//!
//! - `RUST_LOG`: a full `tracing` filter, e.g. `terraform_provider_ripe_atlas=debug`
//! - `TF_LOG_PROVIDER`: a host log level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`)
//! - `TF_LOG`: the host's global log level, same values (`JSON` means `trace`)
//!
//! Otherwise the level is `info`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "info";

/// Map a host log level name to a `tracing` directive.
fn host_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        "OFF" => Some("off"),
        _ => None,
    }
}

/// Pick the filter directive from the three logging variables.
fn default_directive(
    rust_log: Option<&str>,
    tf_log_provider: Option<&str>,
    tf_log: Option<&str>,
) -> String {
    if let Some(filter) = rust_log.filter(|f| !f.trim().is_empty()) {
        return filter.to_string();
    }
    tf_log_provider
        .and_then(host_level)
        .or_else(|| tf_log.and_then(host_level))
        .unwrap_or(DEFAULT_DIRECTIVE)
        .to_string()
}

fn env_filter() -> EnvFilter {
    let var = |name: &str| std::env::var(name).ok();
    let directive = default_directive(
        var("RUST_LOG").as_deref(),
        var("TF_LOG_PROVIDER").as_deref(),
        var("TF_LOG").as_deref(),
    );
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::registry().with(env_filter()).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the global subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    subscriber().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        assert_eq!(
            default_directive(Some("terraform_provider_ripe_atlas=debug"), Some("ERROR"), None),
            "terraform_provider_ripe_atlas=debug"
        );
    }

    #[test]
    fn test_host_levels() {
        assert_eq!(default_directive(None, Some("DEBUG"), Some("ERROR")), "debug");
        assert_eq!(default_directive(None, None, Some("warn")), "warn");
        assert_eq!(default_directive(None, None, Some("JSON")), "trace");
        assert_eq!(default_directive(None, Some("bogus"), Some("TRACE")), "trace");
    }

    #[test]
    fn test_default_level() {
        assert_eq!(default_directive(None, None, None), "info");
        assert_eq!(default_directive(Some("  "), None, Some("nope")), "info");
    }

    #[test]
    fn test_directives_parse() {
        for level in ["trace", "debug", "info", "warn", "error", "off"] {
            assert!(EnvFilter::try_new(level).is_ok());
        }
    }
}
