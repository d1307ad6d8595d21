//! Logging setup for the verso binary.
//!
//! # Environment Variables
//!
//! - `VERSO_DEBUG=true|1|yes` - Enable debug logging
//! - `VERSO_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific log level (default: info)
//! - `VERSO_LOG_FORMAT=pretty|compact|json` - Set output format (default: compact)

use std::env;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `VERSO_DEBUG`.
pub fn is_debug_enabled() -> bool {
    env::var("VERSO_DEBUG")
        .map(|v| parse_debug(&v))
        .unwrap_or(false)
}

fn parse_debug(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Pick the log level from `VERSO_LOG_LEVEL`, falling back to `debug` when
/// debugging is enabled and `info` otherwise.
pub fn resolve_level(level: Option<&str>, debug: bool) -> &'static str {
    if debug {
        return "debug";
    }
    match level.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

/// Pick the output format from `VERSO_LOG_FORMAT`.
pub fn resolve_format(format: Option<&str>) -> &'static str {
    match format.map(str::to_lowercase).as_deref() {
        Some("pretty") => "pretty",
        Some("json") => "json",
        _ => "compact",
    }
}

/// Filter directives for the verso crates at `level`.
pub fn filter_directives(level: &str) -> String {
    ["verso", "verso_core", "verso_mongodb", "verso_cli"]
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize logging. Subsequent calls are no-ops.
///
/// `verbose` has the same effect as `VERSO_DEBUG=1`.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        let level = resolve_level(
            env::var("VERSO_LOG_LEVEL").ok().as_deref(),
            verbose || is_debug_enabled(),
        );
        let format = resolve_format(env::var("VERSO_LOG_FORMAT").ok().as_deref());
        let filter = EnvFilter::try_new(filter_directives(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let registry = tracing_subscriber::registry().with(filter);
        let result = match format {
            "json" => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            "pretty" => registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
            _ => registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init(),
        };

        if result.is_ok() {
            tracing::debug!(level = level, format = format, "Verso logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level(None, false), "info");
        assert_eq!(resolve_level(Some("WARN"), false), "warn");
        assert_eq!(resolve_level(Some("bogus"), false), "info");
        assert_eq!(resolve_level(Some("error"), true), "debug");
    }

    #[test]
    fn test_resolve_format() {
        assert_eq!(resolve_format(None), "compact");
        assert_eq!(resolve_format(Some("json")), "json");
        assert_eq!(resolve_format(Some("Pretty")), "pretty");
    }

    #[test]
    fn test_parse_debug() {
        assert!(parse_debug("1"));
        assert!(parse_debug("YES"));
        assert!(!parse_debug("0"));
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(
            filter_directives("debug"),
            "verso=debug,verso_core=debug,verso_mongodb=debug,verso_cli=debug"
        );
    }
}
