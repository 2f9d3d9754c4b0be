// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::LogFormat;
use crate::error::{BinError, BinResult};

/// Directives applied on top of the requested level. The protocol library
/// is chatty at `info`.
const QUIET_TARGETS: &[&str] = &["opcua=warn", "tokio=info"];

// =============================================================================
// Logging Initialization
// =============================================================================

/// Builds the filter: `RUST_LOG` if set, otherwise `level`, plus the quiet
/// targets.
pub fn build_filter(level: &str) -> BinResult<EnvFilter> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    for directive in QUIET_TARGETS {
        let directive = directive
            .parse()
            .map_err(|e| BinError::init(format!("invalid log directive '{}': {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Initializes the logging subsystem.
///
/// # Example
///
/// ```ignore
/// use uax_bin::cli::LogFormat;
/// use uax_bin::logging::init_logging;
///
/// init_logging("info", LogFormat::Text)?;
/// ```
pub fn init_logging(level: &str, format: LogFormat) -> BinResult<()> {
    let filter = build_filter(level)?;
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_ansi(is_terminal),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(is_terminal),
            )
            .try_init(),
    };
    result.map_err(|e| BinError::init(format!("logging already initialized: {}", e)))
}

// =============================================================================
// Log Level Parsing
// =============================================================================

/// Parses a log level string into a `Level`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("invalid"), Level::INFO);
    }

    #[test]
    fn test_build_filter_includes_quiet_targets() {
        let filter = build_filter("debug").unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("opcua=warn"));
    }
}
