// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the `uax` binary.

use thiserror::Error;
use uax_client::OpcUaError;

/// Result type alias for uax-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the `uax` binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid command-line input.
    #[error("Invalid argument: {0}")]
    Usage(String),

    /// Initialization error.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Client runtime error.
    #[error(transparent)]
    Client(#[from] OpcUaError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Usage(_) => 2,
            Self::Initialization(_) => 3,
            Self::Runtime(_) => 4,
            Self::Io(_) => 5,
            Self::Client(e) if e.is_not_connected() => 6,
            Self::Client(OpcUaError::Connection(_)) | Self::Client(OpcUaError::Timeout(_)) => 7,
            Self::Client(_) => 8,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        Self::Runtime(format!("{:#}", err))
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain and, for client errors, recovery
/// hints.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    if let Some(client) = client_error(error) {
        for hint in client.recovery_hints() {
            eprintln!("  Hint: {}", hint);
        }
    }
}

fn client_error(error: &BinError) -> Option<&OpcUaError> {
    match error {
        BinError::Client(e) => Some(e),
        BinError::WithContext { source, .. } => client_error(source),
        _ => None,
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BinError::config("test error");
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_error_with_context() {
        let err = BinError::usage("bad node id").with_context("read");
        assert_eq!(err.to_string(), "read: Invalid argument: bad node id");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_client_exit_codes() {
        assert_eq!(BinError::from(OpcUaError::not_connected()).exit_code(), 6);
        assert_eq!(BinError::from(OpcUaError::no_endpoint("empty")).exit_code(), 7);
        assert_eq!(BinError::from(OpcUaError::read_failed("i=1", "bad")).exit_code(), 8);
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: BinError = anyhow::anyhow!("inner").context("outer").into();
        assert_eq!(err.to_string(), "Runtime error: outer: inner");
        assert_eq!(err.exit_code(), 4);
    }
}
