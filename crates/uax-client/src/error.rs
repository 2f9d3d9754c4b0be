// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the OPC UA client runtime.
//!
//! Every public async operation resolves to either a value or one of these
//! typed errors. Failures are never retried by this crate; `is_retryable`
//! is advisory for the calling application.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint discovery, transport, not-connected
//! ├── Session       - Session open/close failures
//! ├── Browse        - Browse failures and tree invariant violations
//! ├── Operation     - Attribute read/write failures
//! ├── Subscription  - Subscription and monitored item errors
//! ├── Conversion    - Value codec failures
//! ├── Configuration - Invalid settings and identifiers
//! └── Timeout       - Bounded operations that ran out of time
//! ```
//!
//! # Examples
//!
//! ```
//! use uax_client::error::OpcUaError;
//!
//! let error = OpcUaError::not_connected();
//! assert_eq!(error.category(), "connection");
//! assert_eq!(error.error_code().to_string(), "UA-0108");
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

use crate::types::StatusCode;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for OPC UA client operations.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Browse errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Read/write operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Subscription and monitoring errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Data conversion errors.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Timeout errors.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a session error.
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Creates a browse error.
    #[inline]
    pub fn browse(error: BrowseError) -> Self {
        Self::Browse(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(error: SubscriptionError) -> Self {
        Self::Subscription(error)
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion(error: ConversionError) -> Self {
        Self::Conversion(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(error: TimeoutError) -> Self {
        Self::Timeout(error)
    }

    // =========================================================================
    // Convenience Factory Methods
    // =========================================================================

    /// Creates a network error for the given endpoint.
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::network(endpoint, message))
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a no endpoint error.
    pub fn no_endpoint(reason: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::no_suitable_endpoint(reason))
    }

    /// Creates a session creation failed error.
    pub fn session_failed(message: impl Into<String>) -> Self {
        Self::Session(SessionError::creation_failed(message))
    }

    /// Creates a browse failed error.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Browse(BrowseError::browse_failed(node_id, message))
    }

    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::read_failed(node_id, message))
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::write_failed(node_id, message))
    }

    /// Creates an already monitored error.
    pub fn already_monitored(node_id: impl Into<String>) -> Self {
        Self::Subscription(SubscriptionError::already_monitored(node_id))
    }

    /// Creates a request timeout error.
    pub fn request_timeout(duration: Duration) -> Self {
        Self::Timeout(TimeoutError::request(duration))
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        Self::Conversion(ConversionError::type_mismatch(expected, actual))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if this error is a "not connected" condition.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::Connection(ConnectionError::NotConnected))
    }

    /// Returns `true` if the caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Session(e) => e.is_retryable(),
            Self::Browse(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Subscription(e) => e.is_retryable(),
            Self::Timeout(_) => true,
            Self::Conversion(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Session(_) => ErrorSeverity::Error,
            Self::Browse(e) => e.severity(),
            Self::Operation(_) => ErrorSeverity::Error,
            Self::Subscription(e) => e.severity(),
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Conversion(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Browse(_) => "browse",
            Self::Operation(_) => "operation",
            Self::Subscription(_) => "subscription",
            Self::Timeout(_) => "timeout",
            Self::Conversion(_) => "conversion",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns the stable error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Session(e) => e.error_code(),
            Self::Browse(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Subscription(e) => e.error_code(),
            Self::Conversion(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
            Self::Timeout(e) => e.error_code(),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Connection(e) => e.recovery_hints(),
            Self::Session(_) => vec![
                "Check the identity token accepted by the endpoint",
                "Reconnect to create a fresh session",
            ],
            Self::Browse(e) => e.recovery_hints(),
            Self::Operation(e) => e.recovery_hints(),
            Self::Subscription(e) => e.recovery_hints(),
            Self::Timeout(_) => vec![
                "Check network latency to the server",
                "Increase request_timeout in the client configuration",
            ],
            Self::Conversion(_) => vec!["Check the value matches the node's data type"],
            Self::Configuration(e) => e.recovery_hints(),
        }
    }

    /// Returns a short message suitable for a status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(e) => e.user_message(),
            Self::Session(_) => "Could not open or close the session".to_string(),
            Self::Browse(e) => e.user_message(),
            Self::Operation(e) => e.user_message(),
            Self::Subscription(e) => e.user_message(),
            Self::Conversion(_) => "The value does not fit the node's data type".to_string(),
            Self::Configuration(_) => "The client configuration is invalid".to_string(),
            Self::Timeout(e) => format!("The server did not answer within {:?}", e.duration()),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let level = self.tracing_level();
        let code = self.error_code();

        match level {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The server rejected the connection.
    #[error("Connection refused by '{endpoint}'")]
    Refused {
        /// Target endpoint.
        endpoint: String,
    },

    /// Connection timed out.
    #[error("Connection timed out to '{endpoint}' after {duration:?}")]
    TimedOut {
        /// Target endpoint.
        endpoint: String,
        /// Timeout duration.
        duration: Duration,
    },

    /// Server unreachable or returned a malformed response.
    #[error("Network error on '{endpoint}': {message}")]
    Network {
        /// Target endpoint.
        endpoint: String,
        /// Error message.
        message: String,
    },

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// No endpoint to connect to.
    #[error("No suitable endpoint found: {reason}")]
    NoSuitableEndpoint {
        /// Why no endpoint qualified.
        reason: String,
    },

    /// Connection closed by the server.
    #[error("Connection closed unexpectedly")]
    Closed {
        /// Reason for closure.
        reason: Option<String>,
    },

    /// No active session.
    #[error("Not connected to OPC UA server")]
    NotConnected,
}

impl ConnectionError {
    /// Creates a connection refused error.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a connection timed out error.
    pub fn timed_out(endpoint: impl Into<String>, duration: Duration) -> Self {
        Self::TimedOut {
            endpoint: endpoint.into(),
            duration,
        }
    }

    /// Creates a network error.
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(reason: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            reason: reason.into(),
        }
    }

    /// Creates a connection closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Refused { .. }
            | Self::TimedOut { .. }
            | Self::Network { .. }
            | Self::Closed { .. }
            | Self::NotConnected => true,
            Self::InvalidEndpoint { .. } | Self::NoSuitableEndpoint { .. } => false,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::TimedOut { .. } | Self::Closed { .. } => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::Refused { .. } => 1,
            Self::TimedOut { .. } => 2,
            Self::Network { .. } => 3,
            Self::InvalidEndpoint { .. } => 4,
            Self::NoSuitableEndpoint { .. } => 5,
            Self::Closed { .. } => 7,
            Self::NotConnected => 8,
        };
        ErrorCode::new(ErrorCode::CONNECTION, code)
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Refused { .. } => vec![
                "Check that the endpoint accepts this client's application certificate",
                "Check the server's session and connection limits",
            ],
            Self::TimedOut { .. } => vec![
                "Check network connectivity to the server",
                "Increase the connection timeout setting",
            ],
            Self::Network { .. } => vec![
                "Check if the OPC UA server is running",
                "Check network connectivity to the server",
                "Verify the server speaks opc.tcp on this port",
            ],
            Self::InvalidEndpoint { .. } => vec![
                "Use format: opc.tcp://hostname:port/path",
                "Verify the hostname and port are correct",
            ],
            Self::NoSuitableEndpoint { .. } => vec![
                "List the server endpoints with `uax -u <url> endpoints`",
                "Relax the endpoint policy in the client configuration",
            ],
            Self::Closed { .. } => vec![
                "Check server logs for disconnect reason",
                "Reconnect to the server",
            ],
            Self::NotConnected => vec!["Call connect() before performing operations"],
        }
    }

    /// Returns a short message suitable for a status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::Refused { endpoint } => format!("{} refused the connection", endpoint),
            Self::TimedOut { endpoint, .. } => format!("{} did not answer in time", endpoint),
            Self::Network { endpoint, .. } => format!("Cannot reach {}", endpoint),
            Self::InvalidEndpoint { url, .. } => format!("{} is not a valid endpoint URL", url),
            Self::NoSuitableEndpoint { .. } => {
                "No endpoint matches the security policy".to_string()
            }
            Self::Closed { .. } => "The server closed the connection".to_string(),
            Self::NotConnected => "Not connected".to_string(),
        }
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session creation or activation failed.
    #[error("Failed to create session: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

    /// Closing the session failed.
    #[error("Failed to close session: {message}")]
    CloseFailed {
        /// Error message.
        message: String,
    },
}

impl SessionError {
    /// Creates a session creation failed error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a close failed error.
    pub fn close_failed(message: impl Into<String>) -> Self {
        Self::CloseFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CreationFailed { .. })
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::CreationFailed { .. } => 1,
            Self::CloseFailed { .. } => 2,
        };
        ErrorCode::new(ErrorCode::SESSION, code)
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Browse errors.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Browse failed at the transport or returned a bad status.
    #[error("Browse failed for node '{node_id}': {message}")]
    BrowseFailed {
        /// Node ID being browsed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Node not found in the tree arena.
    #[error("Node not found: {node_id}")]
    NodeNotFound {
        /// The node ID that was not found.
        node_id: String,
    },

    /// Children arrived for a node that already had them.
    #[error("Children of '{node_id}' were already populated")]
    DoubleUpdate {
        /// The node ID.
        node_id: String,
    },
}

impl BrowseError {
    /// Creates a browse failed error.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a node not found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Creates a double update error.
    pub fn double_update(node_id: impl Into<String>) -> Self {
        Self::DoubleUpdate {
            node_id: node_id.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BrowseFailed { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DoubleUpdate { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::BrowseFailed { .. } => vec![
                "Check server connection",
                "Verify browse permissions",
                "Expand the node again to retry",
            ],
            Self::NodeNotFound { .. } => vec!["Rebuild the tree after reconnecting"],
            Self::DoubleUpdate { .. } => vec!["Report this as a bug; the update was ignored"],
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::NodeNotFound { .. } => 1,
            Self::BrowseFailed { .. } => 2,
            Self::DoubleUpdate { .. } => 10,
        };
        ErrorCode::new(ErrorCode::BROWSE, code)
    }

    /// Returns a short message suitable for a status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::BrowseFailed { node_id, .. } => format!("Cannot browse {}", node_id),
            Self::NodeNotFound { node_id } => format!("{} is no longer in the tree", node_id),
            Self::DoubleUpdate { node_id } => format!("Duplicate children for {} ignored", node_id),
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Attribute read/write errors.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Read returned fewer results than requested or a bad status.
    #[error("Read failed for node '{node_id}': {message}")]
    ReadFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
        /// First offending status code, if any.
        status_code: Option<StatusCode>,
    },

    /// Write returned a bad status or no result.
    #[error("Write failed for node '{node_id}': {message}")]
    WriteFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
        /// Offending status code, if any.
        status_code: Option<StatusCode>,
    },
}

impl OperationError {
    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a read failed error carrying a status code.
    pub fn read_status(node_id: impl Into<String>, status: StatusCode) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: status.name().to_string(),
            status_code: Some(status),
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a write failed error carrying a status code.
    pub fn write_status(node_id: impl Into<String>, status: StatusCode) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: status.name().to_string(),
            status_code: Some(status),
        }
    }

    /// Returns the status code carried by this error.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::ReadFailed { status_code, .. } | Self::WriteFailed { status_code, .. } => {
                *status_code
            }
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self.status_code() {
            Some(status) => matches!(
                status.name(),
                "BadTimeout" | "BadResourceUnavailable" | "BadCommunicationError"
            ),
            None => false,
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::ReadFailed { .. } => vec![
                "Check that the attribute exists for this node class",
                "Verify read permissions",
            ],
            Self::WriteFailed { .. } => vec![
                "Verify the AccessLevel attribute includes CurrentWrite",
                "Check the value matches the node's data type",
            ],
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::ReadFailed { .. } => 1,
            Self::WriteFailed { .. } => 2,
        };
        ErrorCode::new(ErrorCode::OPERATION, code)
    }

    /// Returns a short message suitable for a status line.
    pub fn user_message(&self) -> String {
        let (verb, node_id) = match self {
            Self::ReadFailed { node_id, .. } => ("read", node_id),
            Self::WriteFailed { node_id, .. } => ("write", node_id),
        };
        match self.status_code() {
            Some(status) => format!("Cannot {} {} ({})", verb, node_id, status.name()),
            None => format!("Cannot {} {}", verb, node_id),
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitoring errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Subscription creation failed.
    #[error("Failed to create subscription: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

    /// Subscription not found.
    #[error("Subscription not found: {subscription_id}")]
    NotFound {
        /// Subscription ID.
        subscription_id: u32,
    },

    /// Node already monitored by some subscription on this session.
    #[error("Node '{node_id}' is already monitored")]
    AlreadyMonitored {
        /// Node ID.
        node_id: String,
    },

    /// Monitored item creation failed.
    #[error("Failed to create monitored item for node '{node_id}': {message}")]
    MonitoredItemFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Monitored item not found.
    #[error("Monitored item not found: {item_id}")]
    MonitoredItemNotFound {
        /// Monitored item ID.
        item_id: u32,
    },

    /// Deleting a subscription or item failed.
    #[error("Failed to delete from subscription {subscription_id}: {message}")]
    DeleteFailed {
        /// Subscription ID.
        subscription_id: u32,
        /// Error message.
        message: String,
    },
}

impl SubscriptionError {
    /// Creates a subscription creation failed error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a subscription not found error.
    pub fn not_found(subscription_id: u32) -> Self {
        Self::NotFound { subscription_id }
    }

    /// Creates an already monitored error.
    pub fn already_monitored(node_id: impl Into<String>) -> Self {
        Self::AlreadyMonitored {
            node_id: node_id.into(),
        }
    }

    /// Creates a monitored item failed error.
    pub fn monitored_item_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MonitoredItemFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a monitored item not found error.
    pub fn monitored_item_not_found(item_id: u32) -> Self {
        Self::MonitoredItemNotFound { item_id }
    }

    /// Creates a delete failed error.
    pub fn delete_failed(subscription_id: u32, message: impl Into<String>) -> Self {
        Self::DeleteFailed {
            subscription_id,
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CreationFailed { .. }
                | Self::MonitoredItemFailed { .. }
                | Self::DeleteFailed { .. }
        )
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AlreadyMonitored { .. } => ErrorSeverity::Info,
            Self::NotFound { .. } | Self::MonitoredItemNotFound { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::AlreadyMonitored { .. } => vec!["Unsubscribe the existing item first"],
            Self::NotFound { .. } | Self::MonitoredItemNotFound { .. } => {
                vec!["The subscription may have been removed or the session replaced"]
            }
            _ => vec![
                "Check the server's subscription limits",
                "Verify the node supports the Value attribute",
            ],
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::CreationFailed { .. } => 1,
            Self::NotFound { .. } => 2,
            Self::MonitoredItemFailed { .. } => 4,
            Self::MonitoredItemNotFound { .. } => 5,
            Self::AlreadyMonitored { .. } => 11,
            Self::DeleteFailed { .. } => 12,
        };
        ErrorCode::new(ErrorCode::SUBSCRIPTION, code)
    }

    /// Returns a short message suitable for a status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::AlreadyMonitored { node_id } => format!("{} is already monitored", node_id),
            Self::MonitoredItemFailed { node_id, .. } => format!("Cannot monitor {}", node_id),
            Self::NotFound { subscription_id } => {
                format!("Subscription {} no longer exists", subscription_id)
            }
            _ => "Subscription request failed".to_string(),
        }
    }
}

// =============================================================================
// ConversionError
// =============================================================================

/// Value codec errors.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Type mismatch.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type.
        expected: String,
        /// Actual type.
        actual: String,
    },

    /// Invalid value text for the target type.
    #[error("Invalid value for type '{target_type}': {message}")]
    InvalidValue {
        /// Target type.
        target_type: String,
        /// Error message.
        message: String,
    },

    /// Unsupported type.
    #[error("Unsupported type: {type_name}")]
    UnsupportedType {
        /// Type name.
        type_name: String,
    },
}

impl ConversionError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(target_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            target_type: target_type.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::TypeMismatch { .. } => 1,
            Self::InvalidValue { .. } => 3,
            Self::UnsupportedType { .. } => 11,
        };
        ErrorCode::new(ErrorCode::CONVERSION, code)
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Invalid node ID format.
    #[error("Invalid node ID format: {node_id} ({reason})")]
    InvalidNodeId {
        /// The invalid node ID.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// Invalid timeout value.
    #[error("Invalid timeout: {duration:?} ({reason})")]
    InvalidTimeout {
        /// The invalid duration.
        duration: Duration,
        /// Reason.
        reason: String,
    },

    /// Missing required field.
    #[error("Missing required configuration: {field}")]
    MissingField {
        /// The missing field.
        field: String,
    },

    /// Field value out of range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The field.
        field: String,
        /// Reason.
        reason: String,
    },

    /// Invalid security mode.
    #[error("Invalid security mode: {mode}")]
    InvalidSecurityMode {
        /// The invalid mode.
        mode: String,
    },

    /// Invalid security policy.
    #[error("Invalid security policy: {policy}")]
    InvalidSecurityPolicy {
        /// The invalid policy.
        policy: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid node ID error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid timeout error.
    pub fn invalid_timeout(duration: Duration, reason: impl Into<String>) -> Self {
        Self::InvalidTimeout {
            duration,
            reason: reason.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid security mode error.
    pub fn invalid_security_mode(mode: impl Into<String>) -> Self {
        Self::InvalidSecurityMode { mode: mode.into() }
    }

    /// Creates an invalid security policy error.
    pub fn invalid_security_policy(policy: impl Into<String>) -> Self {
        Self::InvalidSecurityPolicy {
            policy: policy.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::InvalidNodeId { .. } => 2,
            Self::InvalidTimeout { .. } => 4,
            Self::MissingField { .. } => 5,
            Self::InvalidValue { .. } => 6,
            Self::InvalidSecurityMode { .. } => 10,
            Self::InvalidSecurityPolicy { .. } => 11,
        };
        ErrorCode::new(ErrorCode::CONFIGURATION, code)
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidNodeId { .. } => vec![
                "Node ID format: ns=<namespace>;i=<numeric> or ns=<namespace>;s=<string>",
                "Example: ns=2;s=MyNode or i=85",
            ],
            Self::InvalidTimeout { .. } => vec!["Timeouts must be greater than zero"],
            Self::MissingField { .. } | Self::InvalidValue { .. } => {
                vec!["Check the configuration file against the documented defaults"]
            }
            Self::InvalidSecurityMode { .. } => vec!["Valid modes: None, Sign, SignAndEncrypt"],
            Self::InvalidSecurityPolicy { .. } => vec![
                "Valid policies: None, Basic128Rsa15, Basic256, Basic256Sha256",
                "Also valid: Aes128Sha256RsaOaep, Aes256Sha256RsaPss",
            ],
        }
    }
}

// =============================================================================
// TimeoutError
// =============================================================================

/// Timeout errors.
#[derive(Debug, Error)]
pub enum TimeoutError {
    /// Connection timeout.
    #[error("Connection timed out after {duration:?}")]
    Connection {
        /// Timeout duration.
        duration: Duration,
    },

    /// Request timeout.
    #[error("Request timed out after {duration:?}")]
    Request {
        /// Timeout duration.
        duration: Duration,
    },

    /// Shutdown did not complete in time.
    #[error("Shutdown timed out after {duration:?}")]
    Shutdown {
        /// Timeout duration.
        duration: Duration,
    },
}

impl TimeoutError {
    /// Creates a connection timeout.
    pub fn connection(duration: Duration) -> Self {
        Self::Connection { duration }
    }

    /// Creates a request timeout.
    pub fn request(duration: Duration) -> Self {
        Self::Request { duration }
    }

    /// Creates a shutdown timeout.
    pub fn shutdown(duration: Duration) -> Self {
        Self::Shutdown { duration }
    }

    /// Returns the timeout duration.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Connection { duration }
            | Self::Request { duration }
            | Self::Shutdown { duration } => *duration,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::Connection { .. } => 1,
            Self::Request { .. } => 6,
            Self::Shutdown { .. } => 7,
        };
        ErrorCode::new(ErrorCode::TIMEOUT, code)
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Stable error code rendered as `UA-XXYY`: category `XX`, error `YY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category.
    pub category: u8,
    /// Error within the category.
    pub code: u8,
}

impl ErrorCode {
    /// Connection category.
    pub const CONNECTION: u8 = 1;
    /// Session category.
    pub const SESSION: u8 = 2;
    /// Browse category.
    pub const BROWSE: u8 = 4;
    /// Operation category.
    pub const OPERATION: u8 = 5;
    /// Subscription category.
    pub const SUBSCRIPTION: u8 = 6;
    /// Conversion category.
    pub const CONVERSION: u8 = 7;
    /// Configuration category.
    pub const CONFIGURATION: u8 = 8;
    /// Timeout category.
    pub const TIMEOUT: u8 = 9;

    /// Creates an error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with OpcUaError.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_retryable() {
        assert!(ConnectionError::network("opc.tcp://localhost:4840", "reset").is_retryable());
        assert!(ConnectionError::NotConnected.is_retryable());
        assert!(!ConnectionError::no_suitable_endpoint("empty list").is_retryable());
        assert!(!ConnectionError::invalid_endpoint("bad-url", "invalid format").is_retryable());
    }

    #[test]
    fn test_not_connected_helper() {
        let error = OpcUaError::not_connected();
        assert!(error.is_not_connected());
        assert!(!OpcUaError::no_endpoint("none").is_not_connected());
    }

    #[test]
    fn test_read_status_carries_first_status() {
        let status = StatusCode::new(0x803A_0000);
        let error = OperationError::read_status("ns=2;i=5", status);
        assert_eq!(error.status_code(), Some(status));
        assert!(error.to_string().contains("BadNotReadable"));
    }

    #[test]
    fn test_already_monitored() {
        let error = OpcUaError::already_monitored("ns=2;s=Temp");
        assert_eq!(error.category(), "subscription");
        assert_eq!(error.severity(), ErrorSeverity::Info);
        assert!(error.to_string().contains("ns=2;s=Temp"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OpcUaError::not_connected().error_code().to_string(), "UA-0108");
        assert_eq!(
            OpcUaError::already_monitored("ns=2;s=Temp").error_code().to_string(),
            "UA-060B"
        );
        assert_eq!(
            OpcUaError::request_timeout(Duration::from_secs(5)).error_code(),
            ErrorCode::new(ErrorCode::TIMEOUT, 6)
        );
    }

    #[test]
    fn test_user_messages() {
        let error =
            OpcUaError::connection(ConnectionError::refused("opc.tcp://192.168.1.100:4840"));
        assert!(error.user_message().contains("192.168.1.100"));

        let error = OpcUaError::operation(OperationError::write_status(
            "ns=2;s=Setpoint",
            StatusCode::BAD_NOT_WRITABLE,
        ));
        assert_eq!(error.user_message(), "Cannot write ns=2;s=Setpoint (BadNotWritable)");
    }

    #[test]
    fn test_timeout_error() {
        let timeout = TimeoutError::shutdown(Duration::from_millis(500));
        assert_eq!(timeout.duration(), Duration::from_millis(500));

        let error = OpcUaError::timeout(timeout);
        assert!(error.is_retryable());
        assert_eq!(error.tracing_level(), Level::WARN);
    }

    #[test]
    fn test_recovery_hints() {
        let error = ConnectionError::network("opc.tcp://localhost:4840", "BadCommunicationError");
        assert!(error.recovery_hints().iter().any(|h| h.contains("running")));
        assert!(ConnectionError::refused("opc.tcp://localhost:4840").is_retryable());

        let error = ConfigurationError::invalid_node_id("bad;format", "missing identifier");
        assert!(error.recovery_hints().iter().any(|h| h.contains("ns=")));
    }

    #[test]
    fn test_double_update_is_error_severity() {
        let error = OpcUaError::browse(BrowseError::double_update("i=85"));
        assert_eq!(error.severity(), ErrorSeverity::Error);
        assert!(!error.is_retryable());
    }
}
