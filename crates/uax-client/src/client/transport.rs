// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The client runtime never speaks the wire protocol itself. It drives an
//! [`OpcUaTransport`] (endpoint discovery, session creation, shared resource
//! release) and the [`OpcUaSession`] values it hands out (browse, read,
//! write, subscriptions).
//!
//! ```text
//! SessionManager ──► OpcUaTransport ──open_session──► Arc<dyn OpcUaSession>
//!                          │                                 │
//!                          └── SessionEvent channel ◄────────┘
//!                                                            │
//! SubscriptionManager ◄── DataChangeSink::on_data_change ◄───┘
//! ```
//!
//! The production adapter lives in `real_transport` behind the
//! `real-transport` feature; tests plug in in-memory implementations.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::OpcUaResult;
use crate::types::{
    AttributeId, BrowseDirection, ExpandedNodeId, Identity, LocalizedText, MonitoringMode,
    NodeClass, NodeId, OpcUaDataType, QualifiedName, SecurityMode, StatusCode,
    TimestampsToReturn,
};

// =============================================================================
// Variant
// =============================================================================

/// A wire-typed value as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// No value.
    #[default]
    Empty,
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(DateTime<Utc>),
    /// GUID value.
    Guid(Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// XML element, kept as text.
    XmlElement(String),
    /// Node id value.
    NodeId(NodeId),
    /// Qualified name value.
    QualifiedName(QualifiedName),
    /// Localized text value.
    LocalizedText(LocalizedText),
    /// Status code value.
    StatusCode(StatusCode),
    /// Structured value the client does not decode.
    ExtensionObject {
        /// Encoding or data type id of the body.
        type_id: NodeId,
    },
    /// Array of values.
    Array(Vec<Variant>),
}

impl Variant {
    /// Returns the builtin data type for scalar values.
    pub fn data_type(&self) -> Option<OpcUaDataType> {
        Some(match self {
            Self::Boolean(_) => OpcUaDataType::Boolean,
            Self::SByte(_) => OpcUaDataType::SByte,
            Self::Byte(_) => OpcUaDataType::Byte,
            Self::Int16(_) => OpcUaDataType::Int16,
            Self::UInt16(_) => OpcUaDataType::UInt16,
            Self::Int32(_) => OpcUaDataType::Int32,
            Self::UInt32(_) => OpcUaDataType::UInt32,
            Self::Int64(_) => OpcUaDataType::Int64,
            Self::UInt64(_) => OpcUaDataType::UInt64,
            Self::Float(_) => OpcUaDataType::Float,
            Self::Double(_) => OpcUaDataType::Double,
            Self::String(_) => OpcUaDataType::String,
            Self::DateTime(_) => OpcUaDataType::DateTime,
            Self::Guid(_) => OpcUaDataType::Guid,
            Self::ByteString(_) => OpcUaDataType::ByteString,
            Self::XmlElement(_) => OpcUaDataType::XmlElement,
            _ => return None,
        })
    }

    /// Returns `true` if this is an empty value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to get an integer value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SByte(v) => Some(*v as i64),
            Self::Byte(v) => Some(*v as i64),
            Self::Int16(v) => Some(*v as i64),
            Self::UInt16(v) => Some(*v as i64),
            Self::Int32(v) => Some(*v as i64),
            Self::UInt32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Attempts to get a numeric value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Returns the node id, if this holds one.
    pub fn as_node_id(&self) -> Option<&NodeId> {
        match self {
            Self::NodeId(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the localized or plain text, if this holds one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::XmlElement(v) => Some(v),
            Self::LocalizedText(v) => Some(&v.text),
            _ => None,
        }
    }

    /// Returns the timestamp, if this holds one.
    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) | Self::XmlElement(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{}", v),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::NodeId(v) => write!(f, "{}", v),
            Self::QualifiedName(v) => write!(f, "{}", v),
            Self::LocalizedText(v) => write!(f, "{}", v),
            Self::StatusCode(v) => write!(f, "{}", v),
            Self::ExtensionObject { type_id } => write!(f, "ExtensionObject({})", type_id),
            Self::Array(v) => write!(f, "[{} items]", v.len()),
        }
    }
}

// =============================================================================
// AttributeValue
// =============================================================================

/// Read-only snapshot of one attribute as returned by the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeValue {
    /// The value.
    pub value: Variant,

    /// Data type id, when known.
    pub data_type: Option<NodeId>,

    /// Status of the read or notification.
    pub status: StatusCode,

    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Source timestamp sub-millisecond precision (10 ps units).
    pub source_picoseconds: Option<u16>,

    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,

    /// Server timestamp sub-millisecond precision (10 ps units).
    pub server_picoseconds: Option<u16>,
}

impl AttributeValue {
    /// Creates a good value stamped by the server now.
    pub fn good(value: Variant) -> Self {
        Self {
            value,
            status: StatusCode::GOOD,
            server_timestamp: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Creates a valueless result carrying `status`.
    pub fn bad(status: StatusCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Sets the data type.
    pub fn with_data_type(mut self, data_type: NodeId) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Returns `true` if the status is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// Identity of the server application behind an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplicationDescription {
    /// Application URI.
    pub application_uri: String,
    /// Product URI.
    pub product_uri: String,
    /// Human-readable application name.
    pub application_name: String,
}

/// A connectable server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// Endpoint URL.
    pub endpoint_url: String,

    /// Message security mode.
    pub security_mode: SecurityMode,

    /// Security policy URI.
    pub security_policy_uri: String,

    /// Relative security level; higher is more secure.
    pub security_level: u8,

    /// Server application.
    pub server: ApplicationDescription,

    /// DER-encoded server certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_certificate: Option<Vec<u8>>,
}

impl EndpointDescription {
    /// Creates an endpoint with an empty server description.
    pub fn new(
        endpoint_url: impl Into<String>,
        security_mode: SecurityMode,
        security_policy_uri: impl Into<String>,
        security_level: u8,
    ) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            security_mode,
            security_policy_uri: security_policy_uri.into(),
            security_level,
            server: ApplicationDescription::default(),
            server_certificate: None,
        }
    }
}

impl fmt::Display for EndpointDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let policy = self
            .security_policy_uri
            .rsplit('#')
            .next()
            .unwrap_or(&self.security_policy_uri);
        write!(
            f,
            "{} [{} / {}, level {}]",
            self.endpoint_url, self.security_mode, policy, self.security_level
        )
    }
}

// =============================================================================
// Session configuration and events
// =============================================================================

/// Everything the transport needs to open one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The endpoint to connect to, URL already normalized.
    pub endpoint: EndpointDescription,
    /// User identity.
    pub identity: Identity,
    /// Client application name.
    pub application_name: String,
    /// Client application URI.
    pub application_uri: String,
    /// Client product URI.
    pub product_uri: String,
    /// Bound on each request.
    pub request_timeout: Duration,
    /// Requested session timeout.
    pub session_timeout: Duration,
    /// PKI directory.
    pub pki_dir: String,
    /// Accept server certificates without validation.
    pub trust_server_certs: bool,
}

/// Activity reported by a live session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session became active.
    Active,
    /// The session became inactive (keep-alive lost, channel closed).
    Inactive {
        /// Why, when known.
        cause: Option<String>,
    },
    /// A service call faulted.
    Fault {
        /// The fault status.
        status: StatusCode,
    },
}

// =============================================================================
// Browse / Read / Write payloads
// =============================================================================

/// Parameters of one browse request.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseDescription {
    /// Node to browse from.
    pub node_id: NodeId,
    /// Reference direction.
    pub direction: BrowseDirection,
    /// Reference type filter.
    pub reference_type_id: NodeId,
    /// Include subtypes of the reference type.
    pub include_subtypes: bool,
    /// Node class bit mask (0 = all).
    pub node_class_mask: u32,
    /// Result field mask.
    pub result_mask: u32,
}

/// One reference returned by a browse.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    /// Reference type.
    pub reference_type_id: NodeId,
    /// Forward reference.
    pub is_forward: bool,
    /// Target node.
    pub node_id: ExpandedNodeId,
    /// Target browse name.
    pub browse_name: QualifiedName,
    /// Target display name.
    pub display_name: LocalizedText,
    /// Target node class.
    pub node_class: NodeClass,
    /// Target type definition.
    pub type_definition: ExpandedNodeId,
}

/// Result of browsing one node, continuation points already followed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseResult {
    /// Operation status.
    pub status: StatusCode,
    /// References found.
    pub references: Vec<ReferenceDescription>,
}

/// Attribute to read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadValueId {
    /// Node to read.
    pub node_id: NodeId,
    /// Attribute to read.
    pub attribute_id: AttributeId,
}

impl ReadValueId {
    /// Creates a read request.
    pub fn new(node_id: NodeId, attribute_id: AttributeId) -> Self {
        Self {
            node_id,
            attribute_id,
        }
    }
}

/// Attribute to write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteValue {
    /// Node to write.
    pub node_id: NodeId,
    /// Attribute to write.
    pub attribute_id: AttributeId,
    /// New value, already in the node's wire type.
    pub value: Variant,
}

// =============================================================================
// Subscription payloads
// =============================================================================

/// Requested subscription parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionParameters {
    /// Publishing interval.
    pub publishing_interval: Duration,
    /// Lifetime count.
    pub lifetime_count: u32,
    /// Keep-alive count.
    pub keepalive_count: u32,
    /// Max notifications per publish (0 = unlimited).
    pub max_notifications_per_publish: u32,
    /// Priority.
    pub priority: u8,
    /// Publishing enabled.
    pub publishing_enabled: bool,
}

/// Server-revised subscription parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevisedSubscription {
    /// Server-assigned id.
    pub subscription_id: u32,
    /// Revised publishing interval.
    pub publishing_interval: Duration,
    /// Revised lifetime count.
    pub lifetime_count: u32,
    /// Revised keep-alive count.
    pub keepalive_count: u32,
}

/// One monitored item to create.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemRequest {
    /// Node to monitor.
    pub node_id: NodeId,
    /// Attribute to monitor.
    pub attribute_id: AttributeId,
    /// Session-unique client handle.
    pub client_handle: u32,
    /// Sampling interval.
    pub sampling_interval: Duration,
    /// Server queue size.
    pub queue_size: u32,
    /// Discard oldest on overflow.
    pub discard_oldest: bool,
    /// Monitoring mode.
    pub monitoring_mode: MonitoringMode,
}

/// Per-item outcome of monitored item creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitoredItemResult {
    /// Item status.
    pub status: StatusCode,
    /// Server-assigned item id.
    pub monitored_item_id: u32,
    /// Revised sampling interval.
    pub sampling_interval: Duration,
    /// Revised queue size.
    pub queue_size: u32,
}

/// Receives data change notifications for a subscription.
///
/// Called on the transport's dispatch context; notifications for one client
/// handle arrive in server order.
pub trait DataChangeSink: Send + Sync {
    /// Delivers a new value for `client_handle`.
    fn on_data_change(&self, client_handle: u32, value: AttributeValue);
}

// =============================================================================
// OpcUaTransport
// =============================================================================

/// Entry point into the underlying protocol library.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the session manager shares one
/// transport across tasks.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    /// Discovers the endpoints offered at `url`.
    async fn get_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>>;

    /// Creates and activates a session.
    ///
    /// Activity changes of the new session are pushed into `events` until
    /// the session closes.
    async fn open_session(
        &self,
        config: &SessionConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> OpcUaResult<Arc<dyn OpcUaSession>>;

    /// Releases shared resources (thread pools, sockets).
    async fn release(&self, timeout: Duration) -> OpcUaResult<()>;

    /// Returns the transport display name for logging.
    fn display_name(&self) -> String;
}

// =============================================================================
// OpcUaSession
// =============================================================================

/// One open session.
#[async_trait]
pub trait OpcUaSession: Send + Sync {
    /// Identifier of this session for logging.
    fn session_id(&self) -> String;

    /// Closes the session.
    async fn close(&self) -> OpcUaResult<()>;

    /// Browses each description.
    async fn browse(&self, nodes: &[BrowseDescription]) -> OpcUaResult<Vec<BrowseResult>>;

    /// Reads attributes. The result may be shorter than the request.
    async fn read(&self, nodes: &[ReadValueId]) -> OpcUaResult<Vec<AttributeValue>>;

    /// Writes attributes, returning one status per value.
    async fn write(&self, values: &[WriteValue]) -> OpcUaResult<Vec<StatusCode>>;

    /// Creates a subscription delivering notifications into `sink`.
    async fn create_subscription(
        &self,
        params: &SubscriptionParameters,
        sink: Arc<dyn DataChangeSink>,
    ) -> OpcUaResult<RevisedSubscription>;

    /// Modifies a subscription.
    async fn modify_subscription(
        &self,
        subscription_id: u32,
        params: &SubscriptionParameters,
    ) -> OpcUaResult<RevisedSubscription>;

    /// Deletes a subscription and its items.
    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()>;

    /// Creates monitored items, returning one result per request.
    async fn create_monitored_items(
        &self,
        subscription_id: u32,
        timestamps: TimestampsToReturn,
        items: &[MonitoredItemRequest],
    ) -> OpcUaResult<Vec<MonitoredItemResult>>;

    /// Deletes monitored items by server id.
    async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> OpcUaResult<Vec<StatusCode>>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_accessors() {
        assert_eq!(Variant::Boolean(true).as_bool(), Some(true));
        assert_eq!(Variant::Int32(42).as_i64(), Some(42));
        assert_eq!(Variant::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Variant::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Variant::Int16(-3).as_f64(), Some(-3.0));
        assert_eq!(
            Variant::LocalizedText(LocalizedText::new("Pump")).as_text(),
            Some("Pump")
        );
        assert!(Variant::Empty.is_empty());
    }

    #[test]
    fn test_variant_data_type() {
        assert_eq!(Variant::Double(1.0).data_type(), Some(OpcUaDataType::Double));
        assert_eq!(
            Variant::XmlElement("<a/>".into()).data_type(),
            Some(OpcUaDataType::XmlElement)
        );
        assert_eq!(Variant::NodeId(NodeId::ROOT_FOLDER).data_type(), None);
        assert_eq!(Variant::Array(vec![]).data_type(), None);
    }

    #[test]
    fn test_attribute_value_constructors() {
        let good = AttributeValue::good(Variant::Int32(7)).with_data_type(NodeId::numeric(0, 6));
        assert!(good.is_good());
        assert!(good.server_timestamp.is_some());
        assert_eq!(good.data_type, Some(NodeId::numeric(0, 6)));

        let bad = AttributeValue::bad(StatusCode::BAD_NOT_READABLE);
        assert!(!bad.is_good());
        assert!(bad.value.is_empty());
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = EndpointDescription::new(
            "opc.tcp://host:4840",
            SecurityMode::Sign,
            "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            3,
        );
        assert_eq!(
            endpoint.to_string(),
            "opc.tcp://host:4840 [Sign / Basic256Sha256, level 3]"
        );
    }
}
