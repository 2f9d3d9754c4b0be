// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core OPC UA types shared by every layer of the client runtime.
//!
//! - **NodeId / ExpandedNodeId**: node identifiers with parsing and display
//! - **StatusCode**: wire status codes with severity and symbolic names
//! - **NodeClass / AttributeId**: closed enums over the address-space model
//! - **SecurityMode / SecurityPolicy / Identity**: session security inputs
//! - **ClientConfig**: client configuration with builder and validation
//!
//! # Examples
//!
//! ```
//! use uax_client::types::{ClientConfig, NodeId};
//!
//! let node_id: NodeId = "ns=2;s=Temperature.Value".parse().unwrap();
//! assert_eq!(node_id.namespace_index, 2);
//!
//! let config = ClientConfig::builder()
//!     .request_timeout(std::time::Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.monitored_item.queue_size, 10);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::endpoint::EndpointPolicy;
use crate::error::{ConfigurationError, OpcUaError};

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA Node Identifier.
///
/// A NodeId addresses a node within one server. It consists of a namespace
/// index and a numeric, string, GUID, or opaque identifier.
///
/// # Examples
///
/// ```
/// use uax_client::types::NodeId;
///
/// let numeric = NodeId::numeric(2, 1001);
/// assert_eq!(numeric.to_string(), "ns=2;i=1001");
///
/// let parsed: NodeId = "i=85".parse().unwrap();
/// assert_eq!(parsed, NodeId::OBJECTS_FOLDER);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    // =========================================================================
    // Well-Known Nodes
    // =========================================================================

    /// Root folder node (ns=0, i=84).
    pub const ROOT_FOLDER: NodeId = NodeId::ns0(84);

    /// Objects folder node (ns=0, i=85).
    pub const OBJECTS_FOLDER: NodeId = NodeId::ns0(85);

    /// Types folder node (ns=0, i=86).
    pub const TYPES_FOLDER: NodeId = NodeId::ns0(86);

    /// Views folder node (ns=0, i=87).
    pub const VIEWS_FOLDER: NodeId = NodeId::ns0(87);

    /// `References` reference type (ns=0, i=31).
    pub const REFERENCES: NodeId = NodeId::ns0(31);

    /// `HasEventSource` reference type (ns=0, i=36).
    pub const HAS_EVENT_SOURCE: NodeId = NodeId::ns0(36);

    /// `HasNotifier` reference type (ns=0, i=48).
    pub const HAS_NOTIFIER: NodeId = NodeId::ns0(48);

    /// `BaseDataVariableType` (ns=0, i=63).
    pub const BASE_DATA_VARIABLE_TYPE: NodeId = NodeId::ns0(63);

    /// `PropertyType` (ns=0, i=68).
    pub const PROPERTY_TYPE: NodeId = NodeId::ns0(68);

    /// `DataItemType` (ns=0, i=2365).
    pub const DATA_ITEM_TYPE: NodeId = NodeId::ns0(2365);

    /// `ReferenceDescription` structure type (ns=0, i=518).
    pub const REFERENCE_DESCRIPTION: NodeId = NodeId::ns0(518);

    /// Server node (ns=0, i=2253).
    pub const SERVER: NodeId = NodeId::ns0(2253);

    /// `Server_ServerStatus_CurrentTime` (ns=0, i=2258).
    pub const SERVER_CURRENT_TIME: NodeId = NodeId::ns0(2258);

    /// `Server_ServerStatus_State` (ns=0, i=2259).
    pub const SERVER_STATE: NodeId = NodeId::ns0(2259);

    const fn ns0(value: u32) -> NodeId {
        NodeId {
            namespace_index: 0,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns `true` if this is in the standard namespace (ns=0).
    #[inline]
    pub const fn is_standard(&self) -> bool {
        self.namespace_index == 0
    }

    /// Returns `true` if this is a null node ID (ns=0, i=0).
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Returns the null node ID (ns=0, i=0).
    pub const fn null() -> Self {
        Self::ns0(0)
    }

    /// Returns the numeric value if this is a numeric identifier.
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the numeric value if this is a numeric id in namespace 0.
    pub fn as_ns0_numeric(&self) -> Option<u32> {
        if self.is_standard() {
            self.as_numeric()
        } else {
            None
        }
    }

    /// Converts to the OPC UA string format.
    ///
    /// Namespace 0 omits the `ns=` prefix: `i=85`, `ns=2;s=Tag`.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats: `ns=2;i=1001`, `ns=2;s=MyNode`,
    /// `ns=2;g=<uuid>`, `ns=2;b=<base64>`, and the same without `ns=`
    /// for namespace 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: String| {
            OpcUaError::configuration(ConfigurationError::invalid_node_id(s, reason))
        };

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace".to_string()))?;
                let ns: u16 = ns_str
                    .parse()
                    .map_err(|_| invalid("Invalid namespace index".to_string()))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(
                id.parse()
                    .map_err(|_| invalid("Invalid numeric identifier".to_string()))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(
                Uuid::parse_str(id).map_err(|e| invalid(format!("Invalid GUID: {}", e)))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            NodeIdentifier::Opaque(
                BASE64
                    .decode(id)
                    .map_err(|e| invalid(format!("Invalid base64: {}", e)))?,
            )
        } else {
            return Err(invalid(
                "Unknown identifier type. Expected i=, s=, g=, or b=".to_string(),
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// OPC UA node identifier kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier.
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// ExpandedNodeId
// =============================================================================

/// A node identifier that may point into another server or namespace URI.
///
/// Only local ids (server index 0, no namespace URI) resolve against the
/// connected session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpandedNodeId {
    /// The node id within its namespace.
    pub node_id: NodeId,

    /// Namespace URI overriding the namespace index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_uri: Option<String>,

    /// Index into the server table (0 = this server).
    #[serde(default)]
    pub server_index: u32,
}

impl ExpandedNodeId {
    /// Wraps a local node id.
    pub fn local(node_id: NodeId) -> Self {
        Self {
            node_id,
            namespace_uri: None,
            server_index: 0,
        }
    }

    /// Returns `true` if this id resolves on the connected server.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.server_index == 0 && self.namespace_uri.is_none()
    }

    /// Returns the local node id, or `None` for remote ids.
    pub fn as_local(&self) -> Option<&NodeId> {
        self.is_local().then_some(&self.node_id)
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        Self::local(node_id)
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.server_index != 0 {
            write!(f, "svr={};", self.server_index)?;
        }
        if let Some(uri) = &self.namespace_uri {
            write!(f, "nsu={};{}", uri, self.node_id.identifier)
        } else {
            write!(f, "{}", self.node_id)
        }
    }
}

// =============================================================================
// QualifiedName / LocalizedText
// =============================================================================

/// A name qualified by a namespace index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Namespace index.
    pub namespace_index: u16,
    /// Name.
    pub name: String,
}

impl QualifiedName {
    /// Creates a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.namespace_index, self.name)
        }
    }
}

/// Human-readable text with an optional locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Locale, such as `en`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Text.
    pub text: String,
}

impl LocalizedText {
    /// Creates text without a locale.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            locale: None,
            text: text.into(),
        }
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// OPC UA status code.
///
/// The top two bits carry the severity: `00` good, `01` uncertain, `10` bad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Good.
    pub const GOOD: StatusCode = StatusCode(0);
    /// Generic bad.
    pub const BAD: StatusCode = StatusCode(0x8000_0000);
    /// Generic uncertain.
    pub const UNCERTAIN: StatusCode = StatusCode(0x4000_0000);
    /// BadTimeout.
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);
    /// BadNodeIdUnknown.
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    /// BadAttributeIdInvalid.
    pub const BAD_ATTRIBUTE_ID_INVALID: StatusCode = StatusCode(0x8035_0000);
    /// BadNotReadable.
    pub const BAD_NOT_READABLE: StatusCode = StatusCode(0x803A_0000);
    /// BadNotWritable.
    pub const BAD_NOT_WRITABLE: StatusCode = StatusCode(0x803B_0000);
    /// BadTypeMismatch.
    pub const BAD_TYPE_MISMATCH: StatusCode = StatusCode(0x8074_0000);
    /// BadNotConnected.
    pub const BAD_NOT_CONNECTED: StatusCode = StatusCode(0x808A_0000);
    /// BadConnectionRejected.
    pub const BAD_CONNECTION_REJECTED: StatusCode = StatusCode(0x80AC_0000);

    /// Wraps a raw status code.
    #[inline]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns `true` for good status codes.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` for uncertain status codes.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Returns `true` for bad status codes.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the symbolic name, ignoring the info bits.
    pub fn name(&self) -> &'static str {
        match self.0 & 0xFFFF_0000 {
            0x0000_0000 => "Good",
            0x4000_0000 => "Uncertain",
            0x8000_0000 => "Bad",
            0x8001_0000 => "BadUnexpectedError",
            0x8002_0000 => "BadInternalError",
            0x8003_0000 => "BadOutOfMemory",
            0x8004_0000 => "BadResourceUnavailable",
            0x8005_0000 => "BadCommunicationError",
            0x8006_0000 => "BadEncodingError",
            0x8007_0000 => "BadDecodingError",
            0x800A_0000 => "BadTimeout",
            0x800B_0000 => "BadServiceUnsupported",
            0x800C_0000 => "BadShutdown",
            0x800D_0000 => "BadServerNotConnected",
            0x800E_0000 => "BadServerHalted",
            0x800F_0000 => "BadNothingToDo",
            0x8010_0000 => "BadTooManyOperations",
            0x801F_0000 => "BadUserAccessDenied",
            0x8020_0000 => "BadIdentityTokenInvalid",
            0x8021_0000 => "BadIdentityTokenRejected",
            0x8025_0000 => "BadSessionIdInvalid",
            0x8026_0000 => "BadSessionClosed",
            0x8027_0000 => "BadSessionNotActivated",
            0x8028_0000 => "BadSubscriptionIdInvalid",
            0x8033_0000 => "BadNodeIdInvalid",
            0x8034_0000 => "BadNodeIdUnknown",
            0x8035_0000 => "BadAttributeIdInvalid",
            0x8036_0000 => "BadIndexRangeInvalid",
            0x803A_0000 => "BadNotReadable",
            0x803B_0000 => "BadNotWritable",
            0x803C_0000 => "BadOutOfRange",
            0x803D_0000 => "BadNotSupported",
            0x803E_0000 => "BadNotFound",
            0x8041_0000 => "BadMonitoringModeInvalid",
            0x8042_0000 => "BadMonitoredItemIdInvalid",
            0x804A_0000 => "BadContinuationPointInvalid",
            0x804B_0000 => "BadNoContinuationPoints",
            0x804C_0000 => "BadReferenceTypeIdInvalid",
            0x804D_0000 => "BadBrowseDirectionInvalid",
            0x804E_0000 => "BadNodeNotInView",
            0x8056_0000 => "BadTooManySessions",
            0x8074_0000 => "BadTypeMismatch",
            0x8075_0000 => "BadMethodInvalid",
            0x808A_0000 => "BadNotConnected",
            0x80AB_0000 => "BadInvalidArgument",
            0x80AC_0000 => "BadConnectionRejected",
            0x80AE_0000 => "BadConnectionClosed",
            _ if self.is_good() => "Good",
            _ if self.is_uncertain() => "Uncertain",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.name(), self.0)
    }
}

// =============================================================================
// OpcUaDataType
// =============================================================================

/// Builtin OPC UA data types the value codec understands.
///
/// Ids 1..=16 are the scalar builtins that can be written from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpcUaDataType {
    /// Boolean value.
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit IEEE 754 float.
    Float,
    /// 64-bit IEEE 754 double.
    Double,
    /// UTF-8 string.
    String,
    /// Date and time.
    DateTime,
    /// GUID.
    Guid,
    /// Raw byte string.
    ByteString,
    /// XML element.
    XmlElement,
}

impl OpcUaDataType {
    /// Returns the namespace-0 data type id.
    pub const fn type_id(&self) -> u32 {
        match self {
            Self::Boolean => 1,
            Self::SByte => 2,
            Self::Byte => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float => 10,
            Self::Double => 11,
            Self::String => 12,
            Self::DateTime => 13,
            Self::Guid => 14,
            Self::ByteString => 15,
            Self::XmlElement => 16,
        }
    }

    /// Looks up a builtin type by its namespace-0 id.
    pub fn from_type_id(id: u32) -> Option<Self> {
        Some(match id {
            1 => Self::Boolean,
            2 => Self::SByte,
            3 => Self::Byte,
            4 => Self::Int16,
            5 => Self::UInt16,
            6 => Self::Int32,
            7 => Self::UInt32,
            8 => Self::Int64,
            9 => Self::UInt64,
            10 => Self::Float,
            11 => Self::Double,
            12 => Self::String,
            13 => Self::DateTime,
            14 => Self::Guid,
            15 => Self::ByteString,
            16 => Self::XmlElement,
            _ => return None,
        })
    }

    /// Looks up a builtin type by its data type node id.
    pub fn from_node_id(node_id: &NodeId) -> Option<Self> {
        node_id.as_ns0_numeric().and_then(Self::from_type_id)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::ByteString => "ByteString",
            Self::XmlElement => "XmlElement",
        }
    }
}

impl fmt::Display for OpcUaDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// No security.
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    const TABLE: [(SecurityMode, u32, &'static str); 3] = [
        (SecurityMode::None, 1, "None"),
        (SecurityMode::Sign, 2, "Sign"),
        (SecurityMode::SignAndEncrypt, 3, "SignAndEncrypt"),
    ];

    /// Returns the wire value of `MessageSecurityMode`.
    pub const fn value(&self) -> u32 {
        *self as u32 + 1
    }

    /// Maps a `MessageSecurityMode` wire value; `Invalid` (0) and unknown
    /// values yield `None`.
    pub fn from_value(value: u32) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, v, _)| *v == value)
            .map(|(mode, _, _)| *mode)
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        Self::TABLE[*self as usize].2
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityMode {
    type Err = OpcUaError;

    /// Accepts the display name in any case, with or without `-`/`_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_security_name(s);
        Self::TABLE
            .iter()
            .find(|(_, _, name)| name.to_lowercase() == wanted)
            .map(|(mode, _, _)| *mode)
            .ok_or_else(|| OpcUaError::configuration(ConfigurationError::invalid_security_mode(s)))
    }
}

fn normalize_security_name(s: &str) -> String {
    s.trim().to_lowercase().replace(['-', '_', ' '], "")
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// Prefix shared by every standard security policy URI.
pub const SECURITY_POLICY_URI_PREFIX: &str = "http://opcfoundation.org/UA/SecurityPolicy#";

macro_rules! policy_uri {
    ($fragment:literal) => {
        concat!("http://opcfoundation.org/UA/SecurityPolicy#", $fragment)
    };
}

/// OPC UA security policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security.
    #[default]
    None,
    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,
    /// Basic256 (deprecated).
    Basic256,
    /// Basic256Sha256.
    Basic256Sha256,
    /// Aes128_Sha256_RsaOaep.
    Aes128Sha256RsaOaep,
    /// Aes256_Sha256_RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Every policy, weakest first.
    pub const ALL: [SecurityPolicy; 6] = [
        SecurityPolicy::None,
        SecurityPolicy::Basic128Rsa15,
        SecurityPolicy::Basic256,
        SecurityPolicy::Basic256Sha256,
        SecurityPolicy::Aes128Sha256RsaOaep,
        SecurityPolicy::Aes256Sha256RsaPss,
    ];

    /// Returns the policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => policy_uri!("None"),
            Self::Basic128Rsa15 => policy_uri!("Basic128Rsa15"),
            Self::Basic256 => policy_uri!("Basic256"),
            Self::Basic256Sha256 => policy_uri!("Basic256Sha256"),
            Self::Aes128Sha256RsaOaep => policy_uri!("Aes128_Sha256_RsaOaep"),
            Self::Aes256Sha256RsaPss => policy_uri!("Aes256_Sha256_RsaPss"),
        }
    }

    /// Returns the URI fragment, e.g. `Basic256Sha256`.
    pub fn name(&self) -> &'static str {
        let uri = self.uri();
        &uri[SECURITY_POLICY_URI_PREFIX.len()..]
    }

    /// Matches a policy by the fragment after `#`, so servers that vary the
    /// URI host are still recognized.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (_, fragment) = uri.rsplit_once('#')?;
        Self::ALL.into_iter().find(|p| p.name() == fragment)
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = OpcUaError;

    /// Accepts a policy URI or its name in any case, with or without `-`/`_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(policy) = Self::from_uri(s) {
            return Ok(policy);
        }
        let wanted = normalize_security_name(s);
        Self::ALL
            .into_iter()
            .find(|p| normalize_security_name(p.name()) == wanted)
            .ok_or_else(|| {
                OpcUaError::configuration(ConfigurationError::invalid_security_policy(s))
            })
    }
}

// =============================================================================
// Identity
// =============================================================================

/// How the client authenticates when activating a session.
///
/// Anonymous and credentialed identities are mutually exclusive; the last
/// one set on the builder wins.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Identity {
    /// Anonymous authentication.
    #[default]
    Anonymous,

    /// Username and password authentication.
    UserName {
        /// The username.
        username: String,
        /// The password.
        password: String,
    },

    /// X.509 certificate authentication.
    Certificate {
        /// Path to the certificate file.
        certificate_path: String,
        /// Path to the private key file.
        private_key_path: String,
    },
}

impl Identity {
    /// Creates a username/password identity.
    pub fn user_name(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserName {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns `true` if this is anonymous authentication.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns the type name.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Anonymous => "Anonymous",
            Self::UserName { .. } => "UserName",
            Self::Certificate { .. } => "Certificate",
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::UserName { username, .. } => write!(f, "UserName({})", username),
            Self::Certificate {
                certificate_path, ..
            } => write!(f, "Certificate({})", certificate_path),
        }
    }
}

// =============================================================================
// NodeClass
// =============================================================================

/// OPC UA node class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
    /// Unknown or not reported.
    #[default]
    Unspecified,
}

impl NodeClass {
    /// Every node class, in declaration order.
    pub const ALL: [NodeClass; 9] = [
        Self::Object,
        Self::Variable,
        Self::Method,
        Self::ObjectType,
        Self::VariableType,
        Self::ReferenceType,
        Self::DataType,
        Self::View,
        Self::Unspecified,
    ];

    /// Returns the OPC UA bit mask value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from OPC UA value; unknown values map to `Unspecified`.
    pub fn from_value(value: u32) -> Self {
        match value {
            1 => Self::Object,
            2 => Self::Variable,
            4 => Self::Method,
            8 => Self::ObjectType,
            16 => Self::VariableType,
            32 => Self::ReferenceType,
            64 => Self::DataType,
            128 => Self::View,
            _ => Self::Unspecified,
        }
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Object => "Object",
            Self::Variable => "Variable",
            Self::Method => "Method",
            Self::ObjectType => "ObjectType",
            Self::VariableType => "VariableType",
            Self::ReferenceType => "ReferenceType",
            Self::DataType => "DataType",
            Self::View => "View",
            Self::Unspecified => "Unspecified",
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// AttributeId
// =============================================================================

/// OPC UA attribute IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttributeId {
    /// Node ID attribute.
    NodeId,
    /// Node class attribute.
    NodeClass,
    /// Browse name attribute.
    BrowseName,
    /// Display name attribute.
    DisplayName,
    /// Description attribute.
    Description,
    /// Write mask attribute.
    WriteMask,
    /// User write mask attribute.
    UserWriteMask,
    /// Is abstract attribute.
    IsAbstract,
    /// Symmetric attribute.
    Symmetric,
    /// Inverse name attribute.
    InverseName,
    /// Contains no loops attribute.
    ContainsNoLoops,
    /// Event notifier attribute.
    EventNotifier,
    /// Value attribute.
    #[default]
    Value,
    /// Data type attribute.
    DataType,
    /// Value rank attribute.
    ValueRank,
    /// Array dimensions attribute.
    ArrayDimensions,
    /// Access level attribute.
    AccessLevel,
    /// User access level attribute.
    UserAccessLevel,
    /// Minimum sampling interval attribute.
    MinimumSamplingInterval,
    /// Historizing attribute.
    Historizing,
    /// Executable attribute.
    Executable,
    /// User executable attribute.
    UserExecutable,
}

impl AttributeId {
    /// Returns the OPC UA numeric value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::NodeId => 1,
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::DisplayName => 4,
            Self::Description => 5,
            Self::WriteMask => 6,
            Self::UserWriteMask => 7,
            Self::IsAbstract => 8,
            Self::Symmetric => 9,
            Self::InverseName => 10,
            Self::ContainsNoLoops => 11,
            Self::EventNotifier => 12,
            Self::Value => 13,
            Self::DataType => 14,
            Self::ValueRank => 15,
            Self::ArrayDimensions => 16,
            Self::AccessLevel => 17,
            Self::UserAccessLevel => 18,
            Self::MinimumSamplingInterval => 19,
            Self::Historizing => 20,
            Self::Executable => 21,
            Self::UserExecutable => 22,
        }
    }

    /// Creates from the OPC UA numeric value.
    pub fn from_value(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::NodeId,
            2 => Self::NodeClass,
            3 => Self::BrowseName,
            4 => Self::DisplayName,
            5 => Self::Description,
            6 => Self::WriteMask,
            7 => Self::UserWriteMask,
            8 => Self::IsAbstract,
            9 => Self::Symmetric,
            10 => Self::InverseName,
            11 => Self::ContainsNoLoops,
            12 => Self::EventNotifier,
            13 => Self::Value,
            14 => Self::DataType,
            15 => Self::ValueRank,
            16 => Self::ArrayDimensions,
            17 => Self::AccessLevel,
            18 => Self::UserAccessLevel,
            19 => Self::MinimumSamplingInterval,
            20 => Self::Historizing,
            21 => Self::Executable,
            22 => Self::UserExecutable,
            _ => return None,
        })
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// Browse / Monitoring Enums
// =============================================================================

/// OPC UA browse direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowseDirection {
    /// Browse forward references.
    #[default]
    Forward,
    /// Browse inverse references.
    Inverse,
    /// Browse both directions.
    Both,
}

impl BrowseDirection {
    /// Returns the OPC UA value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Forward => 0,
            Self::Inverse => 1,
            Self::Both => 2,
        }
    }
}

/// OPC UA monitoring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    /// Monitoring disabled.
    Disabled,
    /// Sampling enabled, reporting disabled.
    Sampling,
    /// Sampling and reporting enabled.
    #[default]
    Reporting,
}

impl MonitoringMode {
    /// Returns the OPC UA value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Disabled => 0,
            Self::Sampling => 1,
            Self::Reporting => 2,
        }
    }
}

/// Which timestamps the server returns with values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampsToReturn {
    /// Source timestamp only.
    Source,
    /// Server timestamp only.
    Server,
    /// Both timestamps.
    #[default]
    Both,
    /// No timestamps.
    Neither,
}

// =============================================================================
// ServerState
// =============================================================================

/// Value of the `Server_ServerStatus_State` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// Running normally.
    Running,
    /// Vendor-specific fatal error.
    Failed,
    /// No configuration loaded.
    NoConfiguration,
    /// Suspended by an administrator.
    Suspended,
    /// Shutting down.
    Shutdown,
    /// In test mode.
    Test,
    /// Lost communication with underlying devices.
    CommunicationFault,
    /// State cannot be determined.
    Unknown,
}

impl ServerState {
    /// Maps the enumeration value reported by the server.
    pub fn from_value(value: i64) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Failed,
            2 => Self::NoConfiguration,
            3 => Self::Suspended,
            4 => Self::Shutdown,
            5 => Self::Test,
            6 => Self::CommunicationFault,
            _ => Self::Unknown,
        }
    }
}

// =============================================================================
// ClientConfig
// =============================================================================

/// OPC UA client configuration.
///
/// Application identity and timeouts are fixed for the lifetime of a
/// [`SessionManager`](crate::client::SessionManager).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Application name presented to servers.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI presented to servers.
    #[serde(default = "default_application_uri")]
    pub application_uri: String,

    /// Product URI.
    #[serde(default = "default_product_uri")]
    pub product_uri: String,

    /// Bound on every request.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Requested session timeout.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Bound on disconnect and transport release during shutdown.
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Sampling interval used when the caller does not pick one.
    #[serde(default = "default_sampling_interval", with = "humantime_serde")]
    pub default_sampling_interval: Duration,

    /// How an endpoint is chosen from the discovered list.
    #[serde(default)]
    pub endpoint_policy: EndpointPolicy,

    /// PKI directory for the transport's certificate store.
    #[serde(default = "default_pki_dir")]
    pub pki_dir: String,

    /// Accept server certificates without validation.
    #[serde(default = "default_true")]
    pub trust_server_certs: bool,

    /// Settings for newly created subscriptions.
    #[serde(default)]
    pub subscription: SubscriptionSettings,

    /// Settings for newly created monitored items.
    #[serde(default)]
    pub monitored_item: MonitoredItemSettings,
}

fn default_application_name() -> String {
    "UA Explorer".to_string()
}

fn default_application_uri() -> String {
    "urn:uax:client".to_string()
}

fn default_product_uri() -> String {
    "urn:uax".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_millis(500)
}

fn default_sampling_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_pki_dir() -> String {
    "pki".to_string()
}

fn default_true() -> bool {
    true
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), OpcUaError> {
        if self.application_name.trim().is_empty() {
            return Err(OpcUaError::configuration(ConfigurationError::missing_field(
                "application_name",
            )));
        }
        if self.application_uri.trim().is_empty() {
            return Err(OpcUaError::configuration(ConfigurationError::missing_field(
                "application_uri",
            )));
        }

        for (name, value) in [
            ("request_timeout", self.request_timeout),
            ("session_timeout", self.session_timeout),
            ("shutdown_timeout", self.shutdown_timeout),
            ("default_sampling_interval", self.default_sampling_interval),
        ] {
            if value.is_zero() {
                return Err(OpcUaError::configuration(ConfigurationError::invalid_timeout(
                    value,
                    format!("{} must be greater than 0", name),
                )));
            }
        }

        if self.monitored_item.queue_size == 0 {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "monitored_item.queue_size",
                "must be at least 1",
            )));
        }
        if self.subscription.lifetime_count < 3 * self.subscription.keepalive_count {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "subscription.lifetime_count",
                "must be at least three times keepalive_count",
            )));
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            application_uri: default_application_uri(),
            product_uri: default_product_uri(),
            request_timeout: default_request_timeout(),
            session_timeout: default_session_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            default_sampling_interval: default_sampling_interval(),
            endpoint_policy: EndpointPolicy::default(),
            pki_dir: default_pki_dir(),
            trust_server_certs: true,
            subscription: SubscriptionSettings::default(),
            monitored_item: MonitoredItemSettings::default(),
        }
    }
}

// =============================================================================
// ClientConfigBuilder
// =============================================================================

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.application_uri = uri.into();
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// Sets the shutdown timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Sets the default sampling interval.
    pub fn default_sampling_interval(mut self, interval: Duration) -> Self {
        self.config.default_sampling_interval = interval;
        self
    }

    /// Sets the endpoint selection policy.
    pub fn endpoint_policy(mut self, policy: EndpointPolicy) -> Self {
        self.config.endpoint_policy = policy;
        self
    }

    /// Sets the PKI directory.
    pub fn pki_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.pki_dir = dir.into();
        self
    }

    /// Sets whether server certificates are trusted without validation.
    pub fn trust_server_certs(mut self, trust: bool) -> Self {
        self.config.trust_server_certs = trust;
        self
    }

    /// Sets the subscription settings.
    pub fn subscription(mut self, settings: SubscriptionSettings) -> Self {
        self.config.subscription = settings;
        self
    }

    /// Sets the monitored item settings.
    pub fn monitored_item(mut self, settings: MonitoredItemSettings) -> Self {
        self.config.monitored_item = settings;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<ClientConfig, OpcUaError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// Parameters for subscriptions created by the client.
///
/// The publishing interval is not part of these settings; it is the
/// interval the caller subscribes with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Publishing intervals before an unacknowledged subscription expires.
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Publishing intervals without data before a keep-alive is sent.
    #[serde(default = "default_keepalive_count")]
    pub keepalive_count: u32,

    /// Maximum notifications per publish (0 = unlimited).
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Relative priority (0-255).
    #[serde(default)]
    pub priority: u8,

    /// Publishing enabled on creation.
    #[serde(default = "default_true")]
    pub publishing_enabled: bool,
}

fn default_lifetime_count() -> u32 {
    10_000
}

fn default_keepalive_count() -> u32 {
    3_000
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            lifetime_count: default_lifetime_count(),
            keepalive_count: default_keepalive_count(),
            max_notifications_per_publish: 0,
            priority: 0,
            publishing_enabled: true,
        }
    }
}

// =============================================================================
// MonitoredItemSettings
// =============================================================================

/// Settings for monitored items.
///
/// The sampling interval always equals the subscription's requested
/// interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredItemSettings {
    /// Server-side queue size.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Discard the oldest value when the queue is full.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,

    /// Monitoring mode.
    #[serde(default)]
    pub monitoring_mode: MonitoringMode,

    /// Timestamps returned with each value.
    #[serde(default)]
    pub timestamps: TimestampsToReturn,
}

fn default_queue_size() -> u32 {
    10
}

impl Default for MonitoredItemSettings {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            discard_oldest: true,
            monitoring_mode: MonitoringMode::Reporting,
            timestamps: TimestampsToReturn::Both,
        }
    }
}

// =============================================================================
// humantime_serde helper
// =============================================================================

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_parse_and_display() {
        let node: NodeId = "ns=2;s=Device.Temperature".parse().unwrap();
        assert_eq!(node, NodeId::string(2, "Device.Temperature"));
        assert_eq!(node.to_string(), "ns=2;s=Device.Temperature");

        let root: NodeId = "i=84".parse().unwrap();
        assert_eq!(root, NodeId::ROOT_FOLDER);
        assert_eq!(root.to_string(), "i=84");

        let guid: NodeId = "ns=1;g=550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert!(matches!(guid.identifier, NodeIdentifier::Guid(_)));

        let opaque: NodeId = "ns=3;b=AQID".parse().unwrap();
        assert_eq!(opaque, NodeId::opaque(3, vec![1, 2, 3]));
        assert_eq!(opaque.to_string(), "ns=3;b=AQID");
    }

    #[test]
    fn test_node_id_parse_errors() {
        assert!("ns=x;i=1".parse::<NodeId>().is_err());
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("ns=2;i=abc".parse::<NodeId>().is_err());
        assert!("ns=2;q=1".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_expanded_node_id_locality() {
        let local = ExpandedNodeId::local(NodeId::numeric(2, 7));
        assert!(local.is_local());
        assert_eq!(local.as_local(), Some(&NodeId::numeric(2, 7)));

        let remote = ExpandedNodeId {
            node_id: NodeId::numeric(2, 7),
            namespace_uri: None,
            server_index: 1,
        };
        assert!(!remote.is_local());
        assert!(remote.as_local().is_none());
        assert_eq!(remote.to_string(), "svr=1;ns=2;i=7");

        let by_uri = ExpandedNodeId {
            node_id: NodeId::string(0, "Tag"),
            namespace_uri: Some("urn:vendor".to_string()),
            server_index: 0,
        };
        assert!(!by_uri.is_local());
    }

    #[test]
    fn test_status_code_severity() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::BAD_NOT_WRITABLE.is_bad());
        assert!(StatusCode::UNCERTAIN.is_uncertain());
        assert!(!StatusCode::UNCERTAIN.is_good());
        assert_eq!(StatusCode::BAD_NOT_WRITABLE.name(), "BadNotWritable");
        assert_eq!(StatusCode::new(0x803A_0400).name(), "BadNotReadable");
        assert_eq!(StatusCode::new(0x80FF_0000).name(), "Unknown");
    }

    #[test]
    fn test_data_type_lookup() {
        assert_eq!(OpcUaDataType::from_type_id(6), Some(OpcUaDataType::Int32));
        assert_eq!(OpcUaDataType::from_type_id(17), None);
        assert_eq!(
            OpcUaDataType::from_node_id(&NodeId::numeric(0, 11)),
            Some(OpcUaDataType::Double)
        );
        assert_eq!(OpcUaDataType::from_node_id(&NodeId::numeric(2, 11)), None);
        for id in 1..=16 {
            assert_eq!(OpcUaDataType::from_type_id(id).map(|t| t.type_id()), Some(id));
        }
    }

    #[test]
    fn test_node_class_roundtrip() {
        for class in NodeClass::ALL {
            assert_eq!(NodeClass::from_value(class.value()), class);
        }
        assert_eq!(NodeClass::from_value(3), NodeClass::Unspecified);
    }

    #[test]
    fn test_attribute_id_roundtrip() {
        for value in 1..=22 {
            let id = AttributeId::from_value(value).unwrap();
            assert_eq!(id.value(), value);
        }
        assert!(AttributeId::from_value(0).is_none());
    }

    #[test]
    fn test_security_parsing() {
        assert_eq!(
            "sign-and-encrypt".parse::<SecurityMode>().unwrap(),
            SecurityMode::SignAndEncrypt
        );
        assert_eq!(
            SecurityPolicy::from_uri("http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256"),
            Some(SecurityPolicy::Basic256Sha256)
        );
        assert!("bogus".parse::<SecurityPolicy>().is_err());
        assert_eq!(
            "aes256-sha256-rsapss".parse::<SecurityPolicy>().unwrap(),
            SecurityPolicy::Aes256Sha256RsaPss
        );
    }

    #[test]
    fn test_security_tables() {
        for mode in [SecurityMode::None, SecurityMode::Sign, SecurityMode::SignAndEncrypt] {
            assert_eq!(SecurityMode::from_value(mode.value()), Some(mode));
        }
        assert_eq!(SecurityMode::from_value(0), None);
        assert_eq!(SecurityMode::SignAndEncrypt.name(), "SignAndEncrypt");

        for policy in SecurityPolicy::ALL {
            assert!(policy.uri().starts_with(SECURITY_POLICY_URI_PREFIX));
            assert_eq!(SecurityPolicy::from_uri(policy.uri()), Some(policy.clone()));
        }
        assert_eq!(SecurityPolicy::Aes128Sha256RsaOaep.name(), "Aes128_Sha256_RsaOaep");
    }

    #[test]
    fn test_identity_hides_password() {
        let identity = Identity::user_name("operator", "secret");
        assert_eq!(identity.to_string(), "UserName(operator)");
        assert!(!format!("{:?}", identity).contains("secret"));
        assert!(Identity::default().is_anonymous());
    }

    #[test]
    fn test_server_state_mapping() {
        assert_eq!(ServerState::from_value(0), ServerState::Running);
        assert_eq!(ServerState::from_value(6), ServerState::CommunicationFault);
        assert_eq!(ServerState::from_value(42), ServerState::Unknown);
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_millis(500));
        assert_eq!(config.default_sampling_interval, Duration::from_millis(500));
        assert_eq!(config.monitored_item.queue_size, 10);
        assert!(config.monitored_item.discard_oldest);
        assert_eq!(config.monitored_item.monitoring_mode, MonitoringMode::Reporting);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_validation() {
        assert!(ClientConfig::builder()
            .request_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(ClientConfig::builder().application_name(" ").build().is_err());

        let mut items = MonitoredItemSettings::default();
        items.queue_size = 0;
        assert!(ClientConfig::builder().monitored_item(items).build().is_err());
    }

    #[test]
    fn test_client_config_serde_humantime() {
        let json = r#"{"request_timeout":"2s","shutdown_timeout":"250ms"}"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.shutdown_timeout, Duration::from_millis(250));
        assert_eq!(config.application_name, "UA Explorer");
    }
}
