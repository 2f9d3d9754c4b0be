// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Asynchronous OPC UA client runtime.
//!
//! This crate is the engine behind an OPC UA explorer: it discovers and
//! selects endpoints, owns the single active session, browses the server
//! address space lazily, reads and writes attributes, and routes
//! subscription notifications to per-item value streams.
//!
//! # Features
//!
//! - Endpoint discovery and policy-driven selection
//! - One active session with connectivity change notifications
//! - Lazy, cached address space tree with browse-once semantics
//! - Per-node-class attribute reads and string-to-value writes
//! - Subscriptions reused by publishing interval, restorable on reconnect
//!
//! The protocol library sits behind [`client::OpcUaTransport`]. The
//! `real-transport` feature provides an implementation over the `opcua`
//! crate.
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint discovery and channel issues
//! ├── Session       - Session lifecycle errors
//! ├── Browse        - Node browsing failures
//! ├── Operation     - Read/write failures
//! ├── Subscription  - Subscription and monitored item errors
//! ├── Conversion    - Text-to-value conversion errors
//! ├── Configuration - Invalid settings
//! └── Timeout       - Bounded request expiry
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uax_client::{ClientConfig, Identity, NodeId, UaClient};
//!
//! let client = UaClient::new(Arc::new(transport), ClientConfig::default());
//! client.connect("opc.tcp://localhost:4840", None, Identity::Anonymous).await?;
//!
//! let root = client.tree().root();
//! for (_, child) in client.tree().expand(root).await? {
//!     println!("{}", child.display_name);
//! }
//!
//! let state = client.attributes().read_server_state().await?;
//! println!("Server state: {:?}", state);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod attributes;
pub mod client;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod tree;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{
    BrowseError, ConfigurationError, ConnectionError, ConversionError, ErrorCode, ErrorSeverity,
    OpcUaError, OpcUaResult, OperationError, SessionError, SubscriptionError, TimeoutError,
};

pub use types::{
    AttributeId, BrowseDirection, ClientConfig, ClientConfigBuilder, ExpandedNodeId, Identity,
    LocalizedText, MonitoredItemSettings, MonitoringMode, NodeClass, NodeId, NodeIdentifier,
    OpcUaDataType, QualifiedName, SecurityMode, SecurityPolicy, ServerState, StatusCode,
    SubscriptionSettings, TimestampsToReturn,
};

pub use client::{
    AttributeValue, ConnectivityChange, EndpointDescription, MonitoredItemHandle,
    MonitoredItemInfo, OpcUaSession, OpcUaTransport, ResubscribeSummary, SessionManager,
    SessionState, SubscriptionId, SubscriptionInfo, SubscriptionManager, UaClient, ValueStream,
    Variant,
};

#[cfg(feature = "real-transport")]
pub use client::RealOpcUaTransport;

pub use attributes::{attributes_for_class, AttributeAccess, AttributeRow};
pub use endpoint::{select_endpoint, EndpointPolicy};
pub use tree::{AddressSpace, FetchState, NodeKey, NodeRef, TreeEvent};
