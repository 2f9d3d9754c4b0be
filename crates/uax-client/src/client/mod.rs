// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client runtime.
//!
//! - **Transport**: the seam to the protocol library
//! - **Session**: connection lifecycle and the active session
//! - **Subscription**: subscriptions, monitored items and value delivery
//! - **Wrapper**: the [`UaClient`] facade tying them together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           UaClient                              │
//! └─────────────────────────────────────────────────────────────────┘
//!        │                  │                 │               │
//!        ▼                  ▼                 ▼               ▼
//! SubscriptionManager  AddressSpace   AttributeAccess   SessionManager
//!        │                  │                 │               │
//!        └──────────────────┴────── current() ┴───────────────┘
//!                                     │
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              OpcUaTransport / OpcUaSession (traits)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use uax_client::client::UaClient;
//! use uax_client::types::{ClientConfig, Identity, NodeId};
//!
//! let client = UaClient::new(transport, ClientConfig::default());
//! client.connect("opc.tcp://localhost:4840", None, Identity::Anonymous).await?;
//!
//! let value = client.attributes().read_value(&NodeId::SERVER_STATE).await?;
//! println!("State: {}", value.value);
//!
//! let (_, mut item) = client
//!     .subscriptions()
//!     .subscribe("ns=2;s=Temperature".parse()?, client.config().default_sampling_interval)
//!     .await?;
//! while let Some(update) = item.values.recv().await {
//!     println!("Update: {}", update.value);
//! }
//! ```

pub mod session;
pub mod subscription;
pub mod transport;
mod wrapper;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use session::{ActiveSession, ConnectivityChange, SessionManager, SessionState, SessionStats};
pub use subscription::{
    MonitoredItemHandle, MonitoredItemInfo, ResubscribeSummary, SubscriptionId, SubscriptionInfo,
    SubscriptionManager, ValueStream,
};
pub use transport::{
    ApplicationDescription, AttributeValue, BrowseDescription, BrowseResult, DataChangeSink,
    EndpointDescription, MonitoredItemRequest, MonitoredItemResult, OpcUaSession, OpcUaTransport,
    ReadValueId, ReferenceDescription, RevisedSubscription, SessionConfig, SessionEvent,
    SubscriptionParameters, Variant, WriteValue,
};
pub use wrapper::UaClient;

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;
