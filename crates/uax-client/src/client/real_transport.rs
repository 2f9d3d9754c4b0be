// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport backed by the `opcua` crate.
//!
//! The `opcua` client API is synchronous: every service call blocks on its
//! own runtime. Each call here runs on the blocking pool so the async side
//! never stalls.
//!
//! ```text
//! SessionManager ──► RealOpcUaTransport ──► Client::connect_to_endpoint
//!                                                   │
//!                         RealSession ◄─────────────┘
//!                              │ spawn_blocking
//!                              ▼
//!                  opcua::client::Session (run_async loop)
//!                              │ DataChangeCallback
//!                              ▼
//!                       DataChangeSink
//! ```
//!
//! Enabled by the `real-transport` feature.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use opcua::client::prelude::{
    Client, ClientBuilder, ConnectionStatusCallback, DataChangeCallback, IdentityToken,
    MonitoredItem, Session, SessionClosedCallback, SessionCommand,
};
use opcua::client::prelude::{AttributeService, SubscriptionService, ViewService};
use opcua::sync::RwLock as UaRwLock;
use opcua::types as ua;

use crate::client::transport::{
    ApplicationDescription, AttributeValue, BrowseDescription, BrowseResult, DataChangeSink,
    EndpointDescription, MonitoredItemRequest, MonitoredItemResult, OpcUaSession, OpcUaTransport,
    ReadValueId, ReferenceDescription, RevisedSubscription, SessionConfig, SessionEvent,
    SubscriptionParameters, Variant, WriteValue,
};
use crate::error::{
    ConnectionError, OpcUaError, OpcUaResult, SessionError, SubscriptionError,
};
use crate::types::{
    BrowseDirection, ClientConfig, ExpandedNodeId, Identity, LocalizedText, MonitoringMode,
    NodeClass, NodeId, NodeIdentifier, QualifiedName, SecurityMode, StatusCode,
    TimestampsToReturn,
};

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// [`OpcUaTransport`] over the `opcua` crate.
pub struct RealOpcUaTransport {
    config: ClientConfig,
}

impl RealOpcUaTransport {
    /// Creates a transport. `config` supplies the application identity used
    /// for endpoint discovery.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

/// Builds an `opcua` client for one discovery or connect call.
fn build_client(
    application_name: &str,
    application_uri: &str,
    product_uri: &str,
    session_timeout: Duration,
    pki_dir: &str,
    trust_server_certs: bool,
) -> OpcUaResult<Client> {
    ClientBuilder::new()
        .application_name(application_name)
        .application_uri(application_uri)
        .product_uri(product_uri)
        .create_sample_keypair(true)
        .trust_server_certs(trust_server_certs)
        .session_retry_limit(0)
        .session_timeout(session_timeout.as_millis().min(u32::MAX as u128) as u32)
        .pki_dir(pki_dir)
        .client()
        .ok_or_else(|| {
            OpcUaError::connection(ConnectionError::invalid_endpoint(
                application_uri,
                "Failed to build OPC UA client",
            ))
        })
}

fn security_mode_to_ua(mode: SecurityMode) -> ua::MessageSecurityMode {
    match mode {
        SecurityMode::None => ua::MessageSecurityMode::None,
        SecurityMode::Sign => ua::MessageSecurityMode::Sign,
        SecurityMode::SignAndEncrypt => ua::MessageSecurityMode::SignAndEncrypt,
    }
}

fn security_mode_from_ua(mode: ua::MessageSecurityMode) -> Option<SecurityMode> {
    match mode {
        ua::MessageSecurityMode::None => Some(SecurityMode::None),
        ua::MessageSecurityMode::Sign => Some(SecurityMode::Sign),
        ua::MessageSecurityMode::SignAndEncrypt => Some(SecurityMode::SignAndEncrypt),
        _ => None,
    }
}

fn identity_token(identity: &Identity) -> IdentityToken {
    match identity {
        Identity::Anonymous => IdentityToken::Anonymous,
        Identity::UserName { username, password } => {
            IdentityToken::UserName(username.clone(), password.clone())
        }
        Identity::Certificate {
            certificate_path,
            private_key_path,
        } => IdentityToken::X509(
            PathBuf::from(certificate_path),
            PathBuf::from(private_key_path),
        ),
    }
}

fn endpoint_from_ua(endpoint: &ua::EndpointDescription) -> Option<EndpointDescription> {
    let security_mode = security_mode_from_ua(endpoint.security_mode)?;
    let certificate = endpoint.server_certificate.value.clone().filter(|c| !c.is_empty());
    Some(EndpointDescription {
        endpoint_url: endpoint.endpoint_url.as_ref().to_string(),
        security_mode,
        security_policy_uri: endpoint.security_policy_uri.as_ref().to_string(),
        security_level: endpoint.security_level,
        server: ApplicationDescription {
            application_uri: endpoint.server.application_uri.as_ref().to_string(),
            product_uri: endpoint.server.product_uri.as_ref().to_string(),
            application_name: endpoint.server.application_name.text.as_ref().to_string(),
        },
        server_certificate: certificate,
    })
}

/// Maps a failed discovery or connect status to a connection error.
fn connect_error(url: &str, status: ua::StatusCode) -> OpcUaError {
    let status = status_from_ua(status);
    match status {
        StatusCode::BAD_CONNECTION_REJECTED | StatusCode::BAD_NOT_CONNECTED => {
            OpcUaError::connection(ConnectionError::refused(url))
        }
        _ => OpcUaError::network(url, status.name()),
    }
}

/// Runs a blocking `opcua` call on the blocking pool.
async fn blocking<T, F>(f: F) -> OpcUaResult<T>
where
    F: FnOnce() -> OpcUaResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OpcUaError::session_failed(format!("Blocking task failed: {}", e)))?
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn get_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        let config = self.config.clone();
        let url = url.to_string();
        blocking(move || {
            let client = build_client(
                &config.application_name,
                &config.application_uri,
                &config.product_uri,
                config.session_timeout,
                &config.pki_dir,
                config.trust_server_certs,
            )?;
            let endpoints = client
                .get_server_endpoints_from_url(url.as_str())
                .map_err(|status| connect_error(&url, status))?;
            debug!(url = %url, count = endpoints.len(), "Discovered endpoints");
            Ok(endpoints.iter().filter_map(endpoint_from_ua).collect())
        })
        .await
    }

    async fn open_session(
        &self,
        config: &SessionConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> OpcUaResult<Arc<dyn OpcUaSession>> {
        let config = config.clone();
        let session = blocking(move || {
            let mut client = build_client(
                &config.application_name,
                &config.application_uri,
                &config.product_uri,
                config.session_timeout,
                &config.pki_dir,
                config.trust_server_certs,
            )?;

            let wanted = &config.endpoint;
            let mode = security_mode_to_ua(wanted.security_mode);
            let endpoint = client
                .get_server_endpoints_from_url(wanted.endpoint_url.as_str())
                .map_err(|status| connect_error(&wanted.endpoint_url, status))?
                .into_iter()
                .find(|e| {
                    e.security_mode == mode
                        && e.security_policy_uri.as_ref() == wanted.security_policy_uri
                })
                .ok_or_else(|| {
                    OpcUaError::connection(ConnectionError::no_suitable_endpoint(
                        wanted.to_string(),
                    ))
                })?;

            let session = client
                .connect_to_endpoint(endpoint, identity_token(&config.identity))
                .map_err(|status| {
                    OpcUaError::session(SessionError::creation_failed(status.to_string()))
                })?;
            Ok(session)
        })
        .await?;

        {
            let mut guard = session.write();
            let tx = events.clone();
            guard.set_connection_status_callback(ConnectionStatusCallback::new(
                move |connected| {
                    let event = if connected {
                        SessionEvent::Active
                    } else {
                        SessionEvent::Inactive { cause: None }
                    };
                    let _ = tx.send(event);
                },
            ));
            let tx = events.clone();
            guard.set_session_closed_callback(SessionClosedCallback::new(move |status| {
                let _ = tx.send(SessionEvent::Inactive {
                    cause: Some(status.to_string()),
                });
            }));
        }

        let stop = Session::run_async(Arc::clone(&session));
        let _ = events.send(SessionEvent::Active);

        let id = format!("uax-{}", Uuid::new_v4());
        info!(session_id = %id, "OPC UA session opened");
        Ok(Arc::new(RealSession {
            id,
            session,
            stop: Mutex::new(Some(stop)),
            handles: DashMap::new(),
        }))
    }

    async fn release(&self, _timeout: Duration) -> OpcUaResult<()> {
        Ok(())
    }

    fn display_name(&self) -> String {
        format!("opcua ({})", self.config.application_uri)
    }
}

// =============================================================================
// RealSession
// =============================================================================

/// Server monitored item id to client handle, for one subscription.
type HandleMap = Arc<DashMap<u32, u32>>;

struct RealSession {
    id: String,
    session: Arc<UaRwLock<Session>>,
    stop: Mutex<Option<oneshot::Sender<SessionCommand>>>,
    handles: DashMap<u32, HandleMap>,
}

impl RealSession {
    fn session(&self) -> Arc<UaRwLock<Session>> {
        Arc::clone(&self.session)
    }
}

#[async_trait]
impl OpcUaSession for RealSession {
    fn session_id(&self) -> String {
        self.id.clone()
    }

    async fn close(&self) -> OpcUaResult<()> {
        let session = self.session();
        blocking(move || {
            session.read().disconnect();
            Ok(())
        })
        .await?;
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(SessionCommand::Stop);
        }
        self.handles.clear();
        info!(session_id = %self.id, "OPC UA session closed");
        Ok(())
    }

    async fn browse(&self, nodes: &[BrowseDescription]) -> OpcUaResult<Vec<BrowseResult>> {
        let session = self.session();
        let requests: Vec<ua::BrowseDescription> = nodes.iter().map(browse_to_ua).collect();
        let first = nodes
            .first()
            .map(|n| n.node_id.to_string())
            .unwrap_or_default();

        blocking(move || {
            let guard = session.read();
            let results = guard
                .browse(&requests)
                .map_err(|status| OpcUaError::browse_failed(&first, status.to_string()))?
                .unwrap_or_default();

            let mut out = Vec::with_capacity(results.len());
            for result in results {
                let mut status = status_from_ua(result.status_code);
                let mut references: Vec<ReferenceDescription> = result
                    .references
                    .unwrap_or_default()
                    .iter()
                    .map(reference_from_ua)
                    .collect();

                let mut continuation = result.continuation_point;
                while status.is_good() && !continuation.is_null() {
                    trace!(node_id = %first, "Following browse continuation point");
                    let next = guard
                        .browse_next(false, &[continuation])
                        .map_err(|status| OpcUaError::browse_failed(&first, status.to_string()))?
                        .unwrap_or_default();
                    let Some(next) = next.into_iter().next() else {
                        break;
                    };
                    status = status_from_ua(next.status_code);
                    references.extend(
                        next.references
                            .unwrap_or_default()
                            .iter()
                            .map(reference_from_ua),
                    );
                    continuation = next.continuation_point;
                }

                out.push(BrowseResult { status, references });
            }
            Ok(out)
        })
        .await
    }

    async fn read(&self, nodes: &[ReadValueId]) -> OpcUaResult<Vec<AttributeValue>> {
        let session = self.session();
        let requests: Vec<ua::ReadValueId> = nodes
            .iter()
            .map(|n| read_value_id_to_ua(&n.node_id, n.attribute_id.value()))
            .collect();
        let first = nodes
            .first()
            .map(|n| n.node_id.to_string())
            .unwrap_or_default();

        blocking(move || {
            let values = session
                .read()
                .read(&requests, ua::TimestampsToReturn::Both, 0.0)
                .map_err(|status| OpcUaError::read_failed(&first, status.to_string()))?;
            Ok(values.iter().map(data_value_from_ua).collect())
        })
        .await
    }

    async fn write(&self, values: &[WriteValue]) -> OpcUaResult<Vec<StatusCode>> {
        let first = values
            .first()
            .map(|v| v.node_id.to_string())
            .unwrap_or_default();
        let requests = values
            .iter()
            .map(|v| {
                Ok(ua::WriteValue {
                    node_id: node_id_to_ua(&v.node_id),
                    attribute_id: v.attribute_id.value(),
                    index_range: ua::UAString::null(),
                    value: ua::DataValue::value_only(variant_to_ua(&v.value)?),
                })
            })
            .collect::<OpcUaResult<Vec<_>>>()?;

        let session = self.session();
        blocking(move || {
            let results = session
                .read()
                .write(&requests)
                .map_err(|status| OpcUaError::write_failed(&first, status.to_string()))?;
            Ok(results.into_iter().map(status_from_ua).collect())
        })
        .await
    }

    async fn create_subscription(
        &self,
        params: &SubscriptionParameters,
        sink: Arc<dyn DataChangeSink>,
    ) -> OpcUaResult<RevisedSubscription> {
        let session = self.session();
        let params = params.clone();
        let handles: HandleMap = Arc::new(DashMap::new());
        let routes = Arc::clone(&handles);

        let callback = DataChangeCallback::new(move |items: Vec<&MonitoredItem>| {
            for item in items {
                match routes.get(&item.id()) {
                    Some(handle) => {
                        sink.on_data_change(*handle, data_value_from_ua(item.last_value()))
                    }
                    None => trace!(monitored_item_id = item.id(), "Notification for unknown item"),
                }
            }
        });

        let subscription_id = blocking(move || {
            session
                .read()
                .create_subscription(
                    duration_to_ms(params.publishing_interval),
                    params.lifetime_count,
                    params.keepalive_count,
                    params.max_notifications_per_publish,
                    params.priority,
                    params.publishing_enabled,
                    callback,
                )
                .map_err(|status| {
                    OpcUaError::subscription(SubscriptionError::creation_failed(status.to_string()))
                })
        })
        .await?;

        self.handles.insert(subscription_id, handles);
        Ok(RevisedSubscription {
            subscription_id,
            publishing_interval: params.publishing_interval,
            lifetime_count: params.lifetime_count,
            keepalive_count: params.keepalive_count,
        })
    }

    async fn modify_subscription(
        &self,
        subscription_id: u32,
        params: &SubscriptionParameters,
    ) -> OpcUaResult<RevisedSubscription> {
        let session = self.session();
        let p = params.clone();
        blocking(move || {
            session
                .read()
                .modify_subscription(
                    subscription_id,
                    duration_to_ms(p.publishing_interval),
                    p.lifetime_count,
                    p.keepalive_count,
                    p.max_notifications_per_publish,
                    p.priority,
                )
                .map_err(|status| {
                    OpcUaError::subscription(SubscriptionError::creation_failed(status.to_string()))
                })
        })
        .await?;

        Ok(RevisedSubscription {
            subscription_id,
            publishing_interval: params.publishing_interval,
            lifetime_count: params.lifetime_count,
            keepalive_count: params.keepalive_count,
        })
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        let session = self.session();
        let status = blocking(move || {
            session
                .read()
                .delete_subscription(subscription_id)
                .map_err(|status| {
                    OpcUaError::subscription(SubscriptionError::delete_failed(
                        subscription_id,
                        status.to_string(),
                    ))
                })
        })
        .await?;

        self.handles.remove(&subscription_id);
        let status = status_from_ua(status);
        if status.is_bad() {
            return Err(OpcUaError::subscription(SubscriptionError::delete_failed(
                subscription_id,
                status.to_string(),
            )));
        }
        Ok(())
    }

    async fn create_monitored_items(
        &self,
        subscription_id: u32,
        timestamps: TimestampsToReturn,
        items: &[MonitoredItemRequest],
    ) -> OpcUaResult<Vec<MonitoredItemResult>> {
        let handles = self
            .handles
            .get(&subscription_id)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| {
                OpcUaError::subscription(SubscriptionError::not_found(subscription_id))
            })?;

        let requests: Vec<ua::MonitoredItemCreateRequest> = items
            .iter()
            .map(|item| ua::MonitoredItemCreateRequest {
                item_to_monitor: read_value_id_to_ua(&item.node_id, item.attribute_id.value()),
                monitoring_mode: monitoring_mode_to_ua(item.monitoring_mode),
                requested_parameters: ua::MonitoringParameters {
                    client_handle: item.client_handle,
                    sampling_interval: duration_to_ms(item.sampling_interval),
                    filter: ua::ExtensionObject::null(),
                    queue_size: item.queue_size,
                    discard_oldest: item.discard_oldest,
                },
            })
            .collect();

        let session = self.session();
        let timestamps = timestamps_to_ua(timestamps);
        let results = blocking(move || {
            session
                .read()
                .create_monitored_items(subscription_id, timestamps, &requests)
                .map_err(|status| {
                    OpcUaError::subscription(SubscriptionError::monitored_item_failed(
                        format!("subscription {}", subscription_id),
                        status.to_string(),
                    ))
                })
        })
        .await?;

        let mut out = Vec::with_capacity(results.len());
        for (request, result) in items.iter().zip(results) {
            let status = status_from_ua(result.status_code);
            if status.is_good() {
                handles.insert(result.monitored_item_id, request.client_handle);
            } else {
                warn!(node_id = %request.node_id, status = %status, "Monitored item rejected");
            }
            out.push(MonitoredItemResult {
                status,
                monitored_item_id: result.monitored_item_id,
                sampling_interval: ms_to_duration(result.revised_sampling_interval),
                queue_size: result.revised_queue_size,
            });
        }
        Ok(out)
    }

    async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> OpcUaResult<Vec<StatusCode>> {
        let session = self.session();
        let ids = monitored_item_ids.to_vec();
        let results = blocking(move || {
            session
                .read()
                .delete_monitored_items(subscription_id, &ids)
                .map_err(|status| {
                    OpcUaError::subscription(SubscriptionError::delete_failed(
                        subscription_id,
                        status.to_string(),
                    ))
                })
        })
        .await?;

        if let Some(handles) = self.handles.get(&subscription_id) {
            for id in monitored_item_ids {
                handles.remove(id);
            }
        }
        Ok(results.into_iter().map(status_from_ua).collect())
    }
}

impl Drop for RealSession {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(SessionCommand::Stop);
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn duration_to_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn ms_to_duration(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f64(ms / 1000.0)
    } else {
        Duration::ZERO
    }
}

fn status_from_ua(status: ua::StatusCode) -> StatusCode {
    StatusCode::new(status.bits())
}

fn node_id_to_ua(node_id: &NodeId) -> ua::NodeId {
    let ns = node_id.namespace_index;
    match &node_id.identifier {
        NodeIdentifier::Numeric(v) => ua::NodeId::new(ns, *v),
        NodeIdentifier::String(v) => ua::NodeId::new(ns, ua::UAString::from(v.as_str())),
        NodeIdentifier::Guid(v) => ua::NodeId::new(ns, ua::Guid::from_bytes(*v.as_bytes())),
        NodeIdentifier::Opaque(v) => ua::NodeId::new(ns, ua::ByteString::from(v.as_slice())),
    }
}

fn node_id_from_ua(node_id: &ua::NodeId) -> NodeId {
    let ns = node_id.namespace;
    match &node_id.identifier {
        ua::Identifier::Numeric(v) => NodeId::numeric(ns, *v),
        ua::Identifier::String(v) => NodeId::string(ns, v.as_ref()),
        ua::Identifier::Guid(v) => NodeId::guid(ns, Uuid::from_bytes(*v.as_bytes())),
        ua::Identifier::ByteString(v) => NodeId::opaque(ns, v.value.clone().unwrap_or_default()),
    }
}

fn expanded_from_ua(node_id: &ua::ExpandedNodeId) -> ExpandedNodeId {
    ExpandedNodeId {
        node_id: node_id_from_ua(&node_id.node_id),
        namespace_uri: (!node_id.namespace_uri.is_null()
            && !node_id.namespace_uri.as_ref().is_empty())
        .then(|| node_id.namespace_uri.as_ref().to_string()),
        server_index: node_id.server_index,
    }
}

fn qualified_name_from_ua(name: &ua::QualifiedName) -> QualifiedName {
    QualifiedName::new(name.namespace_index, name.name.as_ref())
}

fn localized_text_from_ua(text: &ua::LocalizedText) -> LocalizedText {
    LocalizedText {
        locale: (!text.locale.is_null() && !text.locale.as_ref().is_empty())
            .then(|| text.locale.as_ref().to_string()),
        text: text.text.as_ref().to_string(),
    }
}

fn browse_to_ua(description: &BrowseDescription) -> ua::BrowseDescription {
    ua::BrowseDescription {
        node_id: node_id_to_ua(&description.node_id),
        browse_direction: match description.direction {
            BrowseDirection::Forward => ua::BrowseDirection::Forward,
            BrowseDirection::Inverse => ua::BrowseDirection::Inverse,
            BrowseDirection::Both => ua::BrowseDirection::Both,
        },
        reference_type_id: node_id_to_ua(&description.reference_type_id),
        include_subtypes: description.include_subtypes,
        node_class_mask: description.node_class_mask,
        result_mask: description.result_mask,
    }
}

fn reference_from_ua(reference: &ua::ReferenceDescription) -> ReferenceDescription {
    ReferenceDescription {
        reference_type_id: node_id_from_ua(&reference.reference_type_id),
        is_forward: reference.is_forward,
        node_id: expanded_from_ua(&reference.node_id),
        browse_name: qualified_name_from_ua(&reference.browse_name),
        display_name: localized_text_from_ua(&reference.display_name),
        node_class: NodeClass::from_value(reference.node_class as u32),
        type_definition: expanded_from_ua(&reference.type_definition),
    }
}

fn read_value_id_to_ua(node_id: &NodeId, attribute_id: u32) -> ua::ReadValueId {
    ua::ReadValueId {
        node_id: node_id_to_ua(node_id),
        attribute_id,
        index_range: ua::UAString::null(),
        data_encoding: ua::QualifiedName::null(),
    }
}

fn monitoring_mode_to_ua(mode: MonitoringMode) -> ua::MonitoringMode {
    match mode {
        MonitoringMode::Disabled => ua::MonitoringMode::Disabled,
        MonitoringMode::Sampling => ua::MonitoringMode::Sampling,
        MonitoringMode::Reporting => ua::MonitoringMode::Reporting,
    }
}

fn timestamps_to_ua(timestamps: TimestampsToReturn) -> ua::TimestampsToReturn {
    match timestamps {
        TimestampsToReturn::Source => ua::TimestampsToReturn::Source,
        TimestampsToReturn::Server => ua::TimestampsToReturn::Server,
        TimestampsToReturn::Both => ua::TimestampsToReturn::Both,
        TimestampsToReturn::Neither => ua::TimestampsToReturn::Neither,
    }
}

fn data_value_from_ua(value: &ua::DataValue) -> AttributeValue {
    AttributeValue {
        value: value
            .value
            .as_ref()
            .map(variant_from_ua)
            .unwrap_or_default(),
        data_type: None,
        status: value.status.map(status_from_ua).unwrap_or(StatusCode::GOOD),
        source_timestamp: value.source_timestamp.map(|t| t.as_chrono()),
        source_picoseconds: value.source_picoseconds,
        server_timestamp: value.server_timestamp.map(|t| t.as_chrono()),
        server_picoseconds: value.server_picoseconds,
    }
}

fn variant_from_ua(variant: &ua::Variant) -> Variant {
    match variant {
        ua::Variant::Empty => Variant::Empty,
        ua::Variant::Boolean(v) => Variant::Boolean(*v),
        ua::Variant::SByte(v) => Variant::SByte(*v),
        ua::Variant::Byte(v) => Variant::Byte(*v),
        ua::Variant::Int16(v) => Variant::Int16(*v),
        ua::Variant::UInt16(v) => Variant::UInt16(*v),
        ua::Variant::Int32(v) => Variant::Int32(*v),
        ua::Variant::UInt32(v) => Variant::UInt32(*v),
        ua::Variant::Int64(v) => Variant::Int64(*v),
        ua::Variant::UInt64(v) => Variant::UInt64(*v),
        ua::Variant::Float(v) => Variant::Float(*v),
        ua::Variant::Double(v) => Variant::Double(*v),
        ua::Variant::String(v) => Variant::String(v.as_ref().to_string()),
        ua::Variant::DateTime(v) => Variant::DateTime(v.as_chrono()),
        ua::Variant::Guid(v) => Variant::Guid(Uuid::from_bytes(*v.as_bytes())),
        ua::Variant::ByteString(v) => Variant::ByteString(v.value.clone().unwrap_or_default()),
        ua::Variant::XmlElement(v) => Variant::XmlElement(v.as_ref().to_string()),
        ua::Variant::NodeId(v) => Variant::NodeId(node_id_from_ua(v)),
        ua::Variant::ExpandedNodeId(v) => Variant::NodeId(node_id_from_ua(&v.node_id)),
        ua::Variant::QualifiedName(v) => Variant::QualifiedName(qualified_name_from_ua(v)),
        ua::Variant::LocalizedText(v) => Variant::LocalizedText(localized_text_from_ua(v)),
        ua::Variant::StatusCode(v) => Variant::StatusCode(status_from_ua(*v)),
        ua::Variant::ExtensionObject(v) => Variant::ExtensionObject {
            type_id: node_id_from_ua(&v.node_id),
        },
        ua::Variant::Array(array) => {
            Variant::Array(array.values.iter().map(variant_from_ua).collect())
        }
        other => Variant::String(format!("{:?}", other)),
    }
}

fn variant_to_ua(variant: &Variant) -> OpcUaResult<ua::Variant> {
    let converted = match variant {
        Variant::Empty => ua::Variant::Empty,
        Variant::Boolean(v) => ua::Variant::Boolean(*v),
        Variant::SByte(v) => ua::Variant::SByte(*v),
        Variant::Byte(v) => ua::Variant::Byte(*v),
        Variant::Int16(v) => ua::Variant::Int16(*v),
        Variant::UInt16(v) => ua::Variant::UInt16(*v),
        Variant::Int32(v) => ua::Variant::Int32(*v),
        Variant::UInt32(v) => ua::Variant::UInt32(*v),
        Variant::Int64(v) => ua::Variant::Int64(*v),
        Variant::UInt64(v) => ua::Variant::UInt64(*v),
        Variant::Float(v) => ua::Variant::Float(*v),
        Variant::Double(v) => ua::Variant::Double(*v),
        Variant::String(v) => ua::Variant::String(ua::UAString::from(v.as_str())),
        Variant::DateTime(v) => ua::Variant::DateTime(Box::new(ua::DateTime::from(*v))),
        Variant::Guid(v) => ua::Variant::Guid(Box::new(ua::Guid::from_bytes(*v.as_bytes()))),
        Variant::ByteString(v) => ua::Variant::ByteString(ua::ByteString::from(v.as_slice())),
        Variant::XmlElement(v) => ua::Variant::XmlElement(ua::UAString::from(v.as_str())),
        Variant::NodeId(v) => ua::Variant::NodeId(Box::new(node_id_to_ua(v))),
        Variant::QualifiedName(v) => ua::Variant::QualifiedName(Box::new(ua::QualifiedName::new(
            v.namespace_index,
            v.name.as_str(),
        ))),
        Variant::LocalizedText(v) => ua::Variant::LocalizedText(Box::new(ua::LocalizedText::new(
            v.locale.as_deref().unwrap_or(""),
            v.text.as_str(),
        ))),
        Variant::StatusCode(v) => {
            ua::Variant::StatusCode(ua::StatusCode::from_bits_truncate(v.bits()))
        }
        Variant::ExtensionObject { .. } | Variant::Array(_) => {
            return Err(OpcUaError::type_mismatch("scalar value", &variant.to_string()));
        }
    };
    Ok(converted)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_node_id_conversion() {
        for node in [
            NodeId::numeric(2, 1001),
            NodeId::string(2, "Test.Node"),
            NodeId::guid(3, Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0)),
            NodeId::opaque(4, vec![1, 2, 3]),
        ] {
            assert_eq!(node_id_from_ua(&node_id_to_ua(&node)), node);
        }
    }

    #[test]
    fn test_scalar_variant_conversion() {
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        for value in [
            Variant::Boolean(true),
            Variant::Int32(-7),
            Variant::Double(3.5),
            Variant::String("Hello".into()),
            Variant::DateTime(when),
            Variant::NodeId(NodeId::numeric(0, 85)),
        ] {
            let ua_value = variant_to_ua(&value).unwrap();
            assert_eq!(variant_from_ua(&ua_value), value);
        }
    }

    #[test]
    fn test_array_write_rejected() {
        let value = Variant::Array(vec![Variant::Int32(1)]);
        assert!(variant_to_ua(&value).is_err());
    }

    #[test]
    fn test_status_and_interval_conversion() {
        let status = status_from_ua(ua::StatusCode::BadNodeIdUnknown);
        assert_eq!(status, StatusCode::BAD_NODE_ID_UNKNOWN);
        assert_eq!(duration_to_ms(Duration::from_millis(250)), 250.0);
        assert_eq!(ms_to_duration(1000.0), Duration::from_secs(1));
        assert_eq!(ms_to_duration(-1.0), Duration::ZERO);
    }

    #[test]
    fn test_connect_error_mapping() {
        let url = "opc.tcp://plc:4840";
        assert!(matches!(
            connect_error(url, ua::StatusCode::BadConnectionRejected),
            OpcUaError::Connection(ConnectionError::Refused { .. })
        ));
        assert!(matches!(
            connect_error(url, ua::StatusCode::BadTimeout),
            OpcUaError::Connection(ConnectionError::Network { .. })
        ));
    }

    #[test]
    fn test_security_mode_mapping() {
        for mode in [SecurityMode::None, SecurityMode::Sign, SecurityMode::SignAndEncrypt] {
            assert_eq!(security_mode_from_ua(security_mode_to_ua(mode)), Some(mode));
        }
        assert_eq!(security_mode_from_ua(ua::MessageSecurityMode::Invalid), None);
    }

    #[test]
    fn test_transport_display_name() {
        let transport = RealOpcUaTransport::new(ClientConfig::default());
        assert!(transport.display_name().starts_with("opcua"));
    }
}
