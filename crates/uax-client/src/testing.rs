// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Scriptable in-memory transport.
//!
//! One [`FakeSession`] is shared by every session the [`FakeTransport`]
//! opens, so scripted children, attributes and rejections survive a
//! reconnect.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::client::transport::{
    AttributeValue, BrowseDescription, BrowseResult, DataChangeSink, EndpointDescription,
    MonitoredItemRequest, MonitoredItemResult, OpcUaSession, OpcUaTransport, ReadValueId,
    ReferenceDescription, RevisedSubscription, SessionConfig, SessionEvent,
    SubscriptionParameters, WriteValue,
};
use crate::error::{OpcUaError, OpcUaResult, SessionError, SubscriptionError};
use crate::types::{
    AttributeId, ExpandedNodeId, LocalizedText, NodeClass, NodeId, QualifiedName, SecurityMode,
    SecurityPolicy, StatusCode, TimestampsToReturn,
};

// =============================================================================
// Builders
// =============================================================================

/// Endpoint with the policy implied by `mode`.
pub fn endpoint(url: &str, mode: SecurityMode, level: u8) -> EndpointDescription {
    let policy = match mode {
        SecurityMode::None => SecurityPolicy::None,
        _ => SecurityPolicy::Basic256Sha256,
    };
    EndpointDescription::new(url, mode, policy.uri(), level)
}

/// Organizes reference to a local node.
pub fn reference(node_id: NodeId, name: &str, class: NodeClass) -> ReferenceDescription {
    reference_with_type(node_id, name, class, NodeId::numeric(0, 58))
}

/// Organizes reference with an explicit type definition.
pub fn reference_with_type(
    node_id: NodeId,
    name: &str,
    class: NodeClass,
    type_definition: NodeId,
) -> ReferenceDescription {
    ReferenceDescription {
        reference_type_id: NodeId::numeric(0, 35),
        is_forward: true,
        node_id: ExpandedNodeId::local(node_id),
        browse_name: QualifiedName::new(0, name),
        display_name: LocalizedText::new(name),
        node_class: class,
        type_definition: ExpandedNodeId::local(type_definition),
    }
}

// =============================================================================
// FakeSession
// =============================================================================

#[derive(Default)]
struct SubscriptionState {
    next_id: u32,
    created: usize,
    sinks: HashMap<u32, Arc<dyn DataChangeSink>>,
    handles: HashMap<u32, u32>,
    requests: Vec<MonitoredItemRequest>,
    next_item_id: u32,
}

/// Scriptable session.
#[derive(Default)]
pub struct FakeSession {
    closes: AtomicUsize,
    fail_close: AtomicBool,

    children: Mutex<HashMap<NodeId, Vec<ReferenceDescription>>>,
    browse_status: Mutex<HashMap<NodeId, StatusCode>>,
    browse_calls: AtomicUsize,
    browse_failures: AtomicUsize,
    browse_delay: Mutex<Duration>,
    last_browse: Mutex<Option<BrowseDescription>>,

    attributes: Mutex<HashMap<(NodeId, AttributeId), AttributeValue>>,
    read_limit: Mutex<Option<usize>>,
    read_calls: AtomicUsize,
    write_status: Mutex<StatusCode>,
    writes: Mutex<Vec<WriteValue>>,

    subscriptions: Mutex<SubscriptionState>,
    rejected: Mutex<HashSet<NodeId>>,
    fail_delete: Mutex<HashSet<u32>>,
}

impl FakeSession {
    /// Number of `close` calls.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Makes `close` fail.
    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    // --- browse ---

    /// Sets the references returned when browsing `node_id`.
    pub fn set_children(&self, node_id: NodeId, children: Vec<ReferenceDescription>) {
        self.children.lock().insert(node_id, children);
    }

    /// Sets the browse result status for `node_id`.
    pub fn set_browse_status(&self, node_id: NodeId, status: StatusCode) {
        self.browse_status.lock().insert(node_id, status);
    }

    /// Fails the next `count` browse calls.
    pub fn fail_next_browses(&self, count: usize) {
        self.browse_failures.store(count, Ordering::SeqCst);
    }

    /// Delays every browse call.
    pub fn set_browse_delay(&self, delay: Duration) {
        *self.browse_delay.lock() = delay;
    }

    /// Number of browse calls.
    pub fn browse_calls(&self) -> usize {
        self.browse_calls.load(Ordering::SeqCst)
    }

    /// The first description of the last browse call.
    pub fn last_browse(&self) -> Option<BrowseDescription> {
        self.last_browse.lock().clone()
    }

    // --- read / write ---

    /// Sets the value returned for an attribute read.
    pub fn set_attribute(&self, node_id: NodeId, attribute: AttributeId, value: AttributeValue) {
        self.attributes.lock().insert((node_id, attribute), value);
    }

    /// Truncates read results to `limit` values.
    pub fn limit_reads(&self, limit: Option<usize>) {
        *self.read_limit.lock() = limit;
    }

    /// Number of read calls.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Sets the status returned for every written value.
    pub fn set_write_status(&self, status: StatusCode) {
        *self.write_status.lock() = status;
    }

    /// Every value written so far.
    pub fn writes(&self) -> Vec<WriteValue> {
        self.writes.lock().clone()
    }

    // --- subscriptions ---

    /// Number of subscriptions created.
    pub fn created_subscriptions(&self) -> usize {
        self.subscriptions.lock().created
    }

    /// Every monitored item request received.
    pub fn monitored_requests(&self) -> Vec<MonitoredItemRequest> {
        self.subscriptions.lock().requests.clone()
    }

    /// Rejects monitored items for `node_id` with `BadNodeIdUnknown`.
    pub fn reject_item(&self, node_id: NodeId) {
        self.rejected.lock().insert(node_id);
    }

    /// Makes deleting `subscription_id` fail.
    pub fn fail_delete(&self, subscription_id: u32) {
        self.fail_delete.lock().insert(subscription_id);
    }

    /// Delivers a notification through the sink of `subscription_id`, as a
    /// server would for an item it still considers part of it.
    pub fn push_via(&self, subscription_id: u32, client_handle: u32, value: AttributeValue) {
        let sink = self.subscriptions.lock().sinks.get(&subscription_id).cloned();
        if let Some(sink) = sink {
            sink.on_data_change(client_handle, value);
        }
    }

    /// Delivers a notification through the owning subscription's sink.
    pub fn push(&self, client_handle: u32, value: AttributeValue) {
        let sink = {
            let state = self.subscriptions.lock();
            state
                .handles
                .get(&client_handle)
                .and_then(|sub| state.sinks.get(sub))
                .cloned()
        };
        if let Some(sink) = sink {
            sink.on_data_change(client_handle, value);
        }
    }
}

#[async_trait]
impl OpcUaSession for FakeSession {
    fn session_id(&self) -> String {
        "fake-session".to_string()
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(OpcUaError::session(SessionError::close_failed("scripted")));
        }
        Ok(())
    }

    async fn browse(&self, nodes: &[BrowseDescription]) -> OpcUaResult<Vec<BrowseResult>> {
        self.browse_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_browse.lock() = nodes.first().cloned();

        let delay = *self.browse_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .browse_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            let node = nodes.first().map(|d| d.node_id.to_string()).unwrap_or_default();
            return Err(OpcUaError::browse_failed(node, "scripted failure"));
        }

        let children = self.children.lock();
        let statuses = self.browse_status.lock();
        Ok(nodes
            .iter()
            .map(|d| BrowseResult {
                status: statuses.get(&d.node_id).copied().unwrap_or(StatusCode::GOOD),
                references: children.get(&d.node_id).cloned().unwrap_or_default(),
            })
            .collect())
    }

    async fn read(&self, nodes: &[ReadValueId]) -> OpcUaResult<Vec<AttributeValue>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let attributes = self.attributes.lock();
        let limit = self.read_limit.lock().unwrap_or(usize::MAX);
        Ok(nodes
            .iter()
            .take(limit)
            .map(|r| {
                attributes
                    .get(&(r.node_id.clone(), r.attribute_id))
                    .cloned()
                    .unwrap_or_else(|| AttributeValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID))
            })
            .collect())
    }

    async fn write(&self, values: &[WriteValue]) -> OpcUaResult<Vec<StatusCode>> {
        let status = *self.write_status.lock();
        let mut attributes = self.attributes.lock();
        let mut writes = self.writes.lock();
        Ok(values
            .iter()
            .map(|w| {
                writes.push(w.clone());
                if status.is_good() {
                    let entry = attributes
                        .entry((w.node_id.clone(), w.attribute_id))
                        .or_default();
                    entry.value = w.value.clone();
                    entry.status = StatusCode::GOOD;
                }
                status
            })
            .collect())
    }

    async fn create_subscription(
        &self,
        params: &SubscriptionParameters,
        sink: Arc<dyn DataChangeSink>,
    ) -> OpcUaResult<RevisedSubscription> {
        let mut state = self.subscriptions.lock();
        state.next_id += 1;
        state.created += 1;
        let id = state.next_id;
        state.sinks.insert(id, sink);
        Ok(RevisedSubscription {
            subscription_id: id,
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
        if !self.subscriptions.lock().sinks.contains_key(&subscription_id) {
            return Err(OpcUaError::subscription(SubscriptionError::not_found(subscription_id)));
        }
        Ok(RevisedSubscription {
            subscription_id,
            publishing_interval: params.publishing_interval,
            lifetime_count: params.lifetime_count,
            keepalive_count: params.keepalive_count,
        })
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        if self.fail_delete.lock().contains(&subscription_id) {
            return Err(OpcUaError::subscription(SubscriptionError::delete_failed(
                subscription_id,
                "scripted",
            )));
        }
        let mut state = self.subscriptions.lock();
        state.sinks.remove(&subscription_id);
        state.handles.retain(|_, sub| *sub != subscription_id);
        Ok(())
    }

    async fn create_monitored_items(
        &self,
        subscription_id: u32,
        _timestamps: TimestampsToReturn,
        items: &[MonitoredItemRequest],
    ) -> OpcUaResult<Vec<MonitoredItemResult>> {
        let rejected = self.rejected.lock().clone();
        let mut state = self.subscriptions.lock();
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            state.requests.push(item.clone());
            if rejected.contains(&item.node_id) {
                results.push(MonitoredItemResult {
                    status: StatusCode::BAD_NODE_ID_UNKNOWN,
                    monitored_item_id: 0,
                    sampling_interval: Duration::ZERO,
                    queue_size: 0,
                });
                continue;
            }
            state.next_item_id += 1;
            let id = state.next_item_id;
            state.handles.insert(item.client_handle, subscription_id);
            results.push(MonitoredItemResult {
                status: StatusCode::GOOD,
                monitored_item_id: id,
                sampling_interval: item.sampling_interval,
                queue_size: item.queue_size,
            });
        }
        Ok(results)
    }

    async fn delete_monitored_items(
        &self,
        _subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> OpcUaResult<Vec<StatusCode>> {
        Ok(vec![StatusCode::GOOD; monitored_item_ids.len()])
    }
}

// =============================================================================
// FakeTransport
// =============================================================================

/// Transport handing out one shared [`FakeSession`].
pub struct FakeTransport {
    endpoints: Vec<EndpointDescription>,
    session: Arc<FakeSession>,
    last_config: Mutex<Option<SessionConfig>>,
    events: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    opens: AtomicU32,
    fail_release: AtomicBool,
    released: AtomicBool,
}

impl FakeTransport {
    /// Transport offering `endpoints`.
    pub fn with_endpoints(endpoints: Vec<EndpointDescription>) -> Arc<Self> {
        Arc::new(Self {
            endpoints,
            session: Arc::new(FakeSession::default()),
            last_config: Mutex::new(None),
            events: Mutex::new(None),
            opens: AtomicU32::new(0),
            fail_release: AtomicBool::new(false),
            released: AtomicBool::new(false),
        })
    }

    /// Transport offering one unsecured endpoint at `url`.
    pub fn single(url: &str) -> Arc<Self> {
        Self::with_endpoints(vec![endpoint(url, SecurityMode::None, 0)])
    }

    /// The shared session.
    pub fn session(&self) -> &Arc<FakeSession> {
        &self.session
    }

    /// Configuration of the last opened session.
    pub fn last_config(&self) -> Option<SessionConfig> {
        self.last_config.lock().clone()
    }

    /// Number of opened sessions.
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Emits an activity event on the latest session.
    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Makes `release` fail.
    pub fn fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    /// `release` was called.
    pub fn release_called(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OpcUaTransport for FakeTransport {
    async fn get_endpoints(&self, _url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        Ok(self.endpoints.clone())
    }

    async fn open_session(
        &self,
        config: &SessionConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> OpcUaResult<Arc<dyn OpcUaSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock() = Some(config.clone());
        *self.events.lock() = Some(events);
        Ok(Arc::clone(&self.session) as Arc<dyn OpcUaSession>)
    }

    async fn release(&self, _timeout: Duration) -> OpcUaResult<()> {
        self.released.store(true, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(OpcUaError::session_failed("scripted release failure"));
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        "fake".to_string()
    }
}
