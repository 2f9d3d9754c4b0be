// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client runtime integration tests.
//!
//! These tests drive the public API against an in-memory server model:
//!
//! ```text
//! UaClient ──► MockTransport ──► MockSession
//!                                  ├── address space (node → references)
//!                                  ├── value table (node, attribute → value)
//!                                  └── subscriptions (id → sink, items)
//! ```
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p uax-client --test client_integration
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use uax_client::client::transport::{
    BrowseDescription, BrowseResult, DataChangeSink, MonitoredItemRequest, MonitoredItemResult,
    ReadValueId, ReferenceDescription, RevisedSubscription, SessionConfig, SessionEvent,
    SubscriptionParameters, WriteValue,
};
use uax_client::{
    select_endpoint, AttributeId, AttributeValue, ClientConfig, EndpointDescription,
    EndpointPolicy, ExpandedNodeId, Identity, LocalizedText, NodeClass, NodeId, OpcUaError,
    OpcUaResult, OpcUaSession, OpcUaTransport, QualifiedName, SecurityMode, SecurityPolicy,
    StatusCode, SubscriptionError, TimestampsToReturn, UaClient, Variant,
};

const URL: &str = "opc.tcp://host:4840";

// =============================================================================
// Mock server
// =============================================================================

#[derive(Default)]
struct MockSubscriptions {
    next_id: u32,
    next_item_id: u32,
    live: HashMap<u32, Arc<dyn DataChangeSink>>,
    items: HashMap<u32, Vec<u32>>,
    created: usize,
}

#[derive(Default)]
struct MockSession {
    references: Mutex<HashMap<NodeId, Vec<ReferenceDescription>>>,
    browse_calls: Mutex<HashMap<NodeId, usize>>,
    browse_delay: Mutex<Duration>,
    values: Mutex<HashMap<(NodeId, AttributeId), AttributeValue>>,
    subscriptions: Mutex<MockSubscriptions>,
    closes: AtomicUsize,
}

impl MockSession {
    fn add_child(&self, parent: NodeId, child: NodeId, name: &str, class: NodeClass) {
        let type_definition = match class {
            NodeClass::Variable => NodeId::BASE_DATA_VARIABLE_TYPE,
            _ => NodeId::numeric(0, 58),
        };
        self.references
            .lock()
            .entry(parent)
            .or_default()
            .push(ReferenceDescription {
                reference_type_id: NodeId::numeric(0, 35),
                is_forward: true,
                node_id: ExpandedNodeId::local(child),
                browse_name: QualifiedName::new(2, name),
                display_name: LocalizedText::new(name),
                node_class: class,
                type_definition: ExpandedNodeId::local(type_definition),
            });
    }

    fn set_value(&self, node: NodeId, attribute: AttributeId, value: Variant) {
        self.values
            .lock()
            .insert((node, attribute), AttributeValue::good(value));
    }

    fn browse_calls(&self, node: &NodeId) -> usize {
        self.browse_calls.lock().get(node).copied().unwrap_or(0)
    }

    fn live_subscriptions(&self) -> usize {
        self.subscriptions.lock().live.len()
    }

    fn live_items(&self) -> usize {
        self.subscriptions.lock().items.values().map(Vec::len).sum()
    }

    fn created_subscriptions(&self) -> usize {
        self.subscriptions.lock().created
    }
}

#[async_trait]
impl OpcUaSession for MockSession {
    fn session_id(&self) -> String {
        "mock".to_string()
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn browse(&self, nodes: &[BrowseDescription]) -> OpcUaResult<Vec<BrowseResult>> {
        for node in nodes {
            *self.browse_calls.lock().entry(node.node_id.clone()).or_default() += 1;
        }
        let delay = *self.browse_delay.lock();
        tokio::time::sleep(delay).await;

        let references = self.references.lock();
        Ok(nodes
            .iter()
            .map(|d| BrowseResult {
                status: StatusCode::GOOD,
                references: references.get(&d.node_id).cloned().unwrap_or_default(),
            })
            .collect())
    }

    async fn read(&self, nodes: &[ReadValueId]) -> OpcUaResult<Vec<AttributeValue>> {
        let values = self.values.lock();
        Ok(nodes
            .iter()
            .map(|r| {
                values
                    .get(&(r.node_id.clone(), r.attribute_id))
                    .cloned()
                    .unwrap_or_else(|| AttributeValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID))
            })
            .collect())
    }

    async fn write(&self, values: &[WriteValue]) -> OpcUaResult<Vec<StatusCode>> {
        let mut table = self.values.lock();
        Ok(values
            .iter()
            .map(|w| {
                table.insert(
                    (w.node_id.clone(), w.attribute_id),
                    AttributeValue::good(w.value.clone()),
                );
                StatusCode::GOOD
            })
            .collect())
    }

    async fn create_subscription(
        &self,
        params: &SubscriptionParameters,
        sink: Arc<dyn DataChangeSink>,
    ) -> OpcUaResult<RevisedSubscription> {
        let mut subs = self.subscriptions.lock();
        subs.next_id += 1;
        subs.created += 1;
        let id = subs.next_id;
        subs.live.insert(id, sink);
        subs.items.insert(id, Vec::new());
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
        Ok(RevisedSubscription {
            subscription_id,
            publishing_interval: params.publishing_interval,
            lifetime_count: params.lifetime_count,
            keepalive_count: params.keepalive_count,
        })
    }

    async fn delete_subscription(&self, subscription_id: u32) -> OpcUaResult<()> {
        let mut subs = self.subscriptions.lock();
        subs.live.remove(&subscription_id);
        subs.items.remove(&subscription_id);
        Ok(())
    }

    async fn create_monitored_items(
        &self,
        subscription_id: u32,
        _timestamps: TimestampsToReturn,
        items: &[MonitoredItemRequest],
    ) -> OpcUaResult<Vec<MonitoredItemResult>> {
        let mut subs = self.subscriptions.lock();
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            subs.next_item_id += 1;
            let id = subs.next_item_id;
            subs.items.entry(subscription_id).or_default().push(id);
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
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> OpcUaResult<Vec<StatusCode>> {
        let mut subs = self.subscriptions.lock();
        if let Some(items) = subs.items.get_mut(&subscription_id) {
            items.retain(|id| !monitored_item_ids.contains(id));
        }
        Ok(vec![StatusCode::GOOD; monitored_item_ids.len()])
    }
}

struct MockTransport {
    endpoints: Vec<EndpointDescription>,
    session: Arc<MockSession>,
    opened: Mutex<Vec<SessionConfig>>,
}

impl MockTransport {
    fn new(endpoints: Vec<EndpointDescription>) -> Arc<Self> {
        Arc::new(Self {
            endpoints,
            session: Arc::new(MockSession::default()),
            opened: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn get_endpoints(&self, _url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        Ok(self.endpoints.clone())
    }

    async fn open_session(
        &self,
        config: &SessionConfig,
        _events: mpsc::UnboundedSender<SessionEvent>,
    ) -> OpcUaResult<Arc<dyn OpcUaSession>> {
        self.opened.lock().push(config.clone());
        Ok(Arc::clone(&self.session) as Arc<dyn OpcUaSession>)
    }

    async fn release(&self, _timeout: Duration) -> OpcUaResult<()> {
        Ok(())
    }

    fn display_name(&self) -> String {
        "mock".to_string()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn endpoint(level: u8) -> EndpointDescription {
    let (mode, policy) = if level == 0 {
        (SecurityMode::None, SecurityPolicy::None)
    } else {
        (SecurityMode::SignAndEncrypt, SecurityPolicy::Basic256Sha256)
    };
    EndpointDescription::new(URL, mode, policy.uri(), level)
}

/// A server with Objects → {Boiler (Object), Pressure (Variable)} and
/// Boiler → {Temperature, Setpoint}.
fn plant() -> Arc<MockTransport> {
    let transport = MockTransport::new(vec![endpoint(0)]);
    let session = &transport.session;

    session.add_child(NodeId::ROOT_FOLDER, NodeId::OBJECTS_FOLDER, "Objects", NodeClass::Object);
    session.add_child(
        NodeId::OBJECTS_FOLDER,
        NodeId::string(2, "Boiler"),
        "Boiler",
        NodeClass::Object,
    );
    session.add_child(
        NodeId::OBJECTS_FOLDER,
        NodeId::string(2, "Pressure"),
        "Pressure",
        NodeClass::Variable,
    );
    session.add_child(
        NodeId::string(2, "Boiler"),
        NodeId::string(2, "Boiler.Temperature"),
        "Temperature",
        NodeClass::Variable,
    );
    session.add_child(
        NodeId::string(2, "Boiler"),
        NodeId::string(2, "Boiler.Setpoint"),
        "Setpoint",
        NodeClass::Variable,
    );

    let setpoint = NodeId::string(2, "Boiler.Setpoint");
    session.set_value(setpoint.clone(), AttributeId::Value, Variant::Double(20.0));
    session.set_value(setpoint, AttributeId::DataType, Variant::NodeId(NodeId::numeric(0, 11)));
    transport
}

static INIT: Once = Once::new();

fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,uax_client=debug")),
            )
            .with_test_writer()
            .init();
    });
}

async fn connected(transport: &Arc<MockTransport>) -> UaClient {
    init_test_logging();
    let client = UaClient::new(
        Arc::clone(transport) as Arc<dyn OpcUaTransport>,
        ClientConfig::default(),
    );
    client
        .connect(URL, None, Identity::Anonymous)
        .await
        .expect("connect");
    client
}

// =============================================================================
// Tree
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_child_access_browses_once() {
    let transport = plant();
    *transport.session.browse_delay.lock() = Duration::from_millis(50);
    let client = connected(&transport).await;
    let tree = client.tree().clone();
    let root = tree.root();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let tree = tree.clone();
        tasks.push(tokio::spawn(async move { tree.expand(root).await }));
    }

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap().unwrap());
    }

    assert_eq!(transport.session.browse_calls(&NodeId::ROOT_FOLDER), 1);
    assert_eq!(results[0].len(), 1);
    assert!(results.iter().all(|children| children == &results[0]));
}

#[tokio::test]
async fn test_browse_scenario_expands_object_once() {
    let transport = plant();
    let client = connected(&transport).await;
    let tree = client.tree();

    let root_children = tree.expand(tree.root()).await.unwrap();
    let (objects, _) = root_children
        .iter()
        .find(|(_, node)| node.node_class == NodeClass::Object)
        .cloned()
        .expect("object child under root");

    *transport.session.browse_delay.lock() = Duration::from_millis(20);
    let (first, second) = tokio::join!(tree.expand(objects), tree.expand(objects));
    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert_eq!(first.len(), 2);
    assert_eq!(transport.session.browse_calls(&NodeId::OBJECTS_FOLDER), 1);

    // Expanded nodes answer from the tree.
    assert_eq!(tree.get_children(objects).unwrap(), first);
    assert_eq!(transport.session.browse_calls(&NodeId::OBJECTS_FOLDER), 1);
}

// =============================================================================
// Subscriptions
// =============================================================================

#[tokio::test]
async fn test_subscribe_same_node_twice_is_rejected() {
    let transport = plant();
    let client = connected(&transport).await;
    let node = NodeId::string(2, "Boiler.Temperature");
    let interval = Duration::from_millis(250);

    client.subscriptions().subscribe(node.clone(), interval).await.unwrap();
    let err = client
        .subscriptions()
        .subscribe(node, interval)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OpcUaError::Subscription(SubscriptionError::AlreadyMonitored { .. })
    ));
    assert_eq!(transport.session.live_items(), 1);
}

#[tokio::test]
async fn test_subscriptions_shared_per_interval() {
    let transport = plant();
    let client = connected(&transport).await;
    let subs = client.subscriptions();

    let (a, _ha) = subs
        .subscribe(NodeId::string(2, "Boiler.Temperature"), Duration::from_millis(500))
        .await
        .unwrap();
    let (b, _hb) = subs
        .subscribe(NodeId::string(2, "Boiler.Setpoint"), Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(transport.session.created_subscriptions(), 1);

    let (c, _hc) = subs
        .subscribe(NodeId::string(2, "Pressure"), Duration::from_millis(1000))
        .await
        .unwrap();
    assert_ne!(a.id, c.id);
    assert_eq!(transport.session.created_subscriptions(), 2);
    assert_eq!(subs.subscription_count().await, 2);
}

#[tokio::test]
async fn test_unsubscribe_all_clears_session() {
    let transport = plant();
    let client = connected(&transport).await;
    let subs = client.subscriptions();
    let interval = client.config().default_sampling_interval;

    subs.subscribe(NodeId::string(2, "Boiler.Temperature"), interval)
        .await
        .unwrap();
    subs.subscribe(NodeId::string(2, "Pressure"), interval)
        .await
        .unwrap();
    assert_eq!(transport.session.live_items(), 2);

    subs.unsubscribe_all().await.unwrap();

    assert_eq!(subs.subscription_count().await, 0);
    assert_eq!(transport.session.live_subscriptions(), 0);
    assert_eq!(transport.session.live_items(), 0);
}

#[tokio::test]
async fn test_notifications_reach_item_stream() {
    let transport = plant();
    let client = connected(&transport).await;
    let (info, mut handle) = client
        .subscriptions()
        .subscribe(NodeId::string(2, "Pressure"), Duration::from_millis(100))
        .await
        .unwrap();

    let sink = transport
        .session
        .subscriptions
        .lock()
        .live
        .get(&info.id.value())
        .cloned()
        .unwrap();
    for v in 1..=3 {
        sink.on_data_change(handle.values.client_handle(), AttributeValue::good(Variant::Int32(v)));
    }

    for v in 1..=3 {
        let update = handle.values.recv().await.unwrap();
        assert_eq!(update.value, Variant::Int32(v));
    }
}

// =============================================================================
// Attributes
// =============================================================================

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let transport = plant();
    let client = connected(&transport).await;
    let node = NodeId::string(2, "Boiler.Setpoint");

    let status = client.attributes().write_from_string(&node, "42.5").await.unwrap();
    assert!(status.is_good());

    let value = client.attributes().read_value(&node).await.unwrap();
    assert_eq!(value.value, Variant::Double(42.5));

    client
        .attributes()
        .write_attribute(&node, AttributeId::Value, Variant::Double(-1.25))
        .await
        .unwrap();
    let value = client.attributes().read_value(&node).await.unwrap();
    assert_eq!(value.value, Variant::Double(-1.25));
}

// =============================================================================
// Session
// =============================================================================

#[tokio::test]
async fn test_disconnect_twice_reports_not_connected() {
    let transport = plant();
    let client = connected(&transport).await;

    client.disconnect().await.unwrap();
    let err = client.disconnect().await.unwrap_err();

    assert!(err.is_not_connected());
    assert_eq!(transport.session.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_endpoint_selection_prefers_lowest_level() {
    let endpoints = vec![endpoint(3), endpoint(1), endpoint(2)];
    let selected = select_endpoint(&endpoints, &EndpointPolicy::LowestSecurity).unwrap();
    assert_eq!(selected.security_level, 1);

    let transport = MockTransport::new(endpoints);
    let _client = connected(&transport).await;
    let opened = transport.opened.lock();
    assert_eq!(opened[0].endpoint.security_level, 1);
}

#[tokio::test]
async fn test_operations_without_session_fail_fast() {
    let transport = plant();
    let client = UaClient::new(
        Arc::clone(&transport) as Arc<dyn OpcUaTransport>,
        ClientConfig::default(),
    );

    assert!(client
        .attributes()
        .read_value(&NodeId::SERVER_STATE)
        .await
        .unwrap_err()
        .is_not_connected());
    assert!(client
        .subscriptions()
        .subscribe(NodeId::string(2, "Pressure"), Duration::from_millis(500))
        .await
        .unwrap_err()
        .is_not_connected());
    assert!(client.tree().get_children(client.tree().root()).unwrap_err().is_not_connected());
}
