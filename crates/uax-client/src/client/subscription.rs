// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA subscription management.
//!
//! One subscription exists per requested publishing interval; monitored
//! items are added to the subscription matching their interval. A node can
//! be monitored at most once per session, across all subscriptions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SubscriptionManager                      │
//! │  registry (per session generation)                           │
//! │    500ms ─► [h1 ns=2;s=A] [h2 ns=2;s=B]                      │
//! │   1000ms ─► [h3 ns=2;s=C]                                    │
//! └──────────────────────────────────────────────────────────────┘
//!            ▲ create/delete                     │ client handle
//!            │                                   ▼
//!      OpcUaSession ──on_data_change──► NotificationRouter ──► ValueStream
//! ```
//!
//! Every monitored item gets its own [`ValueStream`]. Notifications for one
//! client handle arrive in server order; dropping the stream stops delivery
//! but leaves the server-side item in place.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace, warn};

use crate::client::session::{ActiveSession, SessionManager};
use crate::client::transport::{
    AttributeValue, DataChangeSink, MonitoredItemRequest, SubscriptionParameters,
};
use crate::error::{OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::{AttributeId, MonitoringMode, NodeId, StatusCode, SubscriptionSettings};

// =============================================================================
// IDs
// =============================================================================

/// Server-assigned subscription identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u32);

impl SubscriptionId {
    /// Returns the raw value.
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl From<u32> for SubscriptionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Snapshot of one monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemInfo {
    /// Session-unique client handle.
    pub client_handle: u32,
    /// Server-assigned item id.
    pub monitored_item_id: u32,
    /// Monitored node.
    pub node_id: NodeId,
    /// Revised sampling interval.
    pub sampling_interval: Duration,
    /// Revised queue size.
    pub queue_size: u32,
    /// Discard oldest on overflow.
    pub discard_oldest: bool,
    /// Monitoring mode.
    pub monitoring_mode: MonitoringMode,
    /// Last value received.
    pub last_value: Option<AttributeValue>,
    /// Status of the last value, `Good` before the first one.
    pub last_status: StatusCode,
}

/// Snapshot of one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    /// Subscription id.
    pub id: SubscriptionId,
    /// Interval the subscription was requested with.
    pub requested_interval: Duration,
    /// Interval the server granted.
    pub revised_interval: Duration,
    /// Monitored items in creation order.
    pub items: Vec<MonitoredItemInfo>,
}

impl SubscriptionInfo {
    /// Returns the item for `node_id`.
    pub fn item_for(&self, node_id: &NodeId) -> Option<&MonitoredItemInfo> {
        self.items.iter().find(|i| &i.node_id == node_id)
    }
}

/// Outcome of [`SubscriptionManager::resubscribe_all`].
#[derive(Debug, Default)]
pub struct ResubscribeSummary {
    /// Subscriptions recreated.
    pub subscriptions: usize,
    /// Monitored items recreated.
    pub items: usize,
    /// Nodes that could not be monitored again, with the reason.
    pub failed: Vec<(NodeId, String)>,
}

// =============================================================================
// ValueStream
// =============================================================================

/// Per-item stream of value notifications.
#[derive(Debug)]
pub struct ValueStream {
    client_handle: u32,
    receiver: mpsc::UnboundedReceiver<AttributeValue>,
}

impl ValueStream {
    /// Returns the client handle this stream belongs to.
    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    /// Waits for the next value. `None` once the item is removed.
    pub async fn recv(&mut self) -> Option<AttributeValue> {
        self.receiver.recv().await
    }

    /// Returns a value if one is ready.
    pub fn try_recv(&mut self) -> Option<AttributeValue> {
        self.receiver.try_recv().ok()
    }
}

/// A freshly created monitored item and its value stream.
#[derive(Debug)]
pub struct MonitoredItemHandle {
    /// Subscription the item belongs to.
    pub subscription_id: SubscriptionId,
    /// Item snapshot at creation.
    pub item: MonitoredItemInfo,
    /// Value notifications.
    pub values: ValueStream,
}

// =============================================================================
// NotificationRouter
// =============================================================================

#[derive(Debug)]
struct Route {
    sender: Option<mpsc::UnboundedSender<AttributeValue>>,
    last_value: Option<AttributeValue>,
}

/// Routes data changes to per-handle streams.
///
/// Client handles restart with every session, so routes belong to one
/// session generation. Notifications tagged with another generation are
/// counted as unrouted.
#[derive(Debug, Default)]
struct NotificationRouter {
    routes: DashMap<u32, Route>,
    generation: AtomicU64,
    delivered: AtomicU64,
    unrouted: AtomicU64,
}

impl NotificationRouter {
    /// Switches to `generation`, dropping every route of the previous one.
    fn begin_generation(&self, generation: u64) {
        if self.generation.swap(generation, Ordering::SeqCst) != generation {
            self.routes.clear();
        }
    }

    fn deliver(&self, generation: u64, client_handle: u32, value: AttributeValue) {
        if self.generation.load(Ordering::SeqCst) != generation {
            self.unrouted.fetch_add(1, Ordering::Relaxed);
            trace!(generation, client_handle, "Notification from a replaced session");
            return;
        }
        let Some(mut route) = self.routes.get_mut(&client_handle) else {
            self.unrouted.fetch_add(1, Ordering::Relaxed);
            trace!(client_handle, "Notification for unknown client handle");
            return;
        };

        route.last_value = Some(value.clone());
        if let Some(sender) = &route.sender {
            if sender.send(value).is_err() {
                debug!(client_handle, "Value stream dropped, delivery stopped");
                route.sender = None;
            }
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn register(&self, client_handle: u32) -> ValueStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.insert(
            client_handle,
            Route {
                sender: Some(tx),
                last_value: None,
            },
        );
        ValueStream {
            client_handle,
            receiver: rx,
        }
    }

    fn unregister(&self, client_handle: u32) {
        self.routes.remove(&client_handle);
    }

    fn take(&self, client_handle: u32) -> Option<Route> {
        self.routes.remove(&client_handle).map(|(_, route)| route)
    }

    fn restore(&self, client_handle: u32, route: Route) {
        self.routes.insert(client_handle, route);
    }

    fn last_value(&self, client_handle: u32) -> Option<AttributeValue> {
        self.routes
            .get(&client_handle)
            .and_then(|r| r.last_value.clone())
    }
}

/// The sink handed to one session's subscriptions.
struct SessionSink {
    generation: u64,
    router: Arc<NotificationRouter>,
}

impl DataChangeSink for SessionSink {
    fn on_data_change(&self, client_handle: u32, value: AttributeValue) {
        self.router.deliver(self.generation, client_handle, value);
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Clone)]
struct ItemEntry {
    client_handle: u32,
    monitored_item_id: u32,
    node_id: NodeId,
    sampling_interval: Duration,
    queue_size: u32,
    discard_oldest: bool,
    monitoring_mode: MonitoringMode,
}

#[derive(Debug, Clone)]
struct SubscriptionEntry {
    id: u32,
    requested_interval: Duration,
    revised_interval: Duration,
    settings: SubscriptionSettings,
    items: Vec<ItemEntry>,
}

#[derive(Debug, Default)]
struct Registry {
    generation: Option<u64>,
    subscriptions: Vec<SubscriptionEntry>,
}

impl Registry {
    fn is_monitored(&self, node_id: &NodeId) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.items.iter().any(|i| &i.node_id == node_id))
    }

    fn position(&self, id: SubscriptionId) -> OpcUaResult<usize> {
        self.subscriptions
            .iter()
            .position(|s| s.id == id.0)
            .ok_or_else(|| OpcUaError::subscription(SubscriptionError::not_found(id.0)))
    }
}

// =============================================================================
// SubscriptionManager
// =============================================================================

/// Creates, reuses and removes subscriptions and monitored items.
pub struct SubscriptionManager {
    sessions: Arc<SessionManager>,
    registry: Mutex<Registry>,
    router: Arc<NotificationRouter>,
}

impl SubscriptionManager {
    /// Creates a manager bound to `sessions`.
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            registry: Mutex::new(Registry::default()),
            router: Arc::new(NotificationRouter::default()),
        }
    }

    // =========================================================================
    // Subscribe
    // =========================================================================

    /// Monitors `node_id`, reusing the subscription for `interval` if one
    /// exists.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` without a session.
    /// - `SubscriptionError::AlreadyMonitored` if any subscription already
    ///   monitors the node; nothing is created in that case.
    /// - `SubscriptionError::MonitoredItemFailed` if the server rejects the
    ///   item. A subscription created for the call is kept.
    pub async fn subscribe(
        &self,
        node_id: NodeId,
        interval: Duration,
    ) -> OpcUaResult<(SubscriptionInfo, MonitoredItemHandle)> {
        let (subscription, mut outcomes) = self.subscribe_many(vec![node_id], interval).await?;
        let outcome = outcomes.pop().ok_or_else(|| {
            OpcUaError::subscription(SubscriptionError::creation_failed("empty item result"))
        })?;
        Ok((subscription, outcome?))
    }

    /// Monitors several nodes at one interval.
    ///
    /// Per-node failures (already monitored, rejected by the server) are
    /// reported in the returned list, in input order; the rest succeed.
    ///
    /// # Errors
    ///
    /// Fails as a whole without a session, when the subscription or the
    /// create request itself fails, or with `AlreadyMonitored` for the first
    /// node when every node is already monitored. Nothing is created in the
    /// last case.
    pub async fn subscribe_many(
        &self,
        node_ids: Vec<NodeId>,
        interval: Duration,
    ) -> OpcUaResult<(SubscriptionInfo, Vec<OpcUaResult<MonitoredItemHandle>>)> {
        let active = self.sessions.current()?;
        let mut registry = self.registry.lock().await;
        self.sync_generation(&mut registry, &active);

        let mut seen = HashSet::new();
        let mut rejected = Vec::with_capacity(node_ids.len());
        for node_id in &node_ids {
            let duplicate = registry.is_monitored(node_id) || !seen.insert(node_id.clone());
            if duplicate {
                debug!(node_id = %node_id, "Node already monitored");
            }
            rejected.push(duplicate);
        }
        if let Some(first) = node_ids.first().filter(|_| rejected.iter().all(|r| *r)) {
            return Err(OpcUaError::already_monitored(first.to_string()));
        }

        let index = self.ensure_subscription(&mut registry, &active, interval).await?;
        let subscription_id = registry.subscriptions[index].id;

        let item_settings = &self.sessions.config().monitored_item;
        let mut requests = Vec::new();
        let mut streams = Vec::new();
        for (node_id, _) in node_ids.iter().zip(&rejected).filter(|(_, r)| !**r) {
            let client_handle = active.next_client_handle();
            streams.push(self.router.register(client_handle));
            requests.push(MonitoredItemRequest {
                node_id: node_id.clone(),
                attribute_id: AttributeId::Value,
                client_handle,
                sampling_interval: interval,
                queue_size: item_settings.queue_size,
                discard_oldest: item_settings.discard_oldest,
                monitoring_mode: item_settings.monitoring_mode,
            });
        }

        let results = if requests.is_empty() {
            Vec::new()
        } else {
            match active
                .session()
                .create_monitored_items(subscription_id, item_settings.timestamps, &requests)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    for request in &requests {
                        self.router.unregister(request.client_handle);
                    }
                    return Err(e);
                }
            }
        };

        let mut created = requests
            .into_iter()
            .zip(streams)
            .enumerate()
            .map(|(i, (request, values))| {
                let Some(result) = results.get(i) else {
                    self.router.unregister(request.client_handle);
                    return Err(OpcUaError::subscription(
                        SubscriptionError::monitored_item_failed(
                            request.node_id.to_string(),
                            "server returned no result",
                        ),
                    ));
                };
                if result.status.is_bad() {
                    self.router.unregister(request.client_handle);
                    warn!(
                        node_id = %request.node_id,
                        status = %result.status,
                        "Monitored item rejected"
                    );
                    return Err(OpcUaError::subscription(
                        SubscriptionError::monitored_item_failed(
                            request.node_id.to_string(),
                            result.status.to_string(),
                        ),
                    ));
                }
                let entry = ItemEntry {
                    client_handle: request.client_handle,
                    monitored_item_id: result.monitored_item_id,
                    node_id: request.node_id,
                    sampling_interval: result.sampling_interval,
                    queue_size: result.queue_size,
                    discard_oldest: request.discard_oldest,
                    monitoring_mode: request.monitoring_mode,
                };
                Ok((entry, values))
            })
            .collect::<Vec<_>>()
            .into_iter();

        let mut outcomes = Vec::with_capacity(node_ids.len());
        for (node_id, duplicate) in node_ids.iter().zip(rejected) {
            if duplicate {
                outcomes.push(Err(OpcUaError::already_monitored(node_id.to_string())));
                continue;
            }
            let outcome = match created.next() {
                Some(Ok((entry, values))) => {
                    info!(
                        subscription_id,
                        client_handle = entry.client_handle,
                        node_id = %entry.node_id,
                        interval_ms = interval.as_millis() as u64,
                        "Monitoring node"
                    );
                    let item = self.item_info(&entry);
                    registry.subscriptions[index].items.push(entry);
                    Ok(MonitoredItemHandle {
                        subscription_id: SubscriptionId(subscription_id),
                        item,
                        values,
                    })
                }
                Some(Err(e)) => Err(e),
                None => Err(OpcUaError::subscription(
                    SubscriptionError::monitored_item_failed(node_id.to_string(), "not requested"),
                )),
            };
            outcomes.push(outcome);
        }

        Ok((self.subscription_info(&registry.subscriptions[index]), outcomes))
    }

    async fn ensure_subscription(
        &self,
        registry: &mut Registry,
        active: &ActiveSession,
        interval: Duration,
    ) -> OpcUaResult<usize> {
        if let Some(index) = registry
            .subscriptions
            .iter()
            .position(|s| s.requested_interval == interval)
        {
            return Ok(index);
        }

        let settings = self.sessions.config().subscription.clone();
        let params = Self::parameters(interval, &settings);
        let revised = active
            .session()
            .create_subscription(&params, self.sink(active))
            .await?;

        info!(
            subscription_id = revised.subscription_id,
            interval_ms = interval.as_millis() as u64,
            revised_ms = revised.publishing_interval.as_millis() as u64,
            "Created subscription"
        );
        registry.subscriptions.push(SubscriptionEntry {
            id: revised.subscription_id,
            requested_interval: interval,
            revised_interval: revised.publishing_interval,
            settings,
            items: Vec::new(),
        });
        Ok(registry.subscriptions.len() - 1)
    }

    fn parameters(interval: Duration, settings: &SubscriptionSettings) -> SubscriptionParameters {
        SubscriptionParameters {
            publishing_interval: interval,
            lifetime_count: settings.lifetime_count,
            keepalive_count: settings.keepalive_count,
            max_notifications_per_publish: settings.max_notifications_per_publish,
            priority: settings.priority,
            publishing_enabled: settings.publishing_enabled,
        }
    }

    fn sink(&self, active: &ActiveSession) -> Arc<dyn DataChangeSink> {
        Arc::new(SessionSink {
            generation: active.generation(),
            router: Arc::clone(&self.router),
        })
    }

    /// Drops registry state and routes that belong to a replaced session.
    fn sync_generation(&self, registry: &mut Registry, active: &ActiveSession) {
        if registry.generation == Some(active.generation()) {
            return;
        }
        if !registry.subscriptions.is_empty() {
            warn!(
                stale = registry.subscriptions.len(),
                "Discarding subscriptions of a previous session"
            );
            registry.subscriptions.clear();
        }
        self.router.begin_generation(active.generation());
        registry.generation = Some(active.generation());
    }

    // =========================================================================
    // Modify
    // =========================================================================

    /// Changes the publishing interval and, optionally, the other
    /// subscription parameters. The subscription is then reused for the new
    /// interval.
    pub async fn modify_subscription(
        &self,
        id: SubscriptionId,
        interval: Duration,
        settings: Option<SubscriptionSettings>,
    ) -> OpcUaResult<SubscriptionInfo> {
        let active = self.sessions.current()?;
        let mut registry = self.registry.lock().await;
        self.sync_generation(&mut registry, &active);
        let index = registry.position(id)?;

        let settings = settings.unwrap_or_else(|| registry.subscriptions[index].settings.clone());
        let params = Self::parameters(interval, &settings);
        let revised = active.session().modify_subscription(id.0, &params).await?;

        let entry = &mut registry.subscriptions[index];
        entry.requested_interval = interval;
        entry.revised_interval = revised.publishing_interval;
        entry.settings = settings;
        info!(
            subscription_id = id.0,
            interval_ms = interval.as_millis() as u64,
            "Modified subscription"
        );
        Ok(self.subscription_info(entry))
    }

    // =========================================================================
    // Unsubscribe
    // =========================================================================

    /// Deletes a subscription with all its items.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> OpcUaResult<()> {
        let active = self.sessions.current()?;
        let mut registry = self.registry.lock().await;
        self.sync_generation(&mut registry, &active);
        let index = registry.position(id)?;

        active.session().delete_subscription(id.0).await?;
        self.remove_entry(&mut registry, index);
        Ok(())
    }

    /// Deletes one monitored item. The subscription is kept even when it
    /// becomes empty.
    pub async fn unsubscribe_item(
        &self,
        id: SubscriptionId,
        client_handle: u32,
    ) -> OpcUaResult<()> {
        let active = self.sessions.current()?;
        let mut registry = self.registry.lock().await;
        self.sync_generation(&mut registry, &active);
        let index = registry.position(id)?;

        let item_index = registry.subscriptions[index]
            .items
            .iter()
            .position(|i| i.client_handle == client_handle)
            .ok_or_else(|| {
                OpcUaError::subscription(SubscriptionError::monitored_item_not_found(client_handle))
            })?;
        let item = registry.subscriptions[index].items[item_index].clone();

        let statuses = active
            .session()
            .delete_monitored_items(id.0, &[item.monitored_item_id])
            .await?;
        if let Some(status) = statuses.first().filter(|s| s.is_bad()) {
            return Err(OpcUaError::subscription(SubscriptionError::monitored_item_failed(
                item.node_id.to_string(),
                status.to_string(),
            )));
        }

        registry.subscriptions[index].items.remove(item_index);
        self.router.unregister(client_handle);
        info!(
            subscription_id = id.0,
            client_handle,
            node_id = %item.node_id,
            "Removed monitored item"
        );
        Ok(())
    }

    /// Deletes every subscription.
    ///
    /// All deletions are attempted; the ones that succeed are removed even
    /// if others fail.
    ///
    /// # Errors
    ///
    /// The first deletion error.
    pub async fn unsubscribe_all(&self) -> OpcUaResult<()> {
        let active = self.sessions.current()?;
        let mut registry = self.registry.lock().await;
        self.sync_generation(&mut registry, &active);

        let ids: Vec<u32> = registry.subscriptions.iter().map(|s| s.id).collect();
        let mut first_error = None;
        for id in ids {
            match active.session().delete_subscription(id).await {
                Ok(()) => {
                    if let Ok(index) = registry.position(SubscriptionId(id)) {
                        self.remove_entry(&mut registry, index);
                    }
                }
                Err(e) => {
                    e.log("unsubscribe_all");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn remove_entry(&self, registry: &mut Registry, index: usize) {
        let entry = registry.subscriptions.remove(index);
        for item in &entry.items {
            self.router.unregister(item.client_handle);
        }
        info!(subscription_id = entry.id, items = entry.items.len(), "Deleted subscription");
    }

    // =========================================================================
    // Reconnect
    // =========================================================================

    /// Recreates every registered subscription and item on the current
    /// session.
    ///
    /// Items get fresh client handles; their existing [`ValueStream`]s keep
    /// receiving. Call after a reconnect and before new subscribes, which
    /// otherwise discard the previous session's registry.
    pub async fn resubscribe_all(&self) -> OpcUaResult<ResubscribeSummary> {
        let active = self.sessions.current()?;
        let mut registry = self.registry.lock().await;
        let mut summary = ResubscribeSummary::default();
        if registry.generation == Some(active.generation()) {
            return Ok(summary);
        }

        let previous = std::mem::take(&mut registry.subscriptions);
        registry.generation = Some(active.generation());

        // Handles restart on the new session, so detach every route first.
        let mut routes: HashMap<u32, Route> = previous
            .iter()
            .flat_map(|s| s.items.iter())
            .filter_map(|i| self.router.take(i.client_handle).map(|r| (i.client_handle, r)))
            .collect();
        self.router.begin_generation(active.generation());
        let sink = self.sink(&active);
        let timestamps = self.sessions.config().monitored_item.timestamps;

        for old in previous {
            let params = Self::parameters(old.requested_interval, &old.settings);
            let created = active
                .session()
                .create_subscription(&params, Arc::clone(&sink))
                .await;
            let revised = match created {
                Ok(revised) => revised,
                Err(e) => {
                    e.log("resubscribe");
                    for item in old.items {
                        summary.failed.push((item.node_id, e.to_string()));
                    }
                    continue;
                }
            };

            let mut entry = SubscriptionEntry {
                id: revised.subscription_id,
                requested_interval: old.requested_interval,
                revised_interval: revised.publishing_interval,
                settings: old.settings,
                items: Vec::with_capacity(old.items.len()),
            };

            let requests: Vec<MonitoredItemRequest> = old
                .items
                .iter()
                .map(|item| {
                    let client_handle = active.next_client_handle();
                    if let Some(route) = routes.remove(&item.client_handle) {
                        self.router.restore(client_handle, route);
                    }
                    MonitoredItemRequest {
                        node_id: item.node_id.clone(),
                        attribute_id: AttributeId::Value,
                        client_handle,
                        sampling_interval: old.requested_interval,
                        queue_size: item.queue_size,
                        discard_oldest: item.discard_oldest,
                        monitoring_mode: item.monitoring_mode,
                    }
                })
                .collect();

            let results = if requests.is_empty() {
                Ok(Vec::new())
            } else {
                active
                    .session()
                    .create_monitored_items(entry.id, timestamps, &requests)
                    .await
            };

            match results {
                Ok(results) => {
                    for (i, request) in requests.into_iter().enumerate() {
                        match results.get(i).filter(|r| r.status.is_good()) {
                            Some(result) => entry.items.push(ItemEntry {
                                client_handle: request.client_handle,
                                monitored_item_id: result.monitored_item_id,
                                node_id: request.node_id,
                                sampling_interval: result.sampling_interval,
                                queue_size: result.queue_size,
                                discard_oldest: request.discard_oldest,
                                monitoring_mode: request.monitoring_mode,
                            }),
                            None => {
                                self.router.unregister(request.client_handle);
                                let reason = results
                                    .get(i)
                                    .map(|r| r.status.to_string())
                                    .unwrap_or_else(|| "server returned no result".to_string());
                                warn!(
                                    node_id = %request.node_id,
                                    %reason,
                                    "Monitored item not restored"
                                );
                                summary.failed.push((request.node_id, reason));
                            }
                        }
                    }
                }
                Err(e) => {
                    e.log("resubscribe items");
                    for request in requests {
                        self.router.unregister(request.client_handle);
                        summary.failed.push((request.node_id, e.to_string()));
                    }
                }
            }

            summary.subscriptions += 1;
            summary.items += entry.items.len();
            registry.subscriptions.push(entry);
        }

        info!(
            subscriptions = summary.subscriptions,
            items = summary.items,
            failed = summary.failed.len(),
            "Resubscribed after reconnect"
        );
        Ok(summary)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns snapshots of all subscriptions of the current session.
    pub async fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let registry = self.registry.lock().await;
        if registry.generation != self.sessions.generation() {
            return Vec::new();
        }
        registry
            .subscriptions
            .iter()
            .map(|s| self.subscription_info(s))
            .collect()
    }

    /// Returns the number of subscriptions on the current session.
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions().await.len()
    }

    /// Returns the last value received for `client_handle`.
    pub fn last_value(&self, client_handle: u32) -> Option<AttributeValue> {
        self.router.last_value(client_handle)
    }

    /// Returns the number of notifications routed to an item.
    pub fn notifications_delivered(&self) -> u64 {
        self.router.delivered.load(Ordering::Relaxed)
    }

    /// Returns the number of notifications for unknown client handles.
    pub fn notifications_unrouted(&self) -> u64 {
        self.router.unrouted.load(Ordering::Relaxed)
    }

    fn item_info(&self, item: &ItemEntry) -> MonitoredItemInfo {
        let last_value = self.router.last_value(item.client_handle);
        MonitoredItemInfo {
            client_handle: item.client_handle,
            monitored_item_id: item.monitored_item_id,
            node_id: item.node_id.clone(),
            sampling_interval: item.sampling_interval,
            queue_size: item.queue_size,
            discard_oldest: item.discard_oldest,
            monitoring_mode: item.monitoring_mode,
            last_status: last_value.as_ref().map(|v| v.status).unwrap_or_default(),
            last_value,
        }
    }

    fn subscription_info(&self, entry: &SubscriptionEntry) -> SubscriptionInfo {
        SubscriptionInfo {
            id: SubscriptionId(entry.id),
            requested_interval: entry.requested_interval,
            revised_interval: entry.revised_interval,
            items: entry.items.iter().map(|i| self.item_info(i)).collect(),
        }
    }
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("routes", &self.router.routes.len())
            .field("delivered", &self.notifications_delivered())
            .field("unrouted", &self.notifications_unrouted())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::Variant;
    use crate::testing::FakeTransport;
    use crate::types::{ClientConfig, Identity};

    const URL: &str = "opc.tcp://host:4840";
    const INTERVAL: Duration = Duration::from_millis(500);

    async fn connected() -> (Arc<FakeTransport>, Arc<SessionManager>, SubscriptionManager) {
        let transport = FakeTransport::single(URL);
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&transport) as Arc<dyn crate::client::OpcUaTransport>,
            ClientConfig::default(),
        ));
        sessions.connect(URL, None, Identity::Anonymous).await.unwrap();
        let manager = SubscriptionManager::new(Arc::clone(&sessions));
        (transport, sessions, manager)
    }

    #[tokio::test]
    async fn test_subscribe_requires_session() {
        let transport = FakeTransport::single(URL);
        let sessions = Arc::new(SessionManager::new(transport, ClientConfig::default()));
        let manager = SubscriptionManager::new(sessions);

        let err = manager
            .subscribe(NodeId::string(2, "A"), INTERVAL)
            .await
            .unwrap_err();
        assert!(err.is_not_connected());
    }

    #[tokio::test]
    async fn test_subscribe_uses_item_defaults() {
        let (transport, _sessions, manager) = connected().await;

        let (subscription, handle) = manager
            .subscribe(NodeId::string(2, "A"), INTERVAL)
            .await
            .unwrap();
        assert_eq!(subscription.requested_interval, INTERVAL);
        assert_eq!(subscription.items.len(), 1);

        let requests = transport.session().monitored_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].queue_size, 10);
        assert!(requests[0].discard_oldest);
        assert_eq!(requests[0].monitoring_mode, MonitoringMode::Reporting);
        assert_eq!(requests[0].sampling_interval, INTERVAL);
        assert_eq!(requests[0].client_handle, handle.item.client_handle);
    }

    #[tokio::test]
    async fn test_same_node_twice_is_rejected() {
        let (transport, _sessions, manager) = connected().await;
        let node = NodeId::string(2, "A");

        manager.subscribe(node.clone(), INTERVAL).await.unwrap();
        let err = manager
            .subscribe(node.clone(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OpcUaError::Subscription(SubscriptionError::AlreadyMonitored { .. })
        ));
        assert_eq!(transport.session().monitored_requests().len(), 1);
        assert_eq!(transport.session().created_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_interval_reuse() {
        let (transport, _sessions, manager) = connected().await;

        let (a, _) = manager.subscribe(NodeId::string(2, "A"), INTERVAL).await.unwrap();
        let (b, _) = manager.subscribe(NodeId::string(2, "B"), INTERVAL).await.unwrap();
        let (c, _) = manager
            .subscribe(NodeId::string(2, "C"), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(transport.session().created_subscriptions(), 2);
        assert_eq!(manager.subscription_count().await, 2);
    }

    #[tokio::test]
    async fn test_subscribe_many_reports_per_item() {
        let (transport, _sessions, manager) = connected().await;
        transport.session().reject_item(NodeId::string(2, "Bad"));
        manager.subscribe(NodeId::string(2, "A"), INTERVAL).await.unwrap();

        let (subscription, outcomes) = manager
            .subscribe_many(
                vec![
                    NodeId::string(2, "A"),
                    NodeId::string(2, "B"),
                    NodeId::string(2, "Bad"),
                    NodeId::string(2, "B"),
                ],
                INTERVAL,
            )
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_err());
        assert!(outcomes[1].is_ok());
        assert!(matches!(
            outcomes[2],
            Err(OpcUaError::Subscription(SubscriptionError::MonitoredItemFailed { .. }))
        ));
        assert!(outcomes[3].is_err());
        assert_eq!(subscription.items.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_of_duplicates_creates_nothing() {
        let (transport, _sessions, manager) = connected().await;
        let node = NodeId::string(2, "A");
        manager.subscribe(node.clone(), INTERVAL).await.unwrap();

        let err = manager
            .subscribe_many(vec![node.clone(), node.clone()], Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OpcUaError::Subscription(SubscriptionError::AlreadyMonitored { .. })
        ));
        assert_eq!(transport.session().created_subscriptions(), 1);
        assert_eq!(transport.session().monitored_requests().len(), 1);
        assert_eq!(manager.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn test_values_are_routed_in_order() {
        let (transport, _sessions, manager) = connected().await;
        let (_, mut handle) = manager
            .subscribe(NodeId::string(2, "A"), INTERVAL)
            .await
            .unwrap();
        let client_handle = handle.item.client_handle;

        for i in 0..5 {
            transport
                .session()
                .push(client_handle, AttributeValue::good(Variant::Int32(i)));
        }
        for i in 0..5 {
            let value = handle.values.recv().await.unwrap();
            assert_eq!(value.value, Variant::Int32(i));
        }
        assert_eq!(
            manager.last_value(client_handle).unwrap().value,
            Variant::Int32(4)
        );
        assert_eq!(manager.notifications_delivered(), 5);
    }

    #[tokio::test]
    async fn test_dropped_stream_stops_delivery() {
        let (transport, _sessions, manager) = connected().await;
        let (_, handle) = manager
            .subscribe(NodeId::string(2, "A"), INTERVAL)
            .await
            .unwrap();
        let client_handle = handle.item.client_handle;
        drop(handle);

        transport
            .session()
            .push(client_handle, AttributeValue::good(Variant::Boolean(true)));
        assert_eq!(
            manager.last_value(client_handle).unwrap().value,
            Variant::Boolean(true)
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_item_keeps_empty_subscription() {
        let (_transport, _sessions, manager) = connected().await;
        let (subscription, handle) = manager
            .subscribe(NodeId::string(2, "A"), INTERVAL)
            .await
            .unwrap();

        manager
            .unsubscribe_item(subscription.id, handle.item.client_handle)
            .await
            .unwrap();

        let remaining = manager.subscriptions().await;
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].items.is_empty());

        let err = manager
            .unsubscribe_item(subscription.id, handle.item.client_handle)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "subscription");
    }

    #[tokio::test]
    async fn test_unsubscribe_all_partial_failure() {
        let (transport, _sessions, manager) = connected().await;
        let (a, _) = manager.subscribe(NodeId::string(2, "A"), INTERVAL).await.unwrap();
        let (b, _) = manager
            .subscribe(NodeId::string(2, "B"), Duration::from_secs(2))
            .await
            .unwrap();
        transport.session().fail_delete(a.id.0);

        assert!(manager.unsubscribe_all().await.is_err());
        let remaining = manager.subscriptions().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, a.id);
        assert_ne!(remaining[0].id, b.id);
    }

    #[tokio::test]
    async fn test_modify_rekeys_interval() {
        let (transport, _sessions, manager) = connected().await;
        let (a, _) = manager.subscribe(NodeId::string(2, "A"), INTERVAL).await.unwrap();

        let modified = manager
            .modify_subscription(a.id, Duration::from_secs(1), None)
            .await
            .unwrap();
        assert_eq!(modified.requested_interval, Duration::from_secs(1));

        let (b, _) = manager
            .subscribe(NodeId::string(2, "B"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(b.id, a.id);
        assert_eq!(transport.session().created_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_resubscribe_after_reconnect_keeps_streams() {
        let (transport, sessions, manager) = connected().await;
        let (_, mut handle) = manager
            .subscribe(NodeId::string(2, "A"), INTERVAL)
            .await
            .unwrap();
        sessions.connect(URL, None, Identity::Anonymous).await.unwrap();
        let summary = manager.resubscribe_all().await.unwrap();
        assert_eq!(summary.subscriptions, 1);
        assert_eq!(summary.items, 1);
        assert!(summary.failed.is_empty());

        let info = manager.subscriptions().await;
        let new_handle = info[0].items[0].client_handle;
        assert_eq!(info[0].items[0].node_id, NodeId::string(2, "A"));

        transport
            .session()
            .push(new_handle, AttributeValue::good(Variant::Double(1.5)));
        assert_eq!(handle.values.recv().await.unwrap().value, Variant::Double(1.5));
    }

    #[tokio::test]
    async fn test_replaced_session_notifications_are_dropped() {
        let (transport, sessions, manager) = connected().await;
        let (old, _old_handle) = manager
            .subscribe(NodeId::string(2, "A"), INTERVAL)
            .await
            .unwrap();
        let old_client_handle = old.items[0].client_handle;

        sessions.connect(URL, None, Identity::Anonymous).await.unwrap();
        let (new, mut new_handle) = manager
            .subscribe(NodeId::string(2, "B"), INTERVAL)
            .await
            .unwrap();
        assert_eq!(new.items[0].client_handle, old_client_handle);
        assert_ne!(new.id, old.id);

        transport.session().push_via(
            old.id.0,
            old_client_handle,
            AttributeValue::good(Variant::Int32(1)),
        );
        assert!(new_handle.values.try_recv().is_none());
        assert!(manager.last_value(old_client_handle).is_none());
        assert_eq!(manager.notifications_unrouted(), 1);

        transport
            .session()
            .push(old_client_handle, AttributeValue::good(Variant::Int32(2)));
        assert_eq!(new_handle.values.recv().await.unwrap().value, Variant::Int32(2));
        assert_eq!(manager.notifications_delivered(), 1);
    }
}
