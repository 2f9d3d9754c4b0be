// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA session management.
//!
//! [`SessionManager`] owns the single active session. It is the context
//! object every other component borrows the session from; nothing in the
//! crate keeps a session in ambient static state.
//!
//! ```text
//!                connect()                 open_session ok
//! Disconnected ───────────► Connecting ─────────────────────► Connected
//!      ▲                        │ failure                         │
//!      │                        ▼                                 │ disconnect()
//!      └──────────────── Disconnected ◄──── Disconnecting ◄───────┘
//! ```
//!
//! The active session is held behind an `Arc` and swapped wholesale; a
//! reader either sees the old session or the new one, never a mix. Each
//! session carries a generation number so dependents can detect that the
//! session they cached state for has been replaced.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::transport::{
    EndpointDescription, OpcUaSession, OpcUaTransport, SessionConfig, SessionEvent,
};
use crate::endpoint::{normalize_endpoint_url, select_endpoint};
use crate::error::{ConnectionError, OpcUaError, OpcUaResult, TimeoutError};
use crate::types::{ClientConfig, Identity};

// =============================================================================
// SessionState
// =============================================================================

/// Lifecycle state of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session.
    #[default]
    Disconnected,

    /// A session is being opened.
    Connecting,

    /// A session is active.
    Connected,

    /// The active session is being closed.
    Disconnecting,
}

impl SessionState {
    /// Returns `true` if a session is active.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if the state is transitional.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

// =============================================================================
// ConnectivityChange
// =============================================================================

/// A connectivity transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityChange {
    /// New state.
    pub connected: bool,
    /// Why the state changed, when known.
    pub cause: Option<String>,
}

/// Single-slot connectivity listener.
///
/// Registering replaces the previous listener, whose receiver then sees the
/// channel close. A change is only sent when the state actually flips.
#[derive(Debug, Default)]
struct ConnectivitySlot {
    sender: Mutex<Option<mpsc::UnboundedSender<ConnectivityChange>>>,
    connected: AtomicBool,
}

impl ConnectivitySlot {
    fn register(&self) -> mpsc::UnboundedReceiver<ConnectivityChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock() = Some(tx);
        rx
    }

    fn transition(&self, connected: bool, cause: Option<String>) -> bool {
        if self.connected.swap(connected, Ordering::SeqCst) == connected {
            return false;
        }
        debug!(connected, cause = ?cause, "Connectivity changed");
        if let Some(tx) = self.sender.lock().as_ref() {
            let _ = tx.send(ConnectivityChange { connected, cause });
        }
        true
    }
}

// =============================================================================
// ActiveSession
// =============================================================================

/// The live session plus its per-session bookkeeping.
pub struct ActiveSession {
    session: Arc<dyn OpcUaSession>,
    endpoint: EndpointDescription,
    identity: Identity,
    generation: u64,
    next_handle: AtomicU32,
    connected_at: DateTime<Utc>,
}

impl ActiveSession {
    fn new(
        session: Arc<dyn OpcUaSession>,
        endpoint: EndpointDescription,
        identity: Identity,
        generation: u64,
    ) -> Self {
        Self {
            session,
            endpoint,
            identity,
            generation,
            next_handle: AtomicU32::new(1),
            connected_at: Utc::now(),
        }
    }

    /// Returns the transport session.
    #[inline]
    pub fn session(&self) -> &Arc<dyn OpcUaSession> {
        &self.session
    }

    /// Returns the endpoint this session is connected to.
    pub fn endpoint(&self) -> &EndpointDescription {
        &self.endpoint
    }

    /// Returns the identity the session was activated with.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the generation; each new session gets a larger one.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns when the session was opened.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Allocates the next client handle. Handles are never reused within
    /// a session.
    pub fn next_client_handle(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("session_id", &self.session.session_id())
            .field("endpoint", &self.endpoint.endpoint_url)
            .field("identity", &self.identity)
            .field("generation", &self.generation)
            .finish()
    }
}

// =============================================================================
// SessionManager
// =============================================================================

/// Owns the single active OPC UA session.
///
/// # Thread Safety
///
/// All methods take `&self`; share the manager behind an `Arc`. Callers are
/// expected to serialize connect and disconnect themselves.
pub struct SessionManager {
    transport: Arc<dyn OpcUaTransport>,
    config: ClientConfig,
    state: RwLock<SessionState>,
    active: Arc<RwLock<Option<Arc<ActiveSession>>>>,
    generation: AtomicU64,
    connectivity: Arc<ConnectivitySlot>,
    stats: SessionStats,
}

impl SessionManager {
    /// Creates a session manager over `transport`.
    pub fn new(transport: Arc<dyn OpcUaTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            state: RwLock::new(SessionState::Disconnected),
            active: Arc::new(RwLock::new(None)),
            generation: AtomicU64::new(0),
            connectivity: Arc::new(ConnectivitySlot::default()),
            stats: SessionStats::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Returns `true` if a session is active.
    pub fn is_connected(&self) -> bool {
        self.active.read().is_some()
    }

    /// Returns the active session.
    ///
    /// # Errors
    ///
    /// `ConnectionError::NotConnected` when no session is active.
    pub fn current(&self) -> OpcUaResult<Arc<ActiveSession>> {
        self.active
            .read()
            .clone()
            .ok_or_else(OpcUaError::not_connected)
    }

    /// Returns the endpoint of the active session.
    pub fn active_endpoint(&self) -> Option<EndpointDescription> {
        self.active.read().as_ref().map(|s| s.endpoint.clone())
    }

    /// Returns the generation of the active session, if any.
    pub fn generation(&self) -> Option<u64> {
        self.active.read().as_ref().map(|s| s.generation)
    }

    /// Returns the session statistics.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Returns the transport's display name.
    pub fn transport_name(&self) -> String {
        self.transport.display_name()
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// Discovers the endpoints offered at `url`.
    ///
    /// # Errors
    ///
    /// Network errors from the transport, or `ConnectionError::TimedOut`
    /// after the request timeout.
    pub async fn resolve_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        debug!(url, "Resolving endpoints");
        let timeout = self.config.request_timeout;
        let endpoints = tokio::time::timeout(timeout, self.transport.get_endpoints(url))
            .await
            .map_err(|_| OpcUaError::connection(ConnectionError::timed_out(url, timeout)))??;
        debug!(url, count = endpoints.len(), "Resolved endpoints");
        Ok(endpoints)
    }

    /// Selects an endpoint using the configured policy.
    ///
    /// # Errors
    ///
    /// `ConnectionError::NoSuitableEndpoint` on an empty list.
    pub fn select_endpoint(
        &self,
        endpoints: &[EndpointDescription],
    ) -> OpcUaResult<EndpointDescription> {
        select_endpoint(endpoints, &self.config.endpoint_policy)
    }

    /// Builds the per-session configuration handed to the transport.
    pub fn session_config(
        &self,
        endpoint: EndpointDescription,
        identity: Identity,
    ) -> SessionConfig {
        SessionConfig {
            endpoint,
            identity,
            application_name: self.config.application_name.clone(),
            application_uri: self.config.application_uri.clone(),
            product_uri: self.config.product_uri.clone(),
            request_timeout: self.config.request_timeout,
            session_timeout: self.config.session_timeout,
            pki_dir: self.config.pki_dir.clone(),
            trust_server_certs: self.config.trust_server_certs,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects to `url`.
    ///
    /// When `endpoint` is `None` the endpoints are resolved and one is
    /// selected by policy. The endpoint URL is replaced with `url` if they
    /// differ. Any previous session is abandoned first.
    ///
    /// # Errors
    ///
    /// Resolution, selection and session creation errors. On failure no
    /// session is retained.
    pub async fn connect(
        &self,
        url: &str,
        endpoint: Option<EndpointDescription>,
        identity: Identity,
    ) -> OpcUaResult<Arc<ActiveSession>> {
        let previous = self.active.write().take();
        if let Some(previous) = previous {
            self.abandon(previous);
        }
        *self.state.write() = SessionState::Connecting;
        info!(url, identity = %identity, "Connecting");

        match self.open(url, endpoint, identity).await {
            Ok(active) => {
                *self.active.write() = Some(Arc::clone(&active));
                *self.state.write() = SessionState::Connected;
                self.stats.record_connect();
                self.connectivity.transition(true, None);
                info!(
                    url,
                    session_id = %active.session.session_id(),
                    generation = active.generation,
                    "Connected"
                );
                Ok(active)
            }
            Err(e) => {
                *self.state.write() = SessionState::Disconnected;
                self.stats.record_failure();
                e.log("connect");
                Err(e)
            }
        }
    }

    async fn open(
        &self,
        url: &str,
        endpoint: Option<EndpointDescription>,
        identity: Identity,
    ) -> OpcUaResult<Arc<ActiveSession>> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => {
                let endpoints = self.resolve_endpoints(url).await?;
                self.select_endpoint(&endpoints)?
            }
        };
        let endpoint = normalize_endpoint_url(endpoint, url);
        let config = self.session_config(endpoint, identity);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let timeout = self.config.request_timeout;
        let session = tokio::time::timeout(timeout, self.transport.open_session(&config, events_tx))
            .await
            .map_err(|_| OpcUaError::connection(ConnectionError::timed_out(url, timeout)))??;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.spawn_activity_listener(generation, events_rx);

        Ok(Arc::new(ActiveSession::new(
            session,
            config.endpoint,
            config.identity,
            generation,
        )))
    }

    fn abandon(&self, previous: Arc<ActiveSession>) {
        warn!(
            generation = previous.generation,
            "Abandoning previous session for new connection"
        );
        self.stats.record_abandon();
        self.connectivity
            .transition(false, Some("replaced by a new connection".to_string()));
        tokio::spawn(async move {
            if let Err(e) = previous.session.close().await {
                e.log("close abandoned session");
            }
        });
    }

    fn spawn_activity_listener(
        &self,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let active = Arc::clone(&self.active);
        let connectivity = Arc::clone(&self.connectivity);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let current = active.read().as_ref().map(|s| s.generation);
                if current != Some(generation) {
                    debug!(generation, "Ignoring event for inactive session generation");
                    continue;
                }
                match event {
                    SessionEvent::Active => {
                        connectivity.transition(true, None);
                    }
                    SessionEvent::Inactive { cause } => {
                        warn!(generation, cause = ?cause, "Session inactive");
                        connectivity.transition(false, cause);
                    }
                    SessionEvent::Fault { status } => {
                        warn!(generation, status = %status, "Session fault");
                    }
                }
            }
        });
    }

    /// Closes the active session.
    ///
    /// # Errors
    ///
    /// `ConnectionError::NotConnected` when there is no session; this has no
    /// side effects. Close errors are returned after the session has been
    /// dropped locally.
    pub async fn disconnect(&self) -> OpcUaResult<()> {
        let Some(active) = self.active.write().take() else {
            debug!("Disconnect without active session");
            return Err(OpcUaError::not_connected());
        };

        *self.state.write() = SessionState::Disconnecting;
        info!(generation = active.generation, "Disconnecting");

        let timeout = self.config.request_timeout;
        let result = tokio::time::timeout(timeout, active.session.close()).await;

        *self.state.write() = SessionState::Disconnected;
        self.stats.record_disconnect();
        self.connectivity.transition(false, None);

        match result {
            Ok(Ok(())) => {
                info!(generation = active.generation, "Disconnected");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(OpcUaError::timeout(TimeoutError::request(timeout))),
        }
    }

    /// Registers the connectivity listener, replacing any previous one.
    ///
    /// The receiver gets one message per transition.
    pub fn on_connectivity_changed(&self) -> mpsc::UnboundedReceiver<ConnectivityChange> {
        self.connectivity.register()
    }

    /// Disconnects and releases transport resources.
    ///
    /// Each step is bounded by the shutdown timeout. Errors are logged and
    /// never returned.
    pub async fn shutdown(&self) {
        let timeout = self.config.shutdown_timeout;
        info!(timeout = ?timeout, "Shutting down session manager");

        if self.is_connected() {
            match tokio::time::timeout(timeout, self.disconnect()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => e.log("shutdown disconnect"),
                Err(_) => warn!(timeout = ?timeout, "Disconnect timed out during shutdown"),
            }
            *self.state.write() = SessionState::Disconnected;
            self.connectivity
                .transition(false, Some("shutdown".to_string()));
        }

        match tokio::time::timeout(timeout, self.transport.release(timeout)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => e.log("shutdown release"),
            Err(_) => warn!(timeout = ?timeout, "Resource release timed out during shutdown"),
        }

        info!("Session manager shut down");
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("transport", &self.transport.display_name())
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}

// =============================================================================
// SessionStats
// =============================================================================

/// Counters for session lifecycle events.
#[derive(Debug, Default)]
pub struct SessionStats {
    connects: AtomicU64,
    disconnects: AtomicU64,
    failures: AtomicU64,
    abandoned: AtomicU64,
}

impl SessionStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_abandon(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Successful connects.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Disconnects of an active session.
    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }

    /// Failed connects.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Sessions replaced by a newer connect.
    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================
