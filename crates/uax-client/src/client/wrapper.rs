// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! High-level client facade.
//!
//! [`UaClient`] wires the session manager, subscription manager, address
//! space tree and attribute accessor around one transport. It is the context
//! object a front end constructs at startup and tears down at shutdown.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::attributes::AttributeAccess;
use crate::error::OpcUaResult;
use crate::tree::AddressSpace;
use crate::types::{ClientConfig, Identity};

use super::session::{ActiveSession, SessionManager};
use super::subscription::{ResubscribeSummary, SubscriptionManager};
use super::transport::{EndpointDescription, OpcUaTransport};

/// All client components sharing one session.
pub struct UaClient {
    sessions: Arc<SessionManager>,
    subscriptions: SubscriptionManager,
    tree: AddressSpace,
    attributes: AttributeAccess,
}

impl UaClient {
    /// Creates a disconnected client.
    pub fn new(transport: Arc<dyn OpcUaTransport>, config: ClientConfig) -> Self {
        let sessions = Arc::new(SessionManager::new(transport, config));
        Self {
            subscriptions: SubscriptionManager::new(Arc::clone(&sessions)),
            tree: AddressSpace::new(Arc::clone(&sessions)),
            attributes: AttributeAccess::new(Arc::clone(&sessions)),
            sessions,
        }
    }

    /// Session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Subscription manager.
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Address space tree.
    pub fn tree(&self) -> &AddressSpace {
        &self.tree
    }

    /// Attribute accessor.
    pub fn attributes(&self) -> &AttributeAccess {
        &self.attributes
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        self.sessions.config()
    }

    /// Connects to `url`, resolving the endpoint unless one is given.
    pub async fn connect(
        &self,
        url: &str,
        endpoint: Option<EndpointDescription>,
        identity: Identity,
    ) -> OpcUaResult<Arc<ActiveSession>> {
        self.sessions.connect(url, endpoint, identity).await
    }

    /// Connects again and restores every subscription of the previous
    /// session. The tree rebuilds itself on next access.
    pub async fn reconnect(
        &self,
        url: &str,
        identity: Identity,
    ) -> OpcUaResult<ResubscribeSummary> {
        self.sessions.connect(url, None, identity).await?;
        let summary = self.subscriptions.resubscribe_all().await?;
        if !summary.failed.is_empty() {
            warn!(failed = summary.failed.len(), "Some monitored items were not restored");
        }
        Ok(summary)
    }

    /// Disconnects the current session.
    pub async fn disconnect(&self) -> OpcUaResult<()> {
        self.sessions.disconnect().await
    }

    /// Removes subscriptions, then shuts the session manager down. Never
    /// fails.
    pub async fn shutdown(&self) {
        if self.sessions.is_connected() {
            if let Err(e) = self.subscriptions.unsubscribe_all().await {
                e.log("shutdown");
            }
        }
        self.sessions.shutdown().await;
        info!("Client shut down");
    }
}

impl fmt::Debug for UaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UaClient")
            .field("sessions", &self.sessions)
            .field("tree", &self.tree)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use crate::types::NodeId;
    use std::time::Duration;

    #[tokio::test]
    async fn test_reconnect_restores_subscriptions() {
        let transport = FakeTransport::single("opc.tcp://host:4840");
        let client = UaClient::new(
            Arc::clone(&transport) as Arc<dyn OpcUaTransport>,
            ClientConfig::default(),
        );

        client
            .connect("opc.tcp://host:4840", None, Identity::Anonymous)
            .await
            .unwrap();
        client
            .subscriptions()
            .subscribe(NodeId::string(2, "A"), Duration::from_millis(500))
            .await
            .unwrap();

        let summary = client
            .reconnect("opc.tcp://host:4840", Identity::Anonymous)
            .await
            .unwrap();
        assert_eq!(summary.items, 1);
        assert_eq!(transport.session().created_subscriptions(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_without_session() {
        let transport = FakeTransport::single("opc.tcp://host:4840");
        let client = UaClient::new(
            Arc::clone(&transport) as Arc<dyn OpcUaTransport>,
            ClientConfig::default(),
        );
        client.shutdown().await;
        assert!(transport.release_called());
    }
}
