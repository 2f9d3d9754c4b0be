// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client runtime orchestration.
//!
//! - Transport construction
//! - Connect with the identity from the command line
//! - Connectivity logging
//! - Bounded teardown

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use uax_client::{ClientConfig, Identity, OpcUaTransport, UaClient};

use crate::cli::Cli;
use crate::error::{BinError, BinResult};

// =============================================================================
// Transport
// =============================================================================

/// Builds the protocol transport.
///
/// # Errors
///
/// `BinError::Initialization` when the binary was built without the
/// `real-transport` feature.
#[cfg(feature = "real-transport")]
pub fn build_transport(config: &ClientConfig) -> BinResult<Arc<dyn OpcUaTransport>> {
    Ok(Arc::new(uax_client::RealOpcUaTransport::new(config.clone())))
}

/// Builds the protocol transport.
///
/// # Errors
///
/// `BinError::Initialization` when the binary was built without the
/// `real-transport` feature.
#[cfg(not(feature = "real-transport"))]
pub fn build_transport(_config: &ClientConfig) -> BinResult<Arc<dyn OpcUaTransport>> {
    Err(BinError::init(
        "no OPC UA transport available; rebuild with `--features real-transport`",
    ))
}

/// Returns the identity selected by the command line.
pub fn identity_from_cli(cli: &Cli) -> Identity {
    match (&cli.username, &cli.password) {
        (Some(username), Some(password)) => Identity::user_name(username, password),
        _ => Identity::Anonymous,
    }
}

// =============================================================================
// ClientRuntime
// =============================================================================

/// A [`UaClient`] plus the connection parameters of one invocation.
pub struct ClientRuntime {
    client: UaClient,
    url: String,
    identity: Identity,
    watcher: Option<JoinHandle<()>>,
}

impl ClientRuntime {
    /// Creates a disconnected runtime.
    pub fn new(transport: Arc<dyn OpcUaTransport>, config: ClientConfig, cli: &Cli) -> Self {
        Self {
            client: UaClient::new(transport, config),
            url: cli.url.clone(),
            identity: identity_from_cli(cli),
            watcher: None,
        }
    }

    /// The client.
    pub fn client(&self) -> &UaClient {
        &self.client
    }

    /// The server URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connects and starts logging connectivity changes.
    pub async fn connect(&mut self) -> BinResult<()> {
        let mut changes = self.client.sessions().on_connectivity_changed();
        self.watcher = Some(tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                if change.connected {
                    info!("Session active");
                } else {
                    warn!(cause = ?change.cause, "Session inactive");
                }
            }
        }));

        let session = self
            .client
            .connect(&self.url, None, self.identity.clone())
            .await
            .map_err(|e| BinError::from(e).with_context(format!("connect to {}", self.url)))?;
        info!(
            endpoint = %session.endpoint(),
            identity = %self.identity.type_name(),
            transport = %self.client.sessions().transport_name(),
            "Connected"
        );
        Ok(())
    }

    /// Tears the client down. Never fails.
    pub async fn shutdown(mut self) {
        self.client.shutdown().await;
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

/// A runtime over the in-memory transport, connected to `cli.url`.
#[cfg(test)]
pub(crate) async fn connected_fake(
    cli: &Cli,
) -> (Arc<uax_client::testing::FakeTransport>, ClientRuntime) {
    let transport = uax_client::testing::FakeTransport::single(&cli.url);
    let mut runtime = ClientRuntime::new(
        Arc::clone(&transport) as Arc<dyn OpcUaTransport>,
        ClientConfig::default(),
        cli,
    );
    runtime.connect().await.unwrap();
    (transport, runtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_identity_from_cli() {
        let cli = Cli::parse_from(["uax", "endpoints"]);
        assert!(identity_from_cli(&cli).is_anonymous());

        let cli = Cli::parse_from(["uax", "endpoints", "--username", "op", "--password", "pw"]);
        assert_eq!(identity_from_cli(&cli), Identity::user_name("op", "pw"));
    }

    #[tokio::test]
    async fn test_connect_and_shutdown() {
        let cli = Cli::parse_from(["uax", "--username", "op", "--password", "pw", "browse"]);
        let (transport, runtime) = connected_fake(&cli).await;
        assert_eq!(runtime.url(), "opc.tcp://localhost:4840");
        assert!(runtime.client().sessions().is_connected());
        let config = transport.last_config().unwrap();
        assert_eq!(config.identity, Identity::user_name("op", "pw"));

        runtime.shutdown().await;
        assert!(transport.release_called());
    }

    #[cfg(not(feature = "real-transport"))]
    #[test]
    fn test_transport_requires_feature() {
        let err = build_transport(&ClientConfig::default()).err().unwrap();
        assert_eq!(err.exit_code(), 3);
    }
}
