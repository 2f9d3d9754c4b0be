// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Interrupt handling.
//!
//! Long-running commands race their work against [`wait_for_signal`] and
//! then tear the client down through
//! [`UaClient::shutdown`](uax_client::UaClient::shutdown).

use tracing::{info, warn};

/// Resolves on SIGINT, SIGTERM or SIGQUIT (Unix) or Ctrl+C (elsewhere).
///
/// If no handler can be installed the future never resolves and a warning
/// is logged.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (Ok(mut sigterm), Ok(mut sigint), Ok(mut sigquit)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::quit()),
        ) else {
            warn!("Failed to register signal handlers");
            return std::future::pending().await;
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigquit.recv() => info!("Received SIGQUIT"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            return std::future::pending().await;
        }
        info!("Received Ctrl+C");
    }
}
