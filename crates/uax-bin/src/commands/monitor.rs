// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `monitor` command.
//!
//! ```text
//! ValueStream ─┐
//! ValueStream ─┼──► mpsc ──► print ──► stop on signal / --count
//! ValueStream ─┘
//! ```

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uax_client::codec::{status_quality, variant_to_display};
use uax_client::{AttributeValue, NodeId};

use super::{parse_node, wants_json};
use crate::cli::{Cli, MonitorArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::ClientRuntime;
use crate::shutdown::wait_for_signal;

/// One printed notification.
#[derive(Debug, Serialize)]
struct Notification {
    node_id: String,
    value: String,
    status: String,
    quality: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_timestamp: Option<String>,
}

impl Notification {
    fn new(node_id: &NodeId, value: &AttributeValue) -> Self {
        Self {
            node_id: node_id.to_string(),
            value: variant_to_display(&value.value),
            status: value.status.to_string(),
            quality: status_quality(value.status),
            source_timestamp: value
                .source_timestamp
                .or(value.server_timestamp)
                .map(|t| t.to_rfc3339()),
        }
    }
}

/// Subscribes to the given nodes and prints every value change.
///
/// Nodes the server rejects are reported and skipped. The command fails only
/// if no node could be monitored.
pub async fn monitor(cli: &Cli, args: &MonitorArgs, runtime: &ClientRuntime) -> BinResult<()> {
    let node_ids = args
        .nodes
        .iter()
        .map(|n| parse_node(n))
        .collect::<BinResult<Vec<_>>>()?;
    let interval = args
        .interval
        .unwrap_or(runtime.client().config().default_sampling_interval);

    let (mut rx, mut forwarders) = fan_in(runtime, node_ids, interval).await?;

    let json = wants_json(cli);
    let mut received = 0usize;
    let signal = wait_for_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = &mut signal => break,
            next = rx.recv() => {
                let Some((node_id, value)) = next else {
                    warn!("All value streams closed");
                    break;
                };
                print_notification(&Notification::new(&node_id, &value), json)?;
                received += 1;
                if args.count.is_some_and(|count| received >= count) {
                    break;
                }
            }
        }
    }

    forwarders.abort_all();
    info!(
        received,
        unrouted = runtime.client().subscriptions().notifications_unrouted(),
        "Monitoring stopped"
    );
    Ok(())
}

type Received = (NodeId, AttributeValue);

/// Subscribes to `node_ids` and merges their value streams into one channel.
///
/// # Errors
///
/// `BinError::Runtime` when none of the nodes could be monitored.
async fn fan_in(
    runtime: &ClientRuntime,
    node_ids: Vec<NodeId>,
    interval: Duration,
) -> BinResult<(mpsc::UnboundedReceiver<Received>, JoinSet<()>)> {
    let (subscription, outcomes) = runtime
        .client()
        .subscriptions()
        .subscribe_many(node_ids.clone(), interval)
        .await?;
    info!(
        subscription = subscription.id.value(),
        revised_interval = ?subscription.revised_interval,
        "Subscription ready"
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let mut forwarders = JoinSet::new();
    for (node_id, outcome) in node_ids.into_iter().zip(outcomes) {
        match outcome {
            Ok(mut handle) => {
                let tx = tx.clone();
                forwarders.spawn(async move {
                    while let Some(value) = handle.values.recv().await {
                        if tx.send((node_id.clone(), value)).is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => warn!(node_id = %node_id, error = %e, "Node not monitored"),
        }
    }

    if forwarders.is_empty() {
        return Err(BinError::runtime("none of the requested nodes could be monitored"));
    }
    Ok((rx, forwarders))
}

fn print_notification(notification: &Notification, json: bool) -> BinResult<()> {
    if json {
        let line = serde_json::to_string(notification)
            .map_err(|e| BinError::runtime(format!("failed to encode output: {}", e)))?;
        println!("{}", line);
    } else {
        println!(
            "{} {} = {} ({})",
            notification.source_timestamp.as_deref().unwrap_or("-"),
            notification.node_id,
            notification.value,
            notification.quality
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use uax_client::{StatusCode, Variant};

    use crate::cli::Commands;
    use crate::runtime::connected_fake;

    const INTERVAL: Duration = Duration::from_millis(100);

    #[test]
    fn test_notification_prefers_source_timestamp() {
        let node_id = NodeId::string(2, "Temperature");
        let mut value = AttributeValue::good(Variant::Float(21.5));
        let stamp = value.server_timestamp;
        let notification = Notification::new(&node_id, &value);
        assert_eq!(notification.source_timestamp, stamp.map(|t| t.to_rfc3339()));

        value.server_timestamp = None;
        value.source_timestamp = stamp;
        value.status = StatusCode::UNCERTAIN;
        let notification = Notification::new(&node_id, &value);
        assert_eq!(notification.quality, "uncertain");
        assert_eq!(notification.source_timestamp, stamp.map(|t| t.to_rfc3339()));
        assert_eq!(notification.node_id, "ns=2;s=Temperature");
        assert_eq!(notification.value, "21.5");
    }

    #[tokio::test]
    async fn test_fan_in_merges_streams() {
        let cli = Cli::parse_from(["uax", "monitor", "ns=2;s=A"]);
        let (transport, runtime) = connected_fake(&cli).await;
        transport.session().reject_item(NodeId::string(2, "Bad"));

        let nodes = vec![
            NodeId::string(2, "A"),
            NodeId::string(2, "Bad"),
            NodeId::string(2, "B"),
        ];
        let (mut rx, mut forwarders) = fan_in(&runtime, nodes, INTERVAL).await.unwrap();
        assert_eq!(forwarders.len(), 2);

        let items = runtime.client().subscriptions().subscriptions().await[0]
            .items
            .clone();
        transport
            .session()
            .push(items[1].client_handle, AttributeValue::good(Variant::Int32(2)));
        transport
            .session()
            .push(items[0].client_handle, AttributeValue::good(Variant::Int32(1)));

        let (first, value) = rx.recv().await.unwrap();
        let (second, other) = rx.recv().await.unwrap();
        let mut seen = vec![(first, value.value), (second, other.value)];
        seen.sort_by_key(|(node, _)| node.to_string());
        assert_eq!(
            seen,
            [
                (NodeId::string(2, "A"), Variant::Int32(1)),
                (NodeId::string(2, "B"), Variant::Int32(2)),
            ]
        );

        forwarders.abort_all();
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_fan_in_fails_when_nothing_is_monitored() {
        let cli = Cli::parse_from(["uax", "monitor", "ns=2;s=Bad"]);
        let (transport, runtime) = connected_fake(&cli).await;
        transport.session().reject_item(NodeId::string(2, "Bad"));

        let err = fan_in(&runtime, vec![NodeId::string(2, "Bad")], INTERVAL)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_monitor_stops_after_count() {
        let cli = Cli::parse_from(["uax", "monitor", "ns=2;s=A", "-n", "2", "-i", "100ms"]);
        let (transport, runtime) = connected_fake(&cli).await;
        let Commands::Monitor(args) = &cli.command else {
            panic!("expected monitor command");
        };

        let publish = async {
            let handle = loop {
                let subscriptions = runtime.client().subscriptions().subscriptions().await;
                if let Some(item) = subscriptions.first().and_then(|s| s.items.first()) {
                    break item.client_handle;
                }
                tokio::task::yield_now().await;
            };
            for i in 0..3 {
                transport
                    .session()
                    .push(handle, AttributeValue::good(Variant::Int32(i)));
            }
        };

        let (result, ()) = tokio::join!(monitor(&cli, args, &runtime), publish);
        result.unwrap();
        assert_eq!(runtime.client().subscriptions().notifications_delivered(), 3);
        runtime.shutdown().await;
    }
}
