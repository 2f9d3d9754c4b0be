// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `browse` command.
//!
//! Without a start node the walk goes through the client's lazily populated
//! [`AddressSpace`](uax_client::AddressSpace). An explicit start node is not
//! in that tree, so it is browsed directly over the session.

use serde::Serialize;
use tracing::debug;
use uax_client::tree::{filter_references, tree_browse_description};
use uax_client::{NodeId, NodeRef, OpcUaSession as _};

use super::{parse_node, print_json, wants_json};
use crate::cli::{BrowseArgs, Cli};
use crate::error::{BinError, BinResult};
use crate::runtime::ClientRuntime;

/// One visited node.
#[derive(Debug, Serialize)]
struct BrowseLine {
    depth: usize,
    node_id: String,
    browse_name: String,
    display_name: String,
    node_class: &'static str,
}

impl BrowseLine {
    fn new(depth: usize, node: &NodeRef) -> Self {
        Self {
            depth,
            node_id: node.node_id.to_string(),
            browse_name: node.browse_name.to_string(),
            display_name: node.display_name.text.clone(),
            node_class: node.node_class.name(),
        }
    }
}

/// Walks the address space up to `--depth` levels below the start node.
pub async fn browse(cli: &Cli, args: &BrowseArgs, runtime: &ClientRuntime) -> BinResult<()> {
    let lines = match &args.node {
        None => walk_tree(runtime, args.depth).await?,
        Some(node) => walk_from(runtime, parse_node(node)?, args.depth).await?,
    };
    debug!(nodes = lines.len(), "Browse finished");

    if wants_json(cli) {
        return print_json(&lines);
    }
    for line in &lines {
        println!(
            "{}{} ({}) [{}]",
            "  ".repeat(line.depth),
            line.display_name,
            line.node_id,
            line.node_class
        );
    }
    Ok(())
}

async fn walk_tree(runtime: &ClientRuntime, depth: usize) -> BinResult<Vec<BrowseLine>> {
    let tree = runtime.client().tree();
    let root = tree.root();
    let mut lines = Vec::new();
    let mut stack = vec![(root, tree.node(root).unwrap_or_else(NodeRef::root), 0)];

    while let Some((key, node, level)) = stack.pop() {
        lines.push(BrowseLine::new(level, &node));
        if level >= depth || tree.is_leaf(key) {
            continue;
        }
        let children = tree.expand(key).await?;
        stack.extend(
            children
                .into_iter()
                .rev()
                .map(|(child, child_node)| (child, child_node, level + 1)),
        );
    }
    Ok(lines)
}

async fn walk_from(
    runtime: &ClientRuntime,
    start: NodeId,
    depth: usize,
) -> BinResult<Vec<BrowseLine>> {
    let mut lines = Vec::new();
    if depth == 0 {
        return Ok(lines);
    }
    let mut stack: Vec<(NodeRef, usize)> = browse_children(runtime, &start)
        .await?
        .into_iter()
        .rev()
        .map(|child| (child, 0))
        .collect();

    while let Some((node, level)) = stack.pop() {
        lines.push(BrowseLine::new(level, &node));
        if level + 1 >= depth || node.is_static_leaf() {
            continue;
        }
        let Some(node_id) = node.local_id() else {
            continue;
        };
        let children = browse_children(runtime, node_id).await?;
        stack.extend(children.into_iter().rev().map(|child| (child, level + 1)));
    }
    Ok(lines)
}

async fn browse_children(runtime: &ClientRuntime, node_id: &NodeId) -> BinResult<Vec<NodeRef>> {
    let active = runtime.client().sessions().current()?;
    let timeout = runtime.client().config().request_timeout;
    let request = [tree_browse_description(node_id.clone())];

    let results = tokio::time::timeout(timeout, active.session().browse(&request))
        .await
        .map_err(|_| {
            BinError::runtime(format!("browse of {} timed out after {:?}", node_id, timeout))
        })??;
    let result = results
        .into_iter()
        .next()
        .ok_or_else(|| BinError::runtime(format!("empty browse result for {}", node_id)))?;
    if result.status.is_bad() {
        return Err(BinError::runtime(format!(
            "browse of {} failed: {}",
            node_id, result.status
        )));
    }
    Ok(filter_references(result.references))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use uax_client::testing::reference;
    use uax_client::NodeClass;

    use crate::runtime::connected_fake;

    fn plant(session: &uax_client::testing::FakeSession) {
        session.set_children(
            NodeId::ROOT_FOLDER,
            vec![reference(NodeId::OBJECTS_FOLDER, "Objects", NodeClass::Object)],
        );
        session.set_children(
            NodeId::OBJECTS_FOLDER,
            vec![
                reference(NodeId::string(2, "Boiler"), "Boiler", NodeClass::Object),
                reference(NodeId::string(2, "Pressure"), "Pressure", NodeClass::Variable),
            ],
        );
        session.set_children(
            NodeId::string(2, "Boiler"),
            vec![
                reference(NodeId::string(2, "Temperature"), "Temperature", NodeClass::Variable),
                reference(NodeId::string(2, "Setpoint"), "Setpoint", NodeClass::Variable),
            ],
        );
    }

    fn outline(lines: &[BrowseLine]) -> Vec<(usize, &str)> {
        lines
            .iter()
            .map(|l| (l.depth, l.display_name.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_walk_from_is_depth_first() {
        let cli = Cli::parse_from(["uax", "browse", "i=85", "--depth", "2"]);
        let (transport, runtime) = connected_fake(&cli).await;
        plant(transport.session());

        let lines = walk_from(&runtime, NodeId::OBJECTS_FOLDER, 2).await.unwrap();
        assert_eq!(
            outline(&lines),
            [(0, "Boiler"), (1, "Temperature"), (1, "Setpoint"), (0, "Pressure")]
        );

        let shallow = walk_from(&runtime, NodeId::OBJECTS_FOLDER, 1).await.unwrap();
        assert_eq!(outline(&shallow), [(0, "Boiler"), (0, "Pressure")]);
        assert!(walk_from(&runtime, NodeId::OBJECTS_FOLDER, 0).await.unwrap().is_empty());
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_walk_tree_from_root() {
        let cli = Cli::parse_from(["uax", "browse", "--depth", "3"]);
        let (transport, runtime) = connected_fake(&cli).await;
        plant(transport.session());

        let lines = walk_tree(&runtime, 3).await.unwrap();
        assert_eq!(
            outline(&lines),
            [
                (0, "Root"),
                (1, "Objects"),
                (2, "Boiler"),
                (3, "Temperature"),
                (3, "Setpoint"),
                (2, "Pressure"),
            ]
        );
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_browse_bad_status_fails() {
        let cli = Cli::parse_from(["uax", "browse", "ns=2;s=Missing"]);
        let (transport, runtime) = connected_fake(&cli).await;
        transport
            .session()
            .set_browse_status(NodeId::string(2, "Missing"), uax_client::StatusCode::BAD);

        let err = walk_from(&runtime, NodeId::string(2, "Missing"), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ns=2;s=Missing"));
        runtime.shutdown().await;
    }
}
