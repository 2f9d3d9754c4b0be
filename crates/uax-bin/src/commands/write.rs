// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write` command.

use serde_json::json;
use tracing::info;

use super::{parse_node, print_json, wants_json};
use crate::cli::{Cli, WriteArgs};
use crate::error::BinResult;
use crate::runtime::ClientRuntime;

/// Parses the value as the node's data type and writes it.
pub async fn write(cli: &Cli, args: &WriteArgs, runtime: &ClientRuntime) -> BinResult<()> {
    let node_id = parse_node(&args.node)?;
    let status = runtime
        .client()
        .attributes()
        .write_from_string(&node_id, &args.value)
        .await?;
    info!(node_id = %node_id, %status, "Value written");

    if wants_json(cli) {
        return print_json(&json!({
            "node_id": node_id.to_string(),
            "value": args.value,
            "status": status.to_string(),
        }));
    }
    println!("{} <- {} ({})", node_id, args.value, status);
    Ok(())
}
