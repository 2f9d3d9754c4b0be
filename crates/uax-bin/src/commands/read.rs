// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use serde::Serialize;
use uax_client::codec::{access_level_display, status_quality, variant_to_display};
use uax_client::{AttributeId, AttributeValue, NodeClass, NodeId};

use super::{parse_node, print_json, wants_json};
use crate::cli::{Cli, ReadArgs};
use crate::error::BinResult;
use crate::runtime::ClientRuntime;

/// One printed attribute.
#[derive(Debug, Serialize)]
struct ReadOutput {
    attribute: String,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_type: Option<String>,
    status: String,
    quality: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_timestamp: Option<String>,
}

impl ReadOutput {
    fn new(attribute: AttributeId, value: &AttributeValue, data_type: Option<String>) -> Self {
        let access_bits = match attribute {
            AttributeId::AccessLevel | AttributeId::UserAccessLevel => value
                .value
                .as_i64()
                .and_then(|bits| u8::try_from(bits).ok()),
            _ => None,
        };
        Self {
            attribute: attribute.to_string(),
            value: access_bits
                .map(access_level_display)
                .unwrap_or_else(|| variant_to_display(&value.value)),
            data_type,
            status: value.status.to_string(),
            quality: status_quality(value.status),
            source_timestamp: value.source_timestamp.map(|t| t.to_rfc3339()),
            server_timestamp: value.server_timestamp.map(|t| t.to_rfc3339()),
        }
    }
}

/// Reads the Value of a node, or every attribute of its class with `--all`.
pub async fn read(cli: &Cli, args: &ReadArgs, runtime: &ClientRuntime) -> BinResult<()> {
    let node_id = parse_node(&args.node)?;
    let outputs = if args.all {
        read_all(runtime, &node_id).await?
    } else {
        vec![read_value(runtime, &node_id).await?]
    };

    if wants_json(cli) {
        return print_json(&outputs);
    }

    println!("{}", node_id);
    for output in &outputs {
        print!("  {:<24} {}", output.attribute, output.value);
        if let Some(data_type) = &output.data_type {
            print!(" ({})", data_type);
        }
        if output.quality != "good" {
            print!(" [{}]", output.status);
        }
        println!();
        if !args.all {
            if let Some(ts) = &output.source_timestamp {
                println!("  {:<24} {}", "SourceTimestamp", ts);
            }
            if let Some(ts) = &output.server_timestamp {
                println!("  {:<24} {}", "ServerTimestamp", ts);
            }
        }
    }
    Ok(())
}

async fn read_value(runtime: &ClientRuntime, node_id: &NodeId) -> BinResult<ReadOutput> {
    let attributes = runtime.client().attributes();
    let value = attributes.read_value(node_id).await?;
    let data_type = match &value.data_type {
        Some(data_type) => Some(attributes.data_type_name(data_type).await?),
        None => None,
    };
    Ok(ReadOutput::new(AttributeId::Value, &value, data_type))
}

async fn read_all(runtime: &ClientRuntime, node_id: &NodeId) -> BinResult<Vec<ReadOutput>> {
    let attributes = runtime.client().attributes();
    let common = attributes
        .read_attributes_for_class(node_id, NodeClass::Unspecified)
        .await?;
    let class = node_class_of(&common);

    let values = if class == NodeClass::Unspecified {
        common
    } else {
        attributes.read_attributes_for_class(node_id, class).await?
    };

    Ok(values
        .iter()
        .map(|(attribute, value)| ReadOutput::new(*attribute, value, None))
        .collect())
}

fn node_class_of(values: &[(AttributeId, AttributeValue)]) -> NodeClass {
    values
        .iter()
        .find(|(attribute, value)| *attribute == AttributeId::NodeClass && value.is_good())
        .and_then(|(_, value)| value.value.as_i64())
        .and_then(|v| u32::try_from(v).ok())
        .map(NodeClass::from_value)
        .unwrap_or(NodeClass::Unspecified)
}
