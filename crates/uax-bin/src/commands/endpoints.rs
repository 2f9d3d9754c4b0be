// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `endpoints` command.

use serde::Serialize;
use uax_client::EndpointDescription;

use super::{print_json, wants_json};
use crate::cli::Cli;
use crate::error::BinResult;
use crate::runtime::ClientRuntime;

#[derive(Debug, Serialize)]
struct EndpointEntry {
    selected: bool,
    #[serde(flatten)]
    endpoint: EndpointDescription,
}

/// Lists the server's endpoints, marking the one the configured policy
/// would pick.
pub async fn endpoints(cli: &Cli, runtime: &ClientRuntime) -> BinResult<()> {
    let sessions = runtime.client().sessions();
    let endpoints = sessions.resolve_endpoints(runtime.url()).await?;
    let selected = sessions.select_endpoint(&endpoints).ok();

    let entries: Vec<EndpointEntry> = endpoints
        .into_iter()
        .map(|endpoint| EndpointEntry {
            selected: selected.as_ref() == Some(&endpoint),
            endpoint,
        })
        .collect();

    if wants_json(cli) {
        return print_json(&entries);
    }

    println!("Endpoints at {}:", runtime.url());
    for entry in &entries {
        let marker = if entry.selected { "*" } else { " " };
        println!("  {} {}", marker, entry.endpoint);
        if !entry.endpoint.server.application_name.is_empty() {
            println!("      server: {}", entry.endpoint.server.application_name);
        }
    }
    if entries.is_empty() {
        println!("  (none)");
    }
    Ok(())
}
