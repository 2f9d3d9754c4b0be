// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `endpoints`: List the endpoints a server advertises
//! - `browse`: Walk the address space
//! - `read`: Read the attributes of a node
//! - `write`: Write a value given as text
//! - `monitor`: Stream value changes

mod browse;
mod endpoints;
mod monitor;
mod read;
mod write;

pub use browse::browse;
pub use endpoints::endpoints;
pub use monitor::monitor;
pub use read::read;
pub use write::write;

use serde::Serialize;
use uax_client::NodeId;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::config::load_client_config;
use crate::error::{BinError, BinResult};
use crate::runtime::{build_transport, ClientRuntime};

/// Executes the appropriate command based on CLI arguments.
///
/// The client is always shut down before returning, also on failure.
pub async fn execute(cli: Cli) -> BinResult<()> {
    let config = load_client_config(&cli)?;
    let transport = build_transport(&config)?;
    let mut runtime = ClientRuntime::new(transport, config, &cli);

    let result = match &cli.command {
        Commands::Endpoints => endpoints::endpoints(&cli, &runtime).await,
        command => match runtime.connect().await {
            Ok(()) => dispatch(&cli, command, &runtime).await,
            Err(e) => Err(e),
        },
    };

    runtime.shutdown().await;
    result
}

async fn dispatch(cli: &Cli, command: &Commands, runtime: &ClientRuntime) -> BinResult<()> {
    match command {
        Commands::Endpoints => endpoints::endpoints(cli, runtime).await,
        Commands::Browse(args) => browse::browse(cli, args, runtime).await,
        Commands::Read(args) => read::read(cli, args, runtime).await,
        Commands::Write(args) => write::write(cli, args, runtime).await,
        Commands::Monitor(args) => monitor::monitor(cli, args, runtime).await,
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Parses a node id argument.
pub(crate) fn parse_node(text: &str) -> BinResult<NodeId> {
    text.parse()
        .map_err(|e| BinError::usage(format!("{}", e)))
}

/// Prints `value` as pretty JSON.
pub(crate) fn print_json<T: Serialize>(value: &T) -> BinResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| BinError::runtime(format!("failed to encode output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Returns `true` when results should be printed as JSON.
pub(crate) fn wants_json(cli: &Cli) -> bool {
    cli.format == OutputFormat::Json
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node() {
        assert_eq!(parse_node("ns=2;s=Boiler").unwrap(), NodeId::string(2, "Boiler"));
        assert_eq!(parse_node("i=85").unwrap(), NodeId::numeric(0, 85));
        assert_eq!(parse_node("ns=x;i=1").unwrap_err().exit_code(), 2);
    }
}
