// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uax-bin
//!
//! Command-line front end for the `uax-client` OPC UA runtime.
//!
//! - CLI argument parsing with clap
//! - Client configuration from YAML / TOML files plus flags
//! - Logging initialization
//! - Interrupt handling for long-running commands
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                              │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │  config  │ │ logging  │
//!        └────┬─────┘ └──────────┘ └──────────┘
//!             │
//!      ┌──────▼──────┐     ┌──────────┐
//!      │   runtime   │◄────│ shutdown │
//!      └──────┬──────┘     └──────────┘
//!             │
//!      ┌──────▼──────┐
//!      │  uax-client │
//!      └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # List endpoints
//! uax -u opc.tcp://plc:4840 endpoints
//!
//! # Browse two levels below Objects
//! uax browse i=85 -d 2
//!
//! # Read every attribute of a node as JSON
//! uax read "ns=2;s=Boiler.Setpoint" --all -f json
//!
//! # Write a value
//! uax write "ns=2;s=Boiler.Setpoint" 42.5
//!
//! # Monitor until Ctrl+C
//! uax monitor "ns=2;s=Boiler.Temperature" -i 250ms
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use config::load_client_config;
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{build_transport, ClientRuntime};
pub use shutdown::wait_for_signal;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
