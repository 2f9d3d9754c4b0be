// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `endpoints`: List the endpoints a server advertises
//! - `browse`: Walk the address space from a node
//! - `read`: Read the attributes of a node
//! - `write`: Write a value given as text
//! - `monitor`: Stream value changes until interrupted

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// UA Explorer - browse, read, write and monitor OPC UA servers.
#[derive(Parser, Debug)]
#[command(
    name = "uax",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "Command-line OPC UA explorer",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Client configuration file (YAML or TOML)
    #[arg(short, long, env = "UAX_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server URL
    #[arg(
        short,
        long,
        default_value = "opc.tcp://localhost:4840",
        env = "UAX_URL",
        global = true
    )]
    pub url: String,

    /// Username for username/password authentication
    #[arg(long, env = "UAX_USERNAME", global = true, requires = "password")]
    pub username: Option<String>,

    /// Password for username/password authentication
    #[arg(long, env = "UAX_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Pick the most secure endpoint instead of the least secure
    #[arg(long, global = true)]
    pub highest_security: bool,

    /// Request timeout (e.g. "5s", "1500ms")
    #[arg(long, value_parser = parse_duration, global = true)]
    pub request_timeout: Option<Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "UAX_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "UAX_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Output format for command results
    #[arg(short, long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the endpoints advertised by the server
    Endpoints,

    /// Browse the address space
    ///
    /// Starts at the Root folder unless a node is given and descends up to
    /// `--depth` levels.
    Browse(BrowseArgs),

    /// Read the attributes of a node
    Read(ReadArgs),

    /// Write a value to a node
    ///
    /// The text is parsed according to the node's DataType.
    Write(WriteArgs),

    /// Monitor value changes
    ///
    /// Runs until interrupted or until `--count` notifications arrived.
    Monitor(MonitorArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `browse` command.
#[derive(Args, Debug, Clone)]
pub struct BrowseArgs {
    /// Node to start from (e.g. "i=85", "ns=2;s=Boiler")
    pub node: Option<String>,

    /// Levels to descend
    #[arg(short, long, default_value = "1")]
    pub depth: usize,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Node to read
    pub node: String,

    /// Read every attribute of the node's class, not only Value
    #[arg(short, long)]
    pub all: bool,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Node to write
    pub node: String,

    /// Value as text
    pub value: String,
}

/// Arguments for the `monitor` command.
#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Nodes to monitor
    #[arg(required = true)]
    pub nodes: Vec<String>,

    /// Sampling interval (defaults to the configured interval)
    #[arg(short, long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Stop after this many notifications
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

fn parse_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(value)
}

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose logging is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_command() {
        let cli = Cli::parse_from(["uax", "endpoints"]);
        assert!(matches!(cli.command, Commands::Endpoints));
        assert_eq!(cli.url, "opc.tcp://localhost:4840");
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_browse_command() {
        let cli = Cli::parse_from(["uax", "browse", "i=85", "-d", "3"]);
        if let Commands::Browse(args) = cli.command {
            assert_eq!(args.node.as_deref(), Some("i=85"));
            assert_eq!(args.depth, 3);
        } else {
            panic!("Expected Browse command");
        }
    }

    #[test]
    fn test_write_command() {
        let cli = Cli::parse_from(["uax", "write", "ns=2;s=Setpoint", "42.5"]);
        if let Commands::Write(args) = cli.command {
            assert_eq!(args.node, "ns=2;s=Setpoint");
            assert_eq!(args.value, "42.5");
        } else {
            panic!("Expected Write command");
        }
    }

    #[test]
    fn test_monitor_interval() {
        let cli = Cli::parse_from([
            "uax", "monitor", "ns=2;s=A", "ns=2;s=B", "-i", "250ms", "-n", "5",
        ]);
        if let Commands::Monitor(args) = cli.command {
            assert_eq!(args.nodes.len(), 2);
            assert_eq!(args.interval, Some(Duration::from_millis(250)));
            assert_eq!(args.count, Some(5));
        } else {
            panic!("Expected Monitor command");
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::parse_from([
            "uax",
            "read",
            "i=2259",
            "-u",
            "opc.tcp://plc:4840",
            "--request-timeout",
            "2s",
            "-f",
            "json",
        ]);
        assert_eq!(cli.url, "opc.tcp://plc:4840");
        assert_eq!(cli.request_timeout, Some(Duration::from_secs(2)));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_quiet_mode() {
        let cli = Cli::parse_from(["uax", "endpoints", "-q"]);
        assert!(cli.quiet);
        assert_eq!(cli.effective_log_level(), "warn");
    }

    #[test]
    fn test_verbose_mode() {
        let cli = Cli::parse_from(["uax", "endpoints", "-v"]);
        assert!(cli.is_verbose());
        assert_eq!(cli.effective_log_level(), "debug");
    }
}
