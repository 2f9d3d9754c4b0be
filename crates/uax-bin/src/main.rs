// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! UA Explorer
//!
//! Main binary entry point for the `uax` command-line OPC UA client.

use uax_bin::cli::Cli;
use uax_bin::error::report_error_and_exit;
use uax_bin::{commands, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = init_logging(cli.effective_log_level(), cli.log_format) {
        report_error_and_exit(e);
    }

    if let Err(e) = commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
