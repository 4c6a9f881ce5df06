// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::Parser;

mod cli;
mod config;
mod logging;
mod run;
mod topology;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    cli::handle_command(&cli, logging::init_logging).await;
}
