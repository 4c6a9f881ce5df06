// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::{Parser, Subcommand};
use schemars::schema_for;
use tracing::{error, info, warn};

use crate::config;

type LogInitFn = fn(
    &config::LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "padlink.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Builds and plays the configured pipeline until end-of-stream or Ctrl-C
    Run,
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a default config file and print it to stdout
    Default,
    /// Generate a JSON schema for the config and print it to stdout
    Schema,
}

fn log_startup_info(config: &config::Config) {
    info!(
        pipeline = %config.pipeline.name,
        nodes = config.pipeline.nodes.len(),
        bindings = config.pipeline.bindings.len(),
        dot_dir = ?config.diagnostics.dot_dir,
        console_level = ?config.log.console_level,
        file_enable = config.log.file_enable,
        "Starting padlink"
    );
}

/// Handle the "run" command
/// Exits the process with status code 1 on failure or an engine fault
// Allow eprintln before logging is initialized (CLI output)
#[allow(clippy::disallowed_macros)]
async fn handle_run_command(config_path: &str, init_logging: LogInitFn) {
    let config_result = match config::load(config_path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        },
    };

    let _log_guard = match init_logging(&config_result.config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(1);
        },
    };

    if let Some(missing_file) = &config_result.file_missing {
        warn!(config_path = %missing_file, "Config file not found, using defaults");
    }

    log_startup_info(&config_result.config);

    match crate::run::run_pipeline(&config_result.config).await {
        Ok(termination) if termination.is_failure() => std::process::exit(1),
        Ok(_) => {},
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to run pipeline");
            std::process::exit(1);
        },
    }
}

/// Handle the "config default" command - print default config to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_default_command() {
    match config::generate_default() {
        Ok(toml_string) => {
            println!("# Default padlink configuration file");
            println!("{toml_string}");
        },
        Err(e) => {
            eprintln!("Failed to generate default config: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle the "config schema" command - print JSON schema to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_schema_command() {
    let schema = schema_for!(config::Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => {
            println!("{json}");
        },
        Err(e) => {
            eprintln!("Failed to generate config schema: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle CLI commands
pub async fn handle_command(cli: &Cli, init_logging: LogInitFn) {
    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Run => {
            handle_run_command(&cli.config, init_logging).await;
        },
        Commands::Config(ConfigCommands::Default) => {
            handle_config_default_command();
        },
        Commands::Config(ConfigCommands::Schema) => {
            handle_config_schema_command();
        },
    }
}
