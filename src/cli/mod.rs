// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command line interface.
//!
//! Exit codes: 0 success, 1 reconcile failure, 2 configuration or input
//! error.

pub mod config_cmd;
pub mod render;
mod render_format;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{OperatorConfig, ENV_CONFIG};
use crate::telemetry;

pub const EXIT_OK: i32 = 0;
pub const EXIT_RECONCILE: i32 = 1;
pub const EXIT_INPUT: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "gitifold", version, about = "Provision a forge, CI, registry and scanner stack")]
pub struct Cli {
    /// Operator configuration file (TOML).
    #[arg(long, global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one pass against an empty in-memory store and print the result.
    Render(RenderArgs),
    /// Inspect operator configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    /// `VCS` resource file, YAML or JSON.
    #[arg(long)]
    pub spec: PathBuf,

    /// Override the namespace of the resource.
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Print a pass summary to stderr.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Effective configuration after file and environment overrides.
    Show,
    /// Built-in defaults.
    Defaults,
    /// Load and validate, reporting the first problem.
    Validate,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Run the parsed command, returning the process exit code.
pub async fn execute(cli: Cli) -> i32 {
    match cli.command {
        Command::Config { action } => config_cmd::run(action, cli.config.as_deref()),
        Command::Render(args) => {
            let settings = match OperatorConfig::load(cli.config.as_deref()) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return EXIT_INPUT;
                }
            };
            if let Err(e) = telemetry::init_logging(&settings.logging) {
                eprintln!("Error: {}", e);
                return EXIT_INPUT;
            }
            render::run_render(&args, settings).await
        }
    }
}
