// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! `config` subcommands.

use std::path::Path;

use super::{ConfigAction, EXIT_INPUT, EXIT_OK};
use crate::config::OperatorConfig;

pub fn run(action: ConfigAction, path: Option<&Path>) -> i32 {
    match action {
        ConfigAction::Show => match OperatorConfig::load(path) {
            Ok(config) => print_toml(&config),
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_INPUT
            }
        },
        ConfigAction::Defaults => print_toml(&OperatorConfig::default()),
        ConfigAction::Validate => match OperatorConfig::load(path) {
            Ok(_) => {
                println!("Configuration is valid");
                EXIT_OK
            }
            Err(e) => {
                eprintln!("Configuration is invalid: {}", e);
                EXIT_INPUT
            }
        },
    }
}

fn print_toml(config: &OperatorConfig) -> i32 {
    match config.to_toml() {
        Ok(text) => {
            print!("{}", text);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_INPUT
        }
    }
}
