// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! gitifold entry point.

use std::process::ExitCode;

use clap::Parser;

use gitifold::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let code = cli::execute(cli).await;
    ExitCode::from(code as u8)
}
