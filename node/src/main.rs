// Copyright (c) 2026 Civitas Project. MIT License.
// See LICENSE for details.

//! # Civitas Simulator
//!
//! Entry point for the `civitas-node` binary. Parses CLI arguments,
//! initializes logging, and runs a simulated two-committee election.
//!
//! ```text
//! civitas-node simulate --scenario happy-path --committee-size 50 --voters 10
//! civitas-node simulate -s silent-dos
//! civitas-node version
//! ```

mod cli;
mod logging;
mod sim;

use anyhow::Result;
use clap::Parser;

use cli::{CivitasCli, Commands};
use logging::LogFormat;

fn main() -> Result<()> {
    let cli = CivitasCli::parse();

    match cli.command {
        Commands::Simulate(args) => {
            let filter = format!(
                "civitas_node={level},civitas_protocol={level}",
                level = args.log_level
            );
            logging::init_logging(&filter, LogFormat::from_str_lossy(&args.log_format));
            sim::run(&args)
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("civitas-node {}", env!("CARGO_PKG_VERSION"));
    if let Some(commit) = option_env!("GIT_COMMIT") {
        println!("commit    {}", commit);
    }
}
