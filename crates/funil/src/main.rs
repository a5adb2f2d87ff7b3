// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Funil - a conversational-commerce WhatsApp agent.
//!
//! This is the binary entry point for the Funil agent.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod doctor;
mod serve;

/// Funil - a conversational-commerce WhatsApp agent.
#[derive(Parser, Debug)]
#[command(name = "funil", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Funil agent server.
    Serve,
    /// Check configuration and external connectivity.
    Doctor,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match funil_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            funil_config::render_errors(errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Doctor) => {
            std::process::exit(doctor::run_doctor(config).await);
        }
        None => {
            println!("funil: use --help for available commands");
        }
    }
}
