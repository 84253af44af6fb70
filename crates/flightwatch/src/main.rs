// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flightwatch - flight booking status resolution and monitoring.
//!
//! This is the binary entry point and composition root.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;

use clap::{Parser, Subcommand};

/// Flightwatch - flight booking status resolution and monitoring.
#[derive(Parser, Debug)]
#[command(name = "flightwatch", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the monitoring service until interrupted.
    Serve,
    /// Resolve the current status of one booking.
    Resolve {
        booking_reference: String,
        last_name: String,
        /// Two-letter airline designator used to pick a scraper.
        #[arg(long)]
        airline: Option<String>,
        /// Skip the cache and query the sources directly.
        #[arg(long)]
        no_cache: bool,
    },
    /// Show resolution history for one booking, newest first.
    History {
        booking_reference: String,
        last_name: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List monitoring jobs.
    Jobs {
        /// Include stopped and failed jobs.
        #[arg(long)]
        all: bool,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match flightwatch_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            flightwatch_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Resolve {
            booking_reference,
            last_name,
            airline,
            no_cache,
        }) => {
            commands::run_resolve(&config, &booking_reference, &last_name, airline, no_cache).await
        }
        Some(Commands::History {
            booking_reference,
            last_name,
            limit,
        }) => commands::run_history(&config, &booking_reference, &last_name, limit).await,
        Some(Commands::Jobs { all }) => commands::run_jobs(&config, all).await,
        Some(Commands::Config) => commands::run_config(&config),
        None => {
            println!("flightwatch: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
