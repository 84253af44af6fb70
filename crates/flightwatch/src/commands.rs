// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands. Output is JSON on stdout.

use serde::Serialize;

use flightwatch_config::model::FlightwatchConfig;
use flightwatch_core::FlightwatchError;
use flightwatch_resolver::ResolveOptions;

use crate::serve::{build, init_tracing};

fn print_json<T: Serialize>(value: &T) -> Result<(), FlightwatchError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_resolve(
    config: &FlightwatchConfig,
    booking_reference: &str,
    last_name: &str,
    airline: Option<String>,
    no_cache: bool,
) -> Result<(), FlightwatchError> {
    init_tracing(&config.service.log_level);
    let flightwatch = build(config).await?;
    let options = ResolveOptions {
        airline,
        use_cache: !no_cache,
        ..ResolveOptions::default()
    };
    let outcome = flightwatch
        .resolve(booking_reference, last_name, &options)
        .await?;
    print_json(&outcome)
}

pub async fn run_history(
    config: &FlightwatchConfig,
    booking_reference: &str,
    last_name: &str,
    limit: usize,
) -> Result<(), FlightwatchError> {
    init_tracing(&config.service.log_level);
    let flightwatch = build(config).await?;
    let history = flightwatch
        .get_history(booking_reference, last_name, limit)
        .await?;
    print_json(&history)
}

pub async fn run_jobs(config: &FlightwatchConfig, all: bool) -> Result<(), FlightwatchError> {
    init_tracing(&config.service.log_level);
    let flightwatch = build(config).await?;
    let jobs = if all {
        flightwatch.list_all_jobs().await?
    } else {
        flightwatch.list_active_jobs().await?
    };
    print_json(&jobs)
}

/// Prints the effective configuration as TOML.
pub fn run_config(config: &FlightwatchConfig) -> Result<(), FlightwatchError> {
    let rendered =
        toml::to_string_pretty(config).map_err(|e| FlightwatchError::Config(e.to_string()))?;
    print!("{rendered}");
    Ok(())
}
