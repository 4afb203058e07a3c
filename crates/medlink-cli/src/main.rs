use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use medlink_cli::cli::Args;
use medlink_cli::config::Config;
use medlink_cli::format::{format_measurement, format_weight_update};
use medlink_core::{BleScanner, Command, Error, Runner, Settings};
use medlink_types::WeightMeasurement;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Settings are read before tracing starts since `Debug` picks the filter
    let mut config = match &args.config {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    };
    args.apply(&mut config);

    let filter = if args.quiet {
        EnvFilter::new("warn")
    } else if args.verbose || config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    debug!(?config, "Loaded settings");

    let settings = config.into_settings().context("Invalid settings")?;

    if args.interactive() {
        command_loop(settings).await?;
        return Ok(ExitCode::SUCCESS);
    }

    // Arguments are validated before the adapter is touched
    let command = match Command::from_args(&args.command) {
        Ok(command) => command,
        Err(e) => return Ok(report(&e)),
    };
    let mut runner = connect(settings).await?;
    match runner.run(&command).await {
        Ok(measurement) => {
            println!("{}", format_measurement(measurement.as_ref())?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(&e)),
    }
}

/// Print `e` to stderr. Input errors exit with 2, device failures with 1.
fn report(e: &Error) -> ExitCode {
    eprintln!("Error: {e}");
    if e.is_input_error() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

/// Run one command per stdin line until EOF. Failures are reported and the
/// loop continues.
async fn command_loop(settings: Settings) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut runner: Option<Runner> = None;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("Error: {e}");
                continue;
            }
        };

        if runner.is_none() {
            match connect(settings.clone()).await {
                Ok(connected) => runner = Some(connected),
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    continue;
                }
            }
        }
        let Some(active) = runner.as_mut() else {
            continue;
        };

        match active.run(&command).await {
            Ok(measurement) => match format_measurement(measurement.as_ref()) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!("Failed to serialize result: {e}"),
            },
            Err(e) => eprintln!("Error: {command} failed: {e}"),
        }
    }
    Ok(())
}

/// Open the Bluetooth adapter and build a runner that prints weight updates.
async fn connect(settings: Settings) -> Result<Runner> {
    let scanner = BleScanner::new()
        .await
        .context("Failed to open Bluetooth adapter")?;
    Ok(
        Runner::new(Arc::new(scanner), settings).on_weight_update(Arc::new(
            |reading: &WeightMeasurement| match format_weight_update(reading) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Failed to serialize update: {e}"),
            },
        )),
    )
}
