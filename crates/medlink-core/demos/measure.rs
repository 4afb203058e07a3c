//! Example: Taking One Measurement
//!
//! Runs a single `<DeviceType> <MacAddress>` command and prints the result
//! as JSON. Intermediate weight readings are printed as they arrive.
//!
//! Run with: `cargo run --example measure -- Oximeter 00:1C:05:FF:AB:01`

use std::env;
use std::sync::Arc;

use medlink_core::{BleScanner, Command, Runner, Settings};
use medlink_types::WeightMeasurement;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = Command::from_args(&args)?;

    let scanner = Arc::new(BleScanner::new().await?);
    let settings = Settings::default().update_weight(true);
    let mut runner =
        Runner::new(scanner, settings).on_weight_update(Arc::new(|reading: &WeightMeasurement| {
            println!("Update: {} {}", reading.kilograms, reading.unit);
        }));

    let measurement = runner.run(&command).await?;
    println!("{}", serde_json::to_string_pretty(&measurement)?);
    Ok(())
}
