//! Example: Finding a Peripheral and Listing Its Characteristics
//!
//! Watches advertisements until the given address shows up, connects,
//! and prints every discovered characteristic with its capabilities.
//!
//! Run with: `cargo run --example scan_device -- <MAC_ADDRESS> [SCAN_SECONDS]`

use std::env;
use std::sync::Arc;
use std::time::Duration;

use medlink_core::{AttributeSession, BleScanner, DiscoveryManager, PeripheralAddress};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let Some(address) = args.get(1) else {
        eprintln!("Usage: {} <MAC_ADDRESS> [SCAN_SECONDS]", args[0]);
        std::process::exit(1);
    };
    let address: PeripheralAddress = address.parse()?;
    let seconds = args.get(2).map(|s| s.parse::<u64>()).transpose()?.unwrap_or(10);

    println!("Scanning for {} ({} s)...", address, seconds);
    let scanner = Arc::new(BleScanner::new().await?);
    let mut discovery = DiscoveryManager::new(scanner);

    let Some(handle) = discovery
        .scan(address, Duration::from_secs(seconds))
        .await?
    else {
        println!("Not found.");
        println!();
        println!("Make sure:");
        println!("  - The device is powered on and advertising");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The address is correct (see the log for addresses seen)");
        return Ok(());
    };

    let mut session = AttributeSession::new();
    session.bind(Some(handle)).await;

    println!();
    println!("=== CHARACTERISTICS ===");
    println!();
    for info in session.characteristics() {
        println!("Service: {}", info.service);
        println!("  {} {:?}", info.uuid, info.properties);
    }

    session.unbind().await;
    Ok(())
}
