//! Core BLE library for medical peripherals.
//!
//! This crate discovers a peripheral by hardware address, opens an
//! attribute session with it and runs one of six device-specific
//! measurement protocols, decoding the collected frames into typed records
//! from [`medlink_types`].
//!
//! # Features
//!
//! - **Discovery**: watch advertisements until the target address appears
//! - **Attribute session**: capability-checked read/write/subscribe with
//!   per-listener frame channels
//! - **Protocols**: bounded-window collection for every supported device
//! - **Stethoscope audio**: ADPCM decoding, block reassembly, pluggable
//!   signal enhancement and WAV output
//! - **Mock transport**: run every protocol without BLE hardware
//!
//! # Supported Devices
//!
//! | Device | Protocol |
//! |--------|----------|
//! | Thermometer | last frame in a 10 s window |
//! | Glucometer | "report last record" request, 5 s window |
//! | Oximeter | record download with chunk acknowledgments, 5 s window |
//! | BloodPressure | latest stored reading, 5 s window |
//! | WeightScale | live readings until the scale signals completion |
//! | Stethoscope | audio recording to a WAV file |
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use medlink_core::{BleScanner, Command, Runner, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scanner = Arc::new(BleScanner::new().await?);
//!     let mut runner = Runner::new(scanner, Settings::default());
//!
//!     let command: Command = "Oximeter 00:1C:05:FF:AB:01".parse()?;
//!     match runner.run(&command).await? {
//!         Some(measurement) => println!("{measurement:?}"),
//!         None => println!("no measurement received"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod command;
pub mod device;
pub mod discovery;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod runner;
pub mod scan;
pub mod session;
pub mod settings;
pub mod traits;

// Core exports
pub use audio::{Passthrough, SignalEnhancer, StethoscopePipeline};
pub use command::Command;
pub use device::{BlePeripheral, ConnectionConfig};
pub use discovery::DiscoveryManager;
pub use error::{DeviceNotFoundReason, Error, Result};
pub use mock::{MockPeripheral, MockPeripheralBuilder, MockScanner};
pub use protocol::{MeasurementProtocol, WeightUpdateCallback, protocol_for};
pub use runner::Runner;
pub use scan::{BleScanner, get_adapter};
pub use session::{AttributeSession, Frame, FrameReceiver, Listener};
pub use settings::Settings;
pub use traits::{CharProperties, CharacteristicInfo, GattTransport, Scanner};

// Re-export from medlink-types
pub use medlink_types::uuid as uuids;
pub use medlink_types::{DeviceType, Measurement, PeripheralAddress};
