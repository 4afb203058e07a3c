//! Platform-agnostic types for BLE medical peripherals.
//!
//! This crate holds everything that does not touch a Bluetooth stack:
//! device identifiers, measurement records with their binary codecs, and
//! the characteristic UUIDs each device exposes.
//!
//! # Example
//!
//! ```
//! use medlink_types::{DeviceType, PeripheralAddress, WeightMeasurement};
//!
//! let device: DeviceType = "weightscale".parse().unwrap();
//! let address: PeripheralAddress = "F7:4C:87:32:62:FF".parse().unwrap();
//! let reading = WeightMeasurement::from_bytes(&[231, 88, 1, 1, 38]).unwrap();
//!
//! assert_eq!(device, DeviceType::WeightScale);
//! assert_eq!(address.to_string(), "F7:4C:87:32:62:FF");
//! assert!((reading.kilograms - 14.7).abs() < 1e-9);
//! ```

pub mod error;
pub mod measurements;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use measurements::{
    BloodPressureMeasurement, GlucometerMeasurement, Measurement, OximeterMeasurement,
    StethoscopeResult, ThermometerMeasurement, WeightMeasurement,
};
pub use types::{DeviceType, EchoMode, PeripheralAddress, Range, Timestamp};
pub use uuid as uuids;
