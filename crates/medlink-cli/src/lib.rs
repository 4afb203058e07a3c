//! Command-line client for BLE medical peripherals.
//!
//! The `medlink` binary takes one `<DeviceType> <MacAddress>` command from its
//! arguments, or reads one per line from stdin until EOF, and prints each
//! result as a single JSON object on stdout.
//!
//! # Device Types
//!
//! `Thermometer`, `Glucometer`, `Oximeter`, `BloodPressure`, `WeightScale`,
//! `Stethoscope` (case-insensitive).
//!
//! # Configuration
//!
//! Settings are read from `./settings.json`, or from
//! `<config_dir>/medlink/settings.toml` when that does not exist. `--config`
//! names a file explicitly. A missing or malformed file falls back to
//! defaults:
//!
//! | Key | Default | Meaning |
//! |-----|---------|---------|
//! | `ScanTimeout` | 10 | advertisement scan timeout, seconds |
//! | `AudioLength` | 10 | stethoscope recording length, seconds |
//! | `UpdateWeight` | false | print `Update: <json>` for every weight reading |
//! | `Debug` | true | debug-level logging |
//! | `OutputDir` | `.` | directory for stethoscope recordings |
//!
//! # Examples
//!
//! ```bash
//! medlink Oximeter 00:1C:05:FF:AB:01
//! printf 'Thermometer F7:4C:87:32:62:FF\nWeightScale C8:B2:1E:00:11:22\n' | medlink --quiet
//! ```

pub mod cli;
pub mod config;
pub mod format;

// Re-export core dependencies for convenience
pub use medlink_core;
pub use medlink_types;
