//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

/// Take measurements from BLE medical peripherals.
///
/// With `<DEVICE_TYPE> <MAC_ADDRESS>` a single command runs and the process
/// exits. Without positional arguments, commands are read line by line from
/// stdin until EOF.
#[derive(Debug, Parser)]
#[command(name = "medlink")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Settings file (JSON, or TOML when the extension is `.toml`)
    #[arg(short, long, env = "MEDLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Advertisement scan timeout in seconds (overrides ScanTimeout)
    #[arg(long, value_name = "SECS")]
    pub scan_timeout: Option<u64>,

    /// Stethoscope recording length in seconds (overrides AudioLength)
    #[arg(long, value_name = "SECS")]
    pub audio_length: Option<u64>,

    /// `<DeviceType> <MacAddress>`, e.g. `Oximeter 00:1C:05:FF:AB:01`
    #[arg(value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Args {
    /// Apply command-line overrides on top of the file settings.
    pub fn apply(&self, config: &mut Config) {
        if let Some(secs) = self.scan_timeout {
            config.scan_timeout = secs;
        }
        if let Some(secs) = self.audio_length {
            config.audio_length = secs;
        }
    }

    /// Whether commands come from stdin rather than the argument list.
    pub fn interactive(&self) -> bool {
        self.command.is_empty()
    }
}
