//! Error types for medlink-core.
//!
//! # Propagation
//!
//! | Error | Raised by | Effect |
//! |-------|-----------|--------|
//! | [`Error::InvalidCommand`], [`Error::Parse`] | command parsing | command rejected before any scan |
//! | [`Error::ScanFailure`], [`Error::DeviceNotFound`] | discovery | command aborted, no retry |
//! | [`Error::NotConnected`], [`Error::InvalidCharacteristic`], `*NotSupported` | attribute session | current protocol run aborted |
//! | [`Error::Bluetooth`], [`Error::WriteFailed`], [`Error::Timeout`] | transport | current protocol run aborted |
//!
//! Nothing here is fatal to the process: every failure returns control to
//! the command loop.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use medlink_types::{ParseError, PeripheralAddress};

/// Errors that can occur while talking to a peripheral.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// The advertisement watcher reported an error.
    #[error("Scan failed: {0}")]
    ScanFailure(String),

    /// No matching peripheral was found.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// The peripheral requires bonding that has not happened.
    #[error("Device requires pairing")]
    PairingRequired,

    /// Operation attempted on an unbound session or a dropped link.
    #[error("Not connected to device")]
    NotConnected,

    /// The characteristic was not part of the discovered set.
    #[error("Invalid characteristic: {uuid}")]
    InvalidCharacteristic {
        /// The UUID that was not found.
        uuid: Uuid,
    },

    /// The characteristic supports neither notify nor indicate.
    #[error("Characteristic {uuid} does not support notifications")]
    SubscribeNotSupported { uuid: Uuid },

    /// The characteristic lacks the write property.
    #[error("Characteristic {uuid} does not support write")]
    WriteNotSupported { uuid: Uuid },

    /// The characteristic lacks the read property.
    #[error("Characteristic {uuid} does not support read")]
    ReadNotSupported { uuid: Uuid },

    /// The transport did not acknowledge a write.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed {
        /// The characteristic UUID.
        uuid: Uuid,
        /// The reason for the failure.
        reason: String,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Wrong number of command arguments.
    #[error("Invalid command '{0}'. Usage: <DeviceType> <MacAddress>")]
    InvalidCommand(String),

    /// Invalid device type or address.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// No advertisement from the address arrived within the scan window.
    NotFound { address: PeripheralAddress },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { address } => write!(f, "device '{}' not found", address),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific address.
    pub fn device_not_found(address: PeripheralAddress) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound { address })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an invalid characteristic error.
    pub fn invalid_characteristic(uuid: Uuid) -> Self {
        Self::InvalidCharacteristic { uuid }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error was caused by user input rather than the device.
    ///
    /// Input errors are reported before any radio activity takes place.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::InvalidCommand(_) | Error::Parse(_))
    }
}

/// Result type alias using medlink-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
