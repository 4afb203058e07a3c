//! Error types for input parsing in medlink-types.

use thiserror::Error;

/// Errors that can occur when parsing user-supplied identifiers.
///
/// Measurement codecs never produce this type: a frame of the wrong length
/// decodes to `None`. This enum only covers textual input such as device
/// type names and hardware addresses.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The device type name is not one of the supported peripherals.
    #[error("Invalid device type '{0}'. Valid device types: {valid}", valid = crate::types::DeviceType::NAMES.join(", "))]
    InvalidDeviceType(String),

    /// The hardware address is not six hex octets.
    #[error("Invalid mac address '{0}'. Correct format: XX:XX:XX:XX:XX:XX")]
    InvalidMacAddress(String),
}

/// Result type alias using medlink-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
