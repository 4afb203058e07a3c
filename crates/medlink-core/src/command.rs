//! `<DeviceType> <MacAddress>` commands.

use std::fmt;
use std::str::FromStr;

use medlink_types::{DeviceType, PeripheralAddress};

use crate::error::{Error, Result};

/// One measurement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub device: DeviceType,
    pub address: PeripheralAddress,
}

impl Command {
    pub fn new(device: DeviceType, address: PeripheralAddress) -> Self {
        Self { device, address }
    }

    /// Build a command from exactly two arguments.
    ///
    /// Validation order: argument count, then device type, then address;
    /// the first failure is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use medlink_core::Command;
    /// use medlink_types::DeviceType;
    ///
    /// let command = Command::from_args(&["Oximeter", "00:1C:05:FF:AB:01"]).unwrap();
    /// assert_eq!(command.device, DeviceType::Oximeter);
    /// assert!(Command::from_args(&["Oximeter"]).is_err());
    /// ```
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let [device, address] = args else {
            let joined = args.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
            return Err(Error::InvalidCommand(joined));
        };
        let device = device.as_ref().parse::<DeviceType>()?;
        let address = address.as_ref().parse::<PeripheralAddress>()?;
        Ok(Self { device, address })
    }
}

impl FromStr for Command {
    type Err = Error;

    /// Parse a whitespace-separated command line.
    fn from_str(line: &str) -> Result<Self> {
        let args: Vec<&str> = line.split_whitespace().collect();
        Self::from_args(&args)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device, self.address)
    }
}
