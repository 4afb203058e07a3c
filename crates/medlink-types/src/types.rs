//! Core identifier and value types shared by every peripheral protocol.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Type of supported peripheral.
///
/// Each variant selects one interaction protocol. The textual form
/// (`Display` / `FromStr`) is the name accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeviceType {
    /// Beurer FT95 clinical thermometer.
    Thermometer,
    /// Beurer GL50 evo glucometer.
    Glucometer,
    /// Beurer PO60 pulse oximeter.
    Oximeter,
    /// Beurer BM67 blood pressure monitor.
    BloodPressure,
    /// Beurer BF70 weight scale.
    WeightScale,
    /// Mintti Smartho electronic stethoscope.
    Stethoscope,
}

impl DeviceType {
    /// Every supported device type, in command-line listing order.
    pub const ALL: [DeviceType; 6] = [
        DeviceType::Thermometer,
        DeviceType::Glucometer,
        DeviceType::Oximeter,
        DeviceType::BloodPressure,
        DeviceType::WeightScale,
        DeviceType::Stethoscope,
    ];

    /// Command-line names, matching [`DeviceType::ALL`].
    pub const NAMES: [&'static str; 6] = [
        "Thermometer",
        "Glucometer",
        "Oximeter",
        "BloodPressure",
        "WeightScale",
        "Stethoscope",
    ];

    /// The command-line name of this device type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DeviceType::Thermometer => "Thermometer",
            DeviceType::Glucometer => "Glucometer",
            DeviceType::Oximeter => "Oximeter",
            DeviceType::BloodPressure => "BloodPressure",
            DeviceType::WeightScale => "WeightScale",
            DeviceType::Stethoscope => "Stethoscope",
        }
    }
}

impl FromStr for DeviceType {
    type Err = ParseError;

    /// Parse a device type name (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use medlink_types::DeviceType;
    ///
    /// assert_eq!("Oximeter".parse::<DeviceType>(), Ok(DeviceType::Oximeter));
    /// assert_eq!("weightscale".parse::<DeviceType>(), Ok(DeviceType::WeightScale));
    /// assert!("Toaster".parse::<DeviceType>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::InvalidDeviceType(s.to_string()))
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 6-byte Bluetooth hardware address.
///
/// The canonical textual form is six colon-separated uppercase hex octets
/// (`AA:BB:CC:DD:EE:FF`). Equality is byte-wise, so textual comparisons are
/// case-insensitive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeripheralAddress([u8; 6]);

impl PeripheralAddress {
    /// Create an address from its six octets, most significant first.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// The six octets, most significant first.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Create an address from the low 48 bits of an integer.
    pub fn from_u64(value: u64) -> Self {
        let bytes = value.to_be_bytes();
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&bytes[2..]);
        Self(octets)
    }

    /// The address as a 48-bit integer.
    pub fn to_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes[2..].copy_from_slice(&self.0);
        u64::from_be_bytes(bytes)
    }
}

impl FromStr for PeripheralAddress {
    type Err = ParseError;

    /// Parse six hex octets.
    ///
    /// Accepts the bare 12-digit form or any single-character separator
    /// between octets (`AA:BB:..`, `aa-bb-..`). The separator itself is not
    /// checked beyond its position.
    ///
    /// # Examples
    ///
    /// ```
    /// use medlink_types::PeripheralAddress;
    ///
    /// let a: PeripheralAddress = "fc:d2:b6:56:15:5d".parse().unwrap();
    /// let b: PeripheralAddress = "FCD2B656155D".parse().unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.to_string(), "FC:D2:B6:56:15:5D");
    /// assert!("FC:D2:B6".parse::<PeripheralAddress>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());
        let raw = s.trim().as_bytes();

        let stride = match raw.len() {
            12 => 2,
            17 => 3,
            _ => return Err(invalid()),
        };

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            let start = i * stride;
            let pair = core::str::from_utf8(&raw[start..start + 2]).map_err(|_| invalid())?;
            if !pair.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for PeripheralAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[cfg(feature = "serde")]
impl Serialize for PeripheralAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for PeripheralAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Calendar timestamp as reported by a peripheral. No timezone.
///
/// Ordering is total and follows calendar order: fields are compared
/// year first, second last. Out-of-range field values (month 13, etc.)
/// still order consistently; use [`Timestamp::to_datetime`] to validate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// Construct a timestamp from its calendar fields.
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Convert to a [`time::PrimitiveDateTime`], or `None` if the fields do
    /// not form a valid calendar date and time.
    pub fn to_datetime(&self) -> Option<time::PrimitiveDateTime> {
        let month = time::Month::try_from(self.month).ok()?;
        let date = time::Date::from_calendar_date(i32::from(self.year), month, self.day).ok()?;
        let time = time::Time::from_hms(self.hour, self.minute, self.second).ok()?;
        Some(time::PrimitiveDateTime::new(date, time))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// A bounded-value summary: minimum, average and maximum of one quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct Range<T> {
    pub min: T,
    pub average: T,
    pub max: T,
}

/// Stethoscope chest-piece mode, reported on the mode characteristic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EchoMode {
    /// Bell side: low-frequency sounds. Gain stage uses clip-distortion.
    #[default]
    Bell,
    /// Diaphragm side: high-frequency sounds. Gain stage uses automatic gain.
    Diaphragm,
}

impl EchoMode {
    /// Decode the first byte of a mode notification.
    ///
    /// Unknown values yield `None` and leave the current mode unchanged.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(EchoMode::Bell),
            1 => Some(EchoMode::Diaphragm),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_round_trip_names() {
        for (ty, name) in DeviceType::ALL.iter().zip(DeviceType::NAMES) {
            assert_eq!(ty.to_string(), name);
            assert_eq!(name.parse::<DeviceType>().unwrap(), *ty);
        }
    }

    #[test]
    fn test_device_type_parse_case_insensitive() {
        assert_eq!(
            "bloodpressure".parse::<DeviceType>().unwrap(),
            DeviceType::BloodPressure
        );
        assert_eq!(
            " STETHOSCOPE ".parse::<DeviceType>().unwrap(),
            DeviceType::Stethoscope
        );
    }

    #[test]
    fn test_device_type_parse_unknown() {
        let err = "Scale".parse::<DeviceType>().unwrap_err();
        assert_eq!(err, ParseError::InvalidDeviceType("Scale".to_string()));
        assert!(err.to_string().contains("WeightScale"));
    }

    #[test]
    fn test_address_parse_forms() {
        let expected = PeripheralAddress::new([0xF7, 0x4C, 0x87, 0x32, 0x62, 0xFF]);
        assert_eq!("f7:4c:87:32:62:ff".parse(), Ok(expected));
        assert_eq!("F7-4C-87-32-62-FF".parse(), Ok(expected));
        assert_eq!("f74c873262ff".parse(), Ok(expected));
    }

    #[test]
    fn test_address_parse_rejects_malformed() {
        for bad in ["", "f7:4c:87:32:62", "f7:4c:87:32:62:fg", "f7:4c:87:32:62:ff:00", "zz4c873262ff"] {
            assert!(
                bad.parse::<PeripheralAddress>().is_err(),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_address_display_uppercase() {
        let addr = PeripheralAddress::new([0x34, 0x14, 0xb5, 0xa0, 0x1d, 0x03]);
        assert_eq!(addr.to_string(), "34:14:B5:A0:1D:03");
    }

    #[test]
    fn test_address_u64_conversion() {
        let addr = PeripheralAddress::from_u64(0xFBDC_1E37_47BC);
        assert_eq!(addr.to_string(), "FB:DC:1E:37:47:BC");
        assert_eq!(addr.to_u64(), 0xFBDC_1E37_47BC);
    }

    #[test]
    fn test_address_case_insensitive_equality() {
        let lower: PeripheralAddress = "fb:dc:1e:37:47:bc".parse().unwrap();
        let upper: PeripheralAddress = "FB:DC:1E:37:47:BC".parse().unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_timestamp_ordering_is_calendar_order() {
        let earlier = Timestamp::new(2015, 1, 14, 10, 55, 0);
        let later_second = Timestamp::new(2015, 1, 14, 10, 55, 1);
        let later_year = Timestamp::new(2016, 1, 1, 0, 0, 0);
        assert!(earlier < later_second);
        assert!(later_second < later_year);
        assert_eq!(earlier.max(later_year), later_year);
    }

    #[test]
    fn test_timestamp_to_datetime() {
        let ts = Timestamp::new(2022, 8, 5, 10, 10, 0);
        let dt = ts.to_datetime().unwrap();
        assert_eq!(dt.year(), 2022);
        assert_eq!(u8::from(dt.month()), 8);
        assert!(Timestamp::new(2022, 13, 1, 0, 0, 0).to_datetime().is_none());
    }

    #[test]
    fn test_timestamp_display() {
        let ts = Timestamp::new(2015, 1, 14, 10, 55, 0);
        assert_eq!(ts.to_string(), "2015-01-14 10:55:00");
    }

    #[test]
    fn test_echo_mode_from_byte() {
        assert_eq!(EchoMode::from_byte(0), Some(EchoMode::Bell));
        assert_eq!(EchoMode::from_byte(1), Some(EchoMode::Diaphragm));
        assert_eq!(EchoMode::from_byte(7), None);
    }
}
