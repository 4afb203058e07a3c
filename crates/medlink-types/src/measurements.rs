//! Measurement records and the binary codecs that produce them.
//!
//! Every codec is a pure function of one notification payload. A payload
//! whose length does not match the protocol decodes to `None`; no codec
//! ever reads past the end of its input or returns partially filled data.
//!
//! Multi-byte integers are little-endian and signed unless noted.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use bytes::Buf;

use crate::types::{Range, Timestamp};

/// Exact length of a thermometer measurement frame.
pub const THERMOMETER_FRAME_LEN: usize = 13;

/// Exact length of a blood pressure measurement frame.
pub const BLOOD_PRESSURE_FRAME_LEN: usize = 19;

/// Exact length of one oximeter history record.
pub const OXIMETER_RECORD_LEN: usize = 24;

/// Minimum length of a glucometer measurement frame.
pub const MIN_GLUCOMETER_FRAME_LEN: usize = 11;

/// Exact length of a weight scale reading frame.
pub const WEIGHT_FRAME_LEN: usize = 5;

/// Read a standard BLE date-time: `u16` year then five single-byte fields.
fn read_timestamp(buf: &mut &[u8]) -> Timestamp {
    let year = buf.get_u16_le();
    Timestamp::new(
        year,
        buf.get_u8(),
        buf.get_u8(),
        buf.get_u8(),
        buf.get_u8(),
        buf.get_u8(),
    )
}

/// Temperature scale reported in a thermometer frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// Measurement site reported by the thermometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TemperatureType {
    Body,
    Object,
}

/// Flags byte of a thermometer frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct ThermometerFlags {
    pub unit: TemperatureUnit,
    pub timestamp_flag: bool,
    pub type_flag: bool,
    pub has_fever: bool,
}

impl ThermometerFlags {
    fn from_byte(flags: u8) -> Self {
        Self {
            unit: if flags & 0x80 != 0 {
                TemperatureUnit::Celsius
            } else {
                TemperatureUnit::Fahrenheit
            },
            timestamp_flag: flags & 0x40 == 0,
            type_flag: flags & 0x20 == 0,
            has_fever: flags & 0x01 == 0,
        }
    }
}

/// Thermometer reading (Health Thermometer profile, FT95 layout).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct ThermometerMeasurement {
    pub flags: ThermometerFlags,
    /// Raw temperature in tenths of a degree.
    pub temperature_tenths: i16,
    /// Temperature in degrees of [`ThermometerFlags::unit`].
    pub temperature: f32,
    pub timestamp: Timestamp,
    /// Measurement site.
    ///
    /// The peripheral's layout puts this at byte 2, which is also the high
    /// byte of the temperature field. A temperature high byte of exactly
    /// `0x02` therefore reads as `Body`, anything else as `Object`.
    #[cfg_attr(feature = "serde", serde(rename = "Type"))]
    pub body_or_object: TemperatureType,
}

impl ThermometerMeasurement {
    /// Decode a 13-byte thermometer frame.
    ///
    /// Layout: flags, `i16` temperature (tenths), two unused bytes, date-time
    /// at offset 5, one trailing byte.
    ///
    /// # Examples
    ///
    /// ```
    /// use medlink_types::measurements::{TemperatureUnit, ThermometerMeasurement};
    ///
    /// let m = ThermometerMeasurement::from_bytes(&[7, 226, 3, 0, 255, 225, 7, 4, 13, 14, 7, 0, 255]).unwrap();
    /// assert_eq!(m.temperature_tenths, 994);
    /// assert_eq!(m.flags.unit, TemperatureUnit::Fahrenheit);
    /// ```
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != THERMOMETER_FRAME_LEN {
            return None;
        }

        let mut buf = data;
        let flags = ThermometerFlags::from_byte(buf.get_u8());
        let temperature_tenths = buf.get_i16_le();
        buf.advance(2);
        let timestamp = read_timestamp(&mut buf);

        Some(Self {
            flags,
            temperature_tenths,
            temperature: f32::from(temperature_tenths) / 10.0,
            timestamp,
            body_or_object: if data[2] == 0x02 {
                TemperatureType::Body
            } else {
                TemperatureType::Object
            },
        })
    }
}

/// Glucometer reading (Glucose profile, GL50 evo layout).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct GlucometerMeasurement {
    #[cfg_attr(feature = "serde", serde(skip))]
    pub flags: u8,
    pub sequence_number: i16,
    pub timestamp: Timestamp,
    /// Glucose concentration in [`GlucometerMeasurement::UNIT`].
    #[cfg_attr(feature = "serde", serde(rename = "Glucose"))]
    pub glucose_value: f64,
    pub unit: &'static str,
}

impl GlucometerMeasurement {
    /// Unit of [`GlucometerMeasurement::glucose_value`].
    pub const UNIT: &'static str = "mmol/L";

    /// Decode a glucometer frame of at least 11 bytes.
    ///
    /// Layout: flags, `i16` sequence number, date-time, glucose byte
    /// (tenths of mmol/L). Trailing bytes are ignored.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < MIN_GLUCOMETER_FRAME_LEN {
            return None;
        }

        let mut buf = data;
        let flags = buf.get_u8();
        let sequence_number = buf.get_i16_le();
        let timestamp = read_timestamp(&mut buf);
        let glucose = buf.get_u8();

        Some(Self {
            flags,
            sequence_number,
            timestamp,
            glucose_value: f64::from(glucose) / 10.0,
            unit: Self::UNIT,
        })
    }
}

/// One oximeter history record (PO60 layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct OximeterMeasurement {
    pub header: u8,
    pub packet_number: u8,
    #[cfg_attr(feature = "serde", serde(rename = "Start"))]
    pub start: Timestamp,
    #[cfg_attr(feature = "serde", serde(rename = "End"))]
    pub end: Timestamp,
    #[cfg_attr(feature = "serde", serde(rename = "SpO2"))]
    pub spo2: Range<u16>,
    pub pulse_rate: Range<u16>,
}

impl OximeterMeasurement {
    /// Decode a 24-byte oximeter record.
    ///
    /// Years are single bytes offset from 2000. Byte 14 carries high bits for
    /// the pulse-rate range: bit 4 → min, bit 3 → average, bit 5 → max, each
    /// added as `(msb & mask) * 16`. The SpO2 range takes no correction.
    ///
    /// # Examples
    ///
    /// ```
    /// use medlink_types::measurements::OximeterMeasurement;
    ///
    /// let record = [
    ///     0xE9, 0x00, 0x0F, 0x0B, 0x06, 0x0D, 0x14, 0x25, 0x0F, 0x0B, 0x06, 0x0D,
    ///     0x14, 0x3A, 0x00, 0x00, 0x16, 0x60, 0x60, 0x60, 0x6F, 0x6E, 0x6E, 0x4B,
    /// ];
    /// let m = OximeterMeasurement::from_bytes(&record).unwrap();
    /// assert_eq!(m.start.year, 2015);
    /// assert_eq!(m.spo2.max, 0x60);
    /// ```
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != OXIMETER_RECORD_LEN {
            return None;
        }

        let timestamp_at = |offset: usize| {
            Timestamp::new(
                2000 + u16::from(data[offset]),
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
                data[offset + 4],
                data[offset + 5],
            )
        };
        let msb = u16::from(data[14]);
        let corrected = |base: u8, mask: u16| u16::from(base) + (msb & mask) * 16;

        Some(Self {
            header: data[0],
            packet_number: data[1] & 0x0F,
            start: timestamp_at(2),
            end: timestamp_at(8),
            spo2: Range {
                min: u16::from(data[18]),
                average: u16::from(data[19]),
                max: u16::from(data[17]),
            },
            pulse_rate: Range {
                min: corrected(data[21], 0x10),
                average: corrected(data[22], 0x08),
                max: corrected(data[20], 0x20),
            },
        })
    }

    /// Split a concatenation of records into 24-byte chunks and return the
    /// record with the latest start timestamp.
    ///
    /// A trailing partial record is ignored. On equal start timestamps the
    /// earlier record is kept.
    #[must_use]
    pub fn latest_of(data: &[u8]) -> Option<Self> {
        data.chunks_exact(OXIMETER_RECORD_LEN)
            .filter_map(Self::from_bytes)
            .fold(None, |latest: Option<Self>, record| match latest {
                Some(current) if current.start >= record.start => Some(current),
                _ => Some(record),
            })
    }
}

/// Blood pressure unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PressureUnit {
    #[cfg_attr(feature = "serde", serde(rename = "mmHg"))]
    MmHg,
    #[cfg_attr(feature = "serde", serde(rename = "kPa"))]
    KPa,
}

/// Flags byte of a blood pressure frame. A presence flag is `true` when its
/// bit is clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct BloodPressureFlags {
    pub unit: PressureUnit,
    pub timestamp_flag: bool,
    pub pulse_rate_flag: bool,
    pub user_id_flag: bool,
    pub measurement_status_flag: bool,
}

impl BloodPressureFlags {
    fn from_byte(flags: u8) -> Self {
        Self {
            unit: if flags & 0x80 != 0 {
                PressureUnit::KPa
            } else {
                PressureUnit::MmHg
            },
            timestamp_flag: flags & 0x40 == 0,
            pulse_rate_flag: flags & 0x20 == 0,
            user_id_flag: flags & 0x10 == 0,
            measurement_status_flag: flags & 0x08 == 0,
        }
    }
}

/// Pulse rate classification from the status byte (bits 4-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PulseRateRange {
    #[cfg_attr(feature = "serde", serde(rename = "In Range"))]
    InRange,
    #[cfg_attr(feature = "serde", serde(rename = "Exceeds Upper Limit"))]
    ExceedsUpperLimit,
    #[cfg_attr(feature = "serde", serde(rename = "Below Lower Limit"))]
    BelowLowerLimit,
}

/// Measurement status (first status byte of a blood pressure frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct BloodPressureStatus {
    pub body_movement: bool,
    /// `true` when the cuff is too loose.
    pub cuff_too_loose: bool,
    pub irregular_pulse: bool,
    pub pulse_rate_range: PulseRateRange,
    /// `true` when the measurement position was improper.
    pub improper_position: bool,
}

impl BloodPressureStatus {
    fn from_byte(status: u8) -> Self {
        Self {
            body_movement: status & 0x80 != 0,
            cuff_too_loose: status & 0x40 != 0,
            irregular_pulse: status & 0x20 != 0,
            pulse_rate_range: match status & 0x18 {
                0x00 => PulseRateRange::InRange,
                0x08 => PulseRateRange::ExceedsUpperLimit,
                _ => PulseRateRange::BelowLowerLimit,
            },
            improper_position: status & 0x04 != 0,
        }
    }
}

/// Blood pressure reading (Blood Pressure profile, BM67 layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct BloodPressureMeasurement {
    pub flags: BloodPressureFlags,
    pub systolic: i16,
    pub diastolic: i16,
    pub mean_arterial_pressure: i16,
    pub timestamp: Timestamp,
    pub pulse_rate: i16,
    /// One-based user slot (the raw byte plus one).
    pub user_id: u16,
    pub status: BloodPressureStatus,
}

impl BloodPressureMeasurement {
    /// Decode a 19-byte blood pressure frame.
    ///
    /// Layout: flags, systolic, diastolic, MAP (`i16` each), date-time,
    /// `i16` pulse rate, user byte, two status bytes (only the first is
    /// interpreted).
    ///
    /// # Examples
    ///
    /// ```
    /// use medlink_types::measurements::BloodPressureMeasurement;
    ///
    /// let m = BloodPressureMeasurement::from_bytes(&[
    ///     0x1E, 0x70, 0x00, 0x4D, 0x00, 0x00, 0x00, 0xDF, 0x07, 0x01,
    ///     0x0E, 0x0A, 0x37, 0x00, 0x48, 0x00, 0x01, 0x00, 0x00,
    /// ]).unwrap();
    /// assert_eq!((m.systolic, m.diastolic, m.pulse_rate), (112, 77, 72));
    /// ```
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != BLOOD_PRESSURE_FRAME_LEN {
            return None;
        }

        let mut buf = data;
        let flags = BloodPressureFlags::from_byte(buf.get_u8());
        let systolic = buf.get_i16_le();
        let diastolic = buf.get_i16_le();
        let mean_arterial_pressure = buf.get_i16_le();
        let timestamp = read_timestamp(&mut buf);
        let pulse_rate = buf.get_i16_le();
        let user_id = u16::from(buf.get_u8()) + 1;
        let status = BloodPressureStatus::from_byte(buf.get_u8());

        Some(Self {
            flags,
            systolic,
            diastolic,
            mean_arterial_pressure,
            timestamp,
            pulse_rate,
            user_id,
            status,
        })
    }
}

/// Weight scale reading (BF70 layout).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct WeightMeasurement {
    pub unit: &'static str,
    #[cfg_attr(feature = "serde", serde(rename = "Weight"))]
    pub kilograms: f64,
}

impl WeightMeasurement {
    /// Unit of [`WeightMeasurement::kilograms`].
    pub const UNIT: &'static str = "kilograms";

    /// Decode a 5-byte weight frame: bytes 3-4 are a big-endian count of
    /// 50-gram steps.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != WEIGHT_FRAME_LEN {
            return None;
        }
        let raw = u16::from_be_bytes([data[3], data[4]]);
        Some(Self {
            unit: Self::UNIT,
            kilograms: f64::from(raw) / 20.0,
        })
    }
}

/// Result of a stethoscope session: the recorded audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct StethoscopeResult {
    #[cfg_attr(feature = "serde", serde(rename = "FileName"))]
    pub output_file_path: String,
}

/// Any record produced by a protocol run.
///
/// Serializes as the inner record only, so the emitted JSON object has the
/// shape of the variant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Measurement {
    Thermometer(ThermometerMeasurement),
    Glucometer(GlucometerMeasurement),
    Oximeter(OximeterMeasurement),
    BloodPressure(BloodPressureMeasurement),
    Weight(WeightMeasurement),
    Stethoscope(StethoscopeResult),
}

impl From<ThermometerMeasurement> for Measurement {
    fn from(m: ThermometerMeasurement) -> Self {
        Measurement::Thermometer(m)
    }
}

impl From<GlucometerMeasurement> for Measurement {
    fn from(m: GlucometerMeasurement) -> Self {
        Measurement::Glucometer(m)
    }
}

impl From<OximeterMeasurement> for Measurement {
    fn from(m: OximeterMeasurement) -> Self {
        Measurement::Oximeter(m)
    }
}

impl From<BloodPressureMeasurement> for Measurement {
    fn from(m: BloodPressureMeasurement) -> Self {
        Measurement::BloodPressure(m)
    }
}

impl From<WeightMeasurement> for Measurement {
    fn from(m: WeightMeasurement) -> Self {
        Measurement::Weight(m)
    }
}

impl From<StethoscopeResult> for Measurement {
    fn from(m: StethoscopeResult) -> Self {
        Measurement::Stethoscope(m)
    }
}


/// Property tests for the codecs.
///
/// Run with: `cargo test -p medlink-types measurements::proptests`
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn codecs_never_panic(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = ThermometerMeasurement::from_bytes(&data);
            let _ = GlucometerMeasurement::from_bytes(&data);
            let _ = OximeterMeasurement::from_bytes(&data);
            let _ = OximeterMeasurement::latest_of(&data);
            let _ = BloodPressureMeasurement::from_bytes(&data);
            let _ = WeightMeasurement::from_bytes(&data);
        }

        #[test]
        fn fixed_length_codecs_reject_other_lengths(len in 0usize..64) {
            let data = vec![0u8; len];
            prop_assert_eq!(ThermometerMeasurement::from_bytes(&data).is_some(), len == THERMOMETER_FRAME_LEN);
            prop_assert_eq!(BloodPressureMeasurement::from_bytes(&data).is_some(), len == BLOOD_PRESSURE_FRAME_LEN);
            prop_assert_eq!(OximeterMeasurement::from_bytes(&data).is_some(), len == OXIMETER_RECORD_LEN);
            prop_assert_eq!(WeightMeasurement::from_bytes(&data).is_some(), len == WEIGHT_FRAME_LEN);
            prop_assert_eq!(GlucometerMeasurement::from_bytes(&data).is_some(), len >= MIN_GLUCOMETER_FRAME_LEN);
        }
    }
}
