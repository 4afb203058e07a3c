//! Bluetooth UUIDs and command payloads for the supported peripherals.
//!
//! All characteristics use the Bluetooth base UUID
//! (`0000xxxx-0000-1000-8000-00805f9b34fb`).

use uuid::{Uuid, uuid};

// --- Thermometer ---

/// Temperature measurement characteristic (indicate).
pub const THERMOMETER_MEASUREMENT: Uuid = uuid!("00002a1c-0000-1000-8000-00805f9b34fb");

// --- Glucometer ---

/// Record access control point.
pub const GLUCOMETER_CONTROL: Uuid = uuid!("00002a52-0000-1000-8000-00805f9b34fb");

/// Glucose measurement characteristic.
pub const GLUCOMETER_MEASUREMENT: Uuid = uuid!("00002a18-0000-1000-8000-00805f9b34fb");

/// "Report stored records: last record" request for [`GLUCOMETER_CONTROL`].
pub const GLUCOMETER_REPORT_LAST: [u8; 2] = [0x01, 0x06];

// --- Oximeter ---

/// Vendor write characteristic.
pub const OXIMETER_WRITE: Uuid = uuid!("0000ff01-0000-1000-8000-00805f9b34fb");

/// Vendor notify characteristic carrying history records.
pub const OXIMETER_MEASUREMENT: Uuid = uuid!("0000ff02-0000-1000-8000-00805f9b34fb");

/// Starts the history transfer.
pub const OXIMETER_ACTIVATE: [u8; 3] = [0x99, 0x00, 0x19];

/// Requests the next history chunk.
pub const OXIMETER_ACK: [u8; 3] = [0x99, 0x01, 0x1A];

/// Bytes the oximeter sends before waiting for [`OXIMETER_ACK`].
pub const OXIMETER_CHUNK_LEN: usize = 240;

// --- Blood pressure ---

/// Blood pressure measurement characteristic (indicate).
pub const BLOOD_PRESSURE_MEASUREMENT: Uuid = uuid!("00002a35-0000-1000-8000-00805f9b34fb");

// --- Weight scale ---

/// Vendor weight characteristic.
pub const WEIGHT_SCALE_MEASUREMENT: Uuid = uuid!("0000ffe1-0000-1000-8000-00805f9b34fb");

// --- Stethoscope ---

/// Audio frame characteristic.
pub const STETHOSCOPE_AUDIO: Uuid = uuid!("00000003-0000-1000-8000-00805f9b34fb");

/// Echo mode characteristic (Bell / Diaphragm).
pub const STETHOSCOPE_MODE: Uuid = uuid!("00000008-0000-1000-8000-00805f9b34fb");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_profile_uuids() {
        assert_eq!(
            THERMOMETER_MEASUREMENT.to_string(),
            "00002a1c-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            GLUCOMETER_MEASUREMENT.to_string(),
            "00002a18-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            BLOOD_PRESSURE_MEASUREMENT.to_string(),
            "00002a35-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_vendor_uuids() {
        assert_eq!(
            OXIMETER_WRITE.to_string(),
            "0000ff01-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            WEIGHT_SCALE_MEASUREMENT.to_string(),
            "0000ffe1-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            STETHOSCOPE_AUDIO.to_string(),
            "00000003-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_all_uuids_unique() {
        let all = [
            THERMOMETER_MEASUREMENT,
            GLUCOMETER_CONTROL,
            GLUCOMETER_MEASUREMENT,
            OXIMETER_WRITE,
            OXIMETER_MEASUREMENT,
            BLOOD_PRESSURE_MEASUREMENT,
            WEIGHT_SCALE_MEASUREMENT,
            STETHOSCOPE_AUDIO,
            STETHOSCOPE_MODE,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_oximeter_chunk_holds_whole_records() {
        assert_eq!(OXIMETER_CHUNK_LEN % 24, 0);
    }
}
