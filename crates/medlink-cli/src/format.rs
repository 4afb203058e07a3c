//! Output formatting.
//!
//! stdout carries one JSON document per line; logs and errors go to stderr.

use anyhow::Result;
use serde::Serialize;

use medlink_types::{Measurement, WeightMeasurement};

/// Serialize a command result. A closed window with nothing retained is `null`.
pub fn format_measurement(measurement: Option<&Measurement>) -> Result<String> {
    as_json(&measurement)
}

/// Intermediate weight reading, prefixed with `Update: `.
pub fn format_weight_update(reading: &WeightMeasurement) -> Result<String> {
    Ok(format!("Update: {}", as_json(reading)?))
}

fn as_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
