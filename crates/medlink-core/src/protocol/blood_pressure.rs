use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use medlink_types::{BloodPressureMeasurement, DeviceType, Measurement, uuids};

use super::{MeasurementProtocol, collect_window};
use crate::error::Result;
use crate::session::AttributeSession;

/// Keeps the stored reading with the latest timestamp.
///
/// The monitor replays its memory on connect, not necessarily in
/// chronological order. Equal timestamps keep the reading seen first.
#[derive(Debug, Clone)]
pub struct BloodPressureProtocol {
    window: Duration,
}

impl BloodPressureProtocol {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

#[async_trait]
impl MeasurementProtocol for BloodPressureProtocol {
    fn device_type(&self) -> DeviceType {
        DeviceType::BloodPressure
    }

    #[tracing::instrument(level = "debug", skip_all, fields(window = ?self.window))]
    async fn run(&self, session: &AttributeSession) -> Result<Option<Measurement>> {
        let retained = collect_window(
            session,
            uuids::BLOOD_PRESSURE_MEASUREMENT,
            self.window,
            |retained: Option<BloodPressureMeasurement>, value| {
                let Some(m) = BloodPressureMeasurement::from_bytes(value) else {
                    debug!(len = value.len(), "Discarding malformed blood pressure frame");
                    return retained;
                };
                debug!(timestamp = %m.timestamp, systolic = m.systolic, "Blood pressure frame");
                match retained {
                    Some(current) if current.timestamp >= m.timestamp => Some(current),
                    _ => Some(m),
                }
            },
        )
        .await?;
        Ok(retained.map(Measurement::from))
    }
}
