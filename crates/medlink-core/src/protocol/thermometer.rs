use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use medlink_types::{DeviceType, Measurement, ThermometerMeasurement, uuids};

use super::{MeasurementProtocol, collect_window};
use crate::error::Result;
use crate::session::AttributeSession;

/// Keeps the last decodable thermometer frame of the window.
#[derive(Debug, Clone)]
pub struct ThermometerProtocol {
    window: Duration,
}

impl ThermometerProtocol {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

#[async_trait]
impl MeasurementProtocol for ThermometerProtocol {
    fn device_type(&self) -> DeviceType {
        DeviceType::Thermometer
    }

    #[tracing::instrument(level = "debug", skip_all, fields(window = ?self.window))]
    async fn run(&self, session: &AttributeSession) -> Result<Option<Measurement>> {
        let retained = collect_window(
            session,
            uuids::THERMOMETER_MEASUREMENT,
            self.window,
            |retained, value| match ThermometerMeasurement::from_bytes(value) {
                Some(m) => {
                    debug!(temperature = m.temperature, "Thermometer frame");
                    Some(m)
                }
                None => {
                    debug!(len = value.len(), "Discarding malformed thermometer frame");
                    retained
                }
            },
        )
        .await?;
        Ok(retained.map(Measurement::from))
    }
}
