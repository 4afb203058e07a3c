use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use medlink_types::{DeviceType, GlucometerMeasurement, Measurement, uuids};

use super::{MeasurementProtocol, deadline_after, next_frame, release};
use crate::error::Result;
use crate::session::{AttributeSession, Listener};

/// Requests the last stored record through the record access control
/// point and keeps the measurement with the latest timestamp.
#[derive(Debug, Clone)]
pub struct GlucometerProtocol {
    window: Duration,
}

impl GlucometerProtocol {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

#[async_trait]
impl MeasurementProtocol for GlucometerProtocol {
    fn device_type(&self) -> DeviceType {
        DeviceType::Glucometer
    }

    #[tracing::instrument(level = "debug", skip_all, fields(window = ?self.window))]
    async fn run(&self, session: &AttributeSession) -> Result<Option<Measurement>> {
        let (listener, mut rx) = Listener::channel();
        session
            .subscribe(uuids::GLUCOMETER_CONTROL, &listener)
            .await?;
        session
            .subscribe(uuids::GLUCOMETER_MEASUREMENT, &listener)
            .await?;
        session
            .write(uuids::GLUCOMETER_CONTROL, &uuids::GLUCOMETER_REPORT_LAST)
            .await?;

        let deadline = deadline_after(self.window);
        let mut retained: Option<GlucometerMeasurement> = None;
        while let Some(frame) = next_frame(&mut rx, deadline).await {
            if frame.characteristic != uuids::GLUCOMETER_MEASUREMENT {
                debug!(response = ?frame.value, "Control point response");
                continue;
            }
            let Some(m) = GlucometerMeasurement::from_bytes(&frame.value) else {
                debug!(len = frame.value.len(), "Discarding malformed glucometer frame");
                continue;
            };
            debug!(sequence = m.sequence_number, glucose = m.glucose_value, "Glucometer frame");
            retained = match retained {
                Some(current) if current.timestamp >= m.timestamp => Some(current),
                _ => Some(m),
            };
        }

        release(session, uuids::GLUCOMETER_MEASUREMENT, &listener).await;
        release(session, uuids::GLUCOMETER_CONTROL, &listener).await;
        Ok(retained.map(Measurement::from))
    }
}
