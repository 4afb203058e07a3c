use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use medlink_types::{DeviceType, Measurement, OximeterMeasurement, uuids};

use super::{MeasurementProtocol, deadline_after, next_frame, release};
use crate::error::Result;
use crate::session::{AttributeSession, Listener};

/// Downloads the oximeter's stored records and keeps the one with the
/// latest start timestamp.
///
/// Records arrive in chunks of [`uuids::OXIMETER_CHUNK_LEN`] bytes spread
/// over several notifications; every completed chunk is acknowledged to
/// request the next one.
#[derive(Debug, Clone)]
pub struct OximeterProtocol {
    window: Duration,
}

impl OximeterProtocol {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

#[async_trait]
impl MeasurementProtocol for OximeterProtocol {
    fn device_type(&self) -> DeviceType {
        DeviceType::Oximeter
    }

    #[tracing::instrument(level = "debug", skip_all, fields(window = ?self.window))]
    async fn run(&self, session: &AttributeSession) -> Result<Option<Measurement>> {
        let (listener, mut rx) = Listener::channel();
        session
            .subscribe(uuids::OXIMETER_MEASUREMENT, &listener)
            .await?;
        session
            .write(uuids::OXIMETER_WRITE, &uuids::OXIMETER_ACTIVATE)
            .await?;

        let deadline = deadline_after(self.window);
        let mut buffer = Vec::new();
        while let Some(frame) = next_frame(&mut rx, deadline).await {
            buffer.extend_from_slice(&frame.value);
            if !buffer.is_empty() && buffer.len() % uuids::OXIMETER_CHUNK_LEN == 0 {
                debug!(received = buffer.len(), "Chunk complete, acknowledging");
                session
                    .write(uuids::OXIMETER_WRITE, &uuids::OXIMETER_ACK)
                    .await?;
            }
        }

        release(session, uuids::OXIMETER_MEASUREMENT, &listener).await;
        debug!(
            received = buffer.len(),
            records = buffer.len() / medlink_types::measurements::OXIMETER_RECORD_LEN,
            "Oximeter download finished"
        );
        Ok(OximeterMeasurement::latest_of(&buffer).map(Measurement::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::mock::{MockOp, MockPeripheral};
    use crate::protocol::test_support::{ADDRESS, bound};
    use crate::traits::CharProperties;

    /// A record starting on 2015-11-06 13:20:`second`, SpO2 max `spo2`.
    fn record(second: u8, spo2: u8) -> Vec<u8> {
        vec![
            0xE9, 0x00, 0x0F, 0x0B, 0x06, 0x0D, 0x14, second, 0x0F, 0x0B, 0x06, 0x0D, 0x14, 0x3A,
            0x00, 0x00, 0x16, spo2, 0x60, 0x60, 0x6F, 0x6E, 0x6E, 0x4B,
        ]
    }

    fn peripheral(frames: Vec<Vec<u8>>, acked: Vec<Vec<u8>>) -> Arc<MockPeripheral> {
        Arc::new(
            MockPeripheral::builder(ADDRESS.parse().unwrap())
                .characteristic(uuids::OXIMETER_WRITE, CharProperties::WRITE)
                .characteristic(uuids::OXIMETER_MEASUREMENT, CharProperties::NOTIFY)
                .on_write(
                    uuids::OXIMETER_WRITE,
                    &uuids::OXIMETER_ACTIVATE,
                    uuids::OXIMETER_MEASUREMENT,
                    frames,
                )
                .on_write(
                    uuids::OXIMETER_WRITE,
                    &uuids::OXIMETER_ACK,
                    uuids::OXIMETER_MEASUREMENT,
                    acked,
                )
                .build(),
        )
    }

    async fn run(p: &Arc<MockPeripheral>) -> Option<OximeterMeasurement> {
        let session = bound(p).await;
        match OximeterProtocol::new(Duration::from_secs(5))
            .run(&session)
            .await
            .unwrap()
        {
            Some(Measurement::Oximeter(m)) => Some(m),
            None => None,
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_start_timestamp_retained() {
        let records = [record(0x25, 91), record(0x30, 97), record(0x05, 93)].concat();
        let p = peripheral(vec![records[..30].to_vec(), records[30..].to_vec()], vec![]);

        let m = run(&p).await.unwrap();
        assert_eq!(m.start.second, 0x30);
        assert_eq!(m.spo2.max, 97);
        assert_eq!(p.writes_to(uuids::OXIMETER_WRITE), vec![vec![0x99, 0x00, 0x19]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_chunk_is_acknowledged() {
        // ten records fill one 240-byte chunk, the ack releases two more
        let first: Vec<u8> = (0..10u8).flat_map(|i| record(i, 90)).collect();
        let second = [record(0x3B, 99), record(0x02, 92)].concat();
        let p = peripheral(
            vec![first[..120].to_vec(), first[120..].to_vec()],
            vec![second],
        );

        let m = run(&p).await.unwrap();
        assert_eq!(m.start.second, 0x3B);
        assert_eq!(
            p.writes_to(uuids::OXIMETER_WRITE),
            vec![vec![0x99, 0x00, 0x19], vec![0x99, 0x01, 0x1A]]
        );
        assert!(p.ops().contains(&MockOp::Unsubscribe(uuids::OXIMETER_MEASUREMENT)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_data_is_none() {
        let p = peripheral(vec![], vec![]);
        assert!(run(&p).await.is_none());
    }
}
