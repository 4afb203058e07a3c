use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use medlink_types::{DeviceType, Measurement, WeightMeasurement, uuids};

use super::MeasurementProtocol;
use crate::error::{Error, Result};
use crate::session::{AttributeSession, Listener};

/// Receives every intermediate weight reading.
pub type WeightUpdateCallback = Arc<dyn Fn(&WeightMeasurement) + Send + Sync>;

/// Follows the scale's live readings until it signals completion.
///
/// A 5-byte frame is a reading; a frame of any other length ends the
/// measurement. There is no window: the run waits for the terminator or
/// for the link to drop.
#[derive(Clone, Default)]
pub struct WeightScaleProtocol {
    on_update: Option<WeightUpdateCallback>,
}

impl std::fmt::Debug for WeightScaleProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightScaleProtocol")
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

impl WeightScaleProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report intermediate readings to `callback` as they arrive.
    #[must_use]
    pub fn on_update(mut self, callback: WeightUpdateCallback) -> Self {
        self.on_update = Some(callback);
        self
    }
}

#[async_trait]
impl MeasurementProtocol for WeightScaleProtocol {
    fn device_type(&self) -> DeviceType {
        DeviceType::WeightScale
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn run(&self, session: &AttributeSession) -> Result<Option<Measurement>> {
        let (listener, mut rx) = Listener::channel();
        session
            .subscribe(uuids::WEIGHT_SCALE_MEASUREMENT, &listener)
            .await?;
        // only the session's registration keeps the channel open from here
        let listener_id = listener.id();
        drop(listener);

        let mut last = None;
        loop {
            let Some(frame) = rx.recv().await else {
                debug!("Link lost before the measurement completed");
                return Err(Error::NotConnected);
            };
            match WeightMeasurement::from_bytes(&frame.value) {
                Some(reading) => {
                    debug!(kilograms = reading.kilograms, "Weight reading");
                    if let Some(callback) = &self.on_update {
                        callback(&reading);
                    }
                    last = Some(reading);
                }
                None => {
                    debug!(len = frame.value.len(), "Measurement complete");
                    break;
                }
            }
        }

        if let Err(e) = session
            .unsubscribe_id(uuids::WEIGHT_SCALE_MEASUREMENT, listener_id)
            .await
        {
            debug!("Unsubscribe failed: {}", e);
        }
        Ok(last.map(Measurement::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::mock::{MockOp, MockPeripheral};
    use crate::protocol::test_support::{ADDRESS, bound};
    use crate::traits::CharProperties;

    fn reading(raw: u16) -> Vec<u8> {
        let [hi, lo] = raw.to_be_bytes();
        vec![0xCF, 0x00, 0x00, hi, lo]
    }

    fn peripheral(frames: Vec<Vec<u8>>) -> Arc<MockPeripheral> {
        Arc::new(
            MockPeripheral::builder(ADDRESS.parse().unwrap())
                .characteristic(uuids::WEIGHT_SCALE_MEASUREMENT, CharProperties::NOTIFY)
                .on_subscribe(uuids::WEIGHT_SCALE_MEASUREMENT, frames)
                .build(),
        )
    }

    #[tokio::test]
    async fn test_terminator_returns_last_reading() {
        let p = peripheral(vec![reading(1400), reading(1470), vec![0xCF, 0x00]]);
        let session = bound(&p).await;

        let result = WeightScaleProtocol::new().run(&session).await.unwrap();
        let Some(Measurement::Weight(m)) = result else {
            panic!("expected weight, got {result:?}");
        };
        assert_eq!(m.kilograms, 73.5);
        assert_eq!(m.unit, "kilograms");
        assert_eq!(
            p.ops().last(),
            Some(&MockOp::Unsubscribe(uuids::WEIGHT_SCALE_MEASUREMENT))
        );
    }

    #[tokio::test]
    async fn test_updates_reported_in_order() {
        let p = peripheral(vec![reading(20), reading(40), reading(294), vec![]]);
        let session = bound(&p).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        WeightScaleProtocol::new()
            .on_update(Arc::new(move |m: &WeightMeasurement| {
                sink.lock().unwrap().push(m.kilograms);
            }))
            .run(&session)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1.0, 2.0, 14.7]);
    }

    #[tokio::test]
    async fn test_immediate_terminator_is_none() {
        let p = peripheral(vec![vec![0u8; 8]]);
        let session = bound(&p).await;
        assert!(WeightScaleProtocol::new().run(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_link_loss_is_not_connected() {
        let p = peripheral(vec![reading(1400)]);
        let session = bound(&p).await;
        let closer = Arc::clone(&p);
        tokio::spawn(async move {
            while closer.ops().is_empty() {
                tokio::task::yield_now().await;
            }
            closer.close_notifications();
        });

        let result = WeightScaleProtocol::new().run(&session).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }
}
