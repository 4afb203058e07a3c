//! Measurement protocols, one per supported device type.
//!
//! Every protocol follows the same contract: given a bound
//! [`AttributeSession`], subscribe to the device's channels, optionally
//! write control commands, collect frames for a bounded window and return
//! the retained record (or `None` when nothing usable arrived).
//!
//! | Device | Shape | Window |
//! |--------|-------|--------|
//! | Thermometer | single channel, last frame | 10 s |
//! | Blood pressure | single channel, latest timestamp | 5 s |
//! | Glucometer | control + measurement, activation write | 5 s |
//! | Oximeter | activation write, chunk acknowledgments | 5 s |
//! | Weight scale | until a terminator frame | unbounded |
//! | Stethoscope | streaming audio pipeline | audio length + 2 s |
//!
//! Any subscribe or write failure aborts the run with that error.

mod blood_pressure;
mod glucometer;
mod oximeter;
mod stethoscope;
mod thermometer;
mod weight_scale;

pub use blood_pressure::BloodPressureProtocol;
pub use glucometer::GlucometerProtocol;
pub use oximeter::OximeterProtocol;
pub use stethoscope::{StethoscopeProtocol, recording_path};
pub use thermometer::ThermometerProtocol;
pub use weight_scale::{WeightScaleProtocol, WeightUpdateCallback};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, timeout_at};
use tracing::debug;
use uuid::Uuid;

use medlink_types::{DeviceType, Measurement};

use crate::audio::SignalEnhancer;
use crate::error::Result;
use crate::session::{AttributeSession, Frame, FrameReceiver, Listener};
use crate::settings::Settings;

/// Thermometer collection window.
pub const THERMOMETER_WINDOW: Duration = Duration::from_secs(10);

/// Collection window of the glucometer, oximeter and blood pressure protocols.
pub const SHORT_WINDOW: Duration = Duration::from_secs(5);

/// A device-specific measurement run.
#[async_trait]
pub trait MeasurementProtocol: Send + Sync {
    fn device_type(&self) -> DeviceType;

    /// Run the protocol against a bound session.
    async fn run(&self, session: &AttributeSession) -> Result<Option<Measurement>>;
}

/// Select the protocol for `device`.
///
/// `weight_updates` receives intermediate weight readings when
/// [`Settings::update_weight`] is set.
pub fn protocol_for(
    device: DeviceType,
    settings: &Settings,
    enhancer: Arc<dyn SignalEnhancer>,
    weight_updates: Option<WeightUpdateCallback>,
) -> Box<dyn MeasurementProtocol> {
    match device {
        DeviceType::Thermometer => Box::new(ThermometerProtocol::new(THERMOMETER_WINDOW)),
        DeviceType::Glucometer => Box::new(GlucometerProtocol::new(SHORT_WINDOW)),
        DeviceType::Oximeter => Box::new(OximeterProtocol::new(SHORT_WINDOW)),
        DeviceType::BloodPressure => Box::new(BloodPressureProtocol::new(SHORT_WINDOW)),
        DeviceType::WeightScale => {
            let protocol = WeightScaleProtocol::new();
            match weight_updates.filter(|_| settings.update_weight) {
                Some(callback) => Box::new(protocol.on_update(callback)),
                None => Box::new(protocol),
            }
        }
        DeviceType::Stethoscope => Box::new(StethoscopeProtocol::new(
            settings.output_dir.clone(),
            settings.stethoscope_window(),
            enhancer,
        )),
    }
}

/// Deadline used when `window` runs past what `Instant` can represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Instant at which a window opened now closes.
///
/// Saturates instead of overflowing for absurdly long windows.
pub(crate) fn deadline_after(window: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(window).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Next frame before `deadline`.
///
/// `None` when the window closes or every registration of the listener
/// was dropped (unbind or link loss).
pub(crate) async fn next_frame(rx: &mut FrameReceiver, deadline: Instant) -> Option<Frame> {
    timeout_at(deadline, rx.recv()).await.ok().flatten()
}

/// Unsubscribe at the end of a window. Failure is logged only.
pub(crate) async fn release(session: &AttributeSession, uuid: Uuid, listener: &Listener) {
    if let Err(e) = session.unsubscribe(uuid, listener).await {
        debug!("Unsubscribe from {} failed: {}", uuid, e);
    }
}

/// Single-channel timed window: subscribe, fold every frame into the
/// retained value until the window closes, then unsubscribe.
pub(crate) async fn collect_window<T>(
    session: &AttributeSession,
    uuid: Uuid,
    window: Duration,
    mut retain: impl FnMut(Option<T>, &[u8]) -> Option<T> + Send,
) -> Result<Option<T>>
where
    T: Send,
{
    let (listener, mut rx) = Listener::channel();
    session.subscribe(uuid, &listener).await?;

    let deadline = deadline_after(window);
    let mut retained = None;
    while let Some(frame) = next_frame(&mut rx, deadline).await {
        retained = retain(retained, &frame.value);
    }

    release(session, uuid, &listener).await;
    Ok(retained)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::mock::MockPeripheral;
    use crate::session::AttributeSession;
    use crate::traits::GattTransport;

    pub const ADDRESS: &str = "F7:4C:87:32:62:FF";

    pub async fn bound(peripheral: &Arc<MockPeripheral>) -> AttributeSession {
        let mut session = AttributeSession::new();
        session
            .bind(Some(Arc::clone(peripheral) as Arc<dyn GattTransport>))
            .await;
        session
    }
}
