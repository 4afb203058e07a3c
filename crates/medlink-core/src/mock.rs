//! In-process transport for testing without BLE hardware.
//!
//! [`MockPeripheral`] implements [`GattTransport`] and [`MockScanner`]
//! implements [`Scanner`], so the discovery manager, the attribute session
//! and every protocol can be exercised end to end.
//!
//! # Features
//!
//! - **Operation log**: every subscribe/unsubscribe/write/read/disconnect is
//!   recorded as a [`MockOp`]
//! - **Scripted frames**: values pushed when a characteristic is subscribed
//!   or when a specific payload is written
//! - **Failure injection**: failing subscriptions, writes, or service
//!   enumeration

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::sync::mpsc;
use uuid::Uuid;

use medlink_types::PeripheralAddress;

use crate::error::{Error, Result};
use crate::traits::{
    CharProperties, CharacteristicInfo, GattTransport, NotificationStream, ScanEvent,
    ScanEventStream, Scanner, SubscriptionKind,
};

/// Service UUID used for characteristics added without an explicit service.
pub const MOCK_SERVICE: Uuid = Uuid::from_u128(0x0000_fff0_0000_1000_8000_0080_5f9b_34fb);

/// A recorded transport operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Subscribe(Uuid, SubscriptionKind),
    Unsubscribe(Uuid),
    Write(Uuid, Vec<u8>),
    Read(Uuid),
    Disconnect,
}

type Script = Vec<(Uuid, Vec<u8>)>;

/// A mock peripheral.
///
/// # Example
///
/// ```
/// use medlink_core::mock::MockPeripheral;
/// use medlink_core::traits::{CharProperties, GattTransport};
/// use medlink_types::uuids;
///
/// #[tokio::main]
/// async fn main() {
///     let device = MockPeripheral::builder("F7:4C:87:32:62:FF".parse().unwrap())
///         .characteristic(uuids::WEIGHT_SCALE_MEASUREMENT, CharProperties::NOTIFY)
///         .build();
///     assert!(device.is_connected().await);
///     assert_eq!(device.services().await.unwrap().len(), 1);
/// }
/// ```
pub struct MockPeripheral {
    address: PeripheralAddress,
    connected: AtomicBool,
    services: Vec<(Uuid, Vec<CharacteristicInfo>)>,
    failing_services: Vec<Uuid>,
    reads: HashMap<Uuid, Vec<u8>>,
    on_subscribe: HashMap<Uuid, Script>,
    on_write: Vec<(Uuid, Vec<u8>, Script)>,
    fail_subscribe: AtomicBool,
    fail_write: AtomicBool,
    ops: Mutex<Vec<MockOp>>,
    sender: Mutex<Option<mpsc::UnboundedSender<(Uuid, Vec<u8>)>>>,
    pending: Mutex<Script>,
}

impl std::fmt::Debug for MockPeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPeripheral")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("services", &self.services.len())
            .finish_non_exhaustive()
    }
}

impl MockPeripheral {
    pub fn builder(address: PeripheralAddress) -> MockPeripheralBuilder {
        MockPeripheralBuilder::new(address)
    }

    /// A peripheral with a random address and no characteristics.
    pub fn random() -> Self {
        Self::builder(PeripheralAddress::new(rand::random::<[u8; 6]>())).build()
    }

    /// Operations recorded so far.
    pub fn ops(&self) -> Vec<MockOp> {
        self.lock_ops().clone()
    }

    /// Operations recorded for one characteristic.
    pub fn ops_for(&self, uuid: Uuid) -> Vec<MockOp> {
        self.lock_ops()
            .iter()
            .filter(|op| match op {
                MockOp::Subscribe(u, _) | MockOp::Unsubscribe(u) | MockOp::Read(u) => *u == uuid,
                MockOp::Write(u, _) => *u == uuid,
                MockOp::Disconnect => false,
            })
            .cloned()
            .collect()
    }

    /// Payloads written to one characteristic.
    pub fn writes_to(&self, uuid: Uuid) -> Vec<Vec<u8>> {
        self.lock_ops()
            .iter()
            .filter_map(|op| match op {
                MockOp::Write(u, data) if *u == uuid => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Push a value as if the peripheral notified it.
    pub fn notify(&self, uuid: Uuid, value: Vec<u8>) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(tx) => {
                let _ = tx.send((uuid, value));
            }
            None => self
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((uuid, value)),
        }
    }

    /// End the notification stream, as on link loss.
    pub fn close_notifications(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    fn lock_ops(&self) -> std::sync::MutexGuard<'_, Vec<MockOp>> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, op: MockOp) {
        self.lock_ops().push(op);
    }

    fn play(&self, script: &Script) {
        for (uuid, value) in script {
            self.notify(*uuid, value.clone());
        }
    }
}

#[async_trait]
impl GattTransport for MockPeripheral {
    fn address(&self) -> PeripheralAddress {
        self.address
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn services(&self) -> Result<Vec<Uuid>> {
        Ok(self
            .services
            .iter()
            .map(|(uuid, _)| *uuid)
            .chain(self.failing_services.iter().copied())
            .collect())
    }

    async fn characteristics(&self, service: Uuid) -> Result<Vec<CharacteristicInfo>> {
        if self.failing_services.contains(&service) {
            return Err(Error::Io(std::io::Error::other(format!(
                "mock enumeration failure for service {service}"
            ))));
        }
        Ok(self
            .services
            .iter()
            .find(|(uuid, _)| *uuid == service)
            .map(|(_, chars)| chars.clone())
            .unwrap_or_default())
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicInfo,
        kind: SubscriptionKind,
    ) -> Result<()> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("mock subscribe failure")));
        }
        self.record(MockOp::Subscribe(characteristic.uuid, kind));
        if let Some(script) = self.on_subscribe.get(&characteristic.uuid) {
            self.play(script);
        }
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: &CharacteristicInfo) -> Result<()> {
        self.record(MockOp::Unsubscribe(characteristic.uuid));
        Ok(())
    }

    async fn write(&self, characteristic: &CharacteristicInfo, data: &[u8]) -> Result<()> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(Error::WriteFailed {
                uuid: characteristic.uuid,
                reason: "mock write failure".to_string(),
            });
        }
        self.record(MockOp::Write(characteristic.uuid, data.to_vec()));
        for (uuid, payload, script) in &self.on_write {
            if *uuid == characteristic.uuid && payload.as_slice() == data {
                self.play(script);
            }
        }
        Ok(())
    }

    async fn read(&self, characteristic: &CharacteristicInfo) -> Result<Vec<u8>> {
        self.record(MockOp::Read(characteristic.uuid));
        Ok(self
            .reads
            .get(&characteristic.uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        for item in self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            let _ = tx.send(item);
        }
        *sender = Some(tx);
        drop(sender);

        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    async fn disconnect(&self) -> Result<()> {
        self.record(MockOp::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        self.close_notifications();
        Ok(())
    }
}

/// Builder for [`MockPeripheral`].
#[derive(Debug)]
pub struct MockPeripheralBuilder {
    address: PeripheralAddress,
    services: Vec<(Uuid, Vec<CharacteristicInfo>)>,
    failing_services: Vec<Uuid>,
    reads: HashMap<Uuid, Vec<u8>>,
    on_subscribe: HashMap<Uuid, Script>,
    on_write: Vec<(Uuid, Vec<u8>, Script)>,
}

impl MockPeripheralBuilder {
    pub fn new(address: PeripheralAddress) -> Self {
        Self {
            address,
            services: Vec::new(),
            failing_services: Vec::new(),
            reads: HashMap::new(),
            on_subscribe: HashMap::new(),
            on_write: Vec::new(),
        }
    }

    /// Add a characteristic to [`MOCK_SERVICE`].
    #[must_use]
    pub fn characteristic(self, uuid: Uuid, properties: CharProperties) -> Self {
        self.service_characteristic(MOCK_SERVICE, uuid, properties)
    }

    /// Add a characteristic to a specific service.
    #[must_use]
    pub fn service_characteristic(
        mut self,
        service: Uuid,
        uuid: Uuid,
        properties: CharProperties,
    ) -> Self {
        let info = CharacteristicInfo {
            service,
            uuid,
            properties,
        };
        match self.services.iter_mut().find(|(s, _)| *s == service) {
            Some((_, chars)) => chars.push(info),
            None => self.services.push((service, vec![info])),
        }
        self
    }

    /// A service whose characteristic enumeration fails.
    #[must_use]
    pub fn failing_service(mut self, service: Uuid) -> Self {
        self.failing_services.push(service);
        self
    }

    /// Value returned by reads of `uuid`.
    #[must_use]
    pub fn read_value(mut self, uuid: Uuid, value: Vec<u8>) -> Self {
        self.reads.insert(uuid, value);
        self
    }

    /// Frames pushed on `uuid` as soon as it is subscribed.
    #[must_use]
    pub fn on_subscribe(mut self, uuid: Uuid, frames: Vec<Vec<u8>>) -> Self {
        self.on_subscribe
            .entry(uuid)
            .or_default()
            .extend(frames.into_iter().map(|f| (uuid, f)));
        self
    }

    /// Frames pushed on `notify_uuid` each time `payload` is written to
    /// `write_uuid`.
    #[must_use]
    pub fn on_write(
        mut self,
        write_uuid: Uuid,
        payload: &[u8],
        notify_uuid: Uuid,
        frames: Vec<Vec<u8>>,
    ) -> Self {
        self.on_write.push((
            write_uuid,
            payload.to_vec(),
            frames.into_iter().map(|f| (notify_uuid, f)).collect(),
        ));
        self
    }

    pub fn build(self) -> MockPeripheral {
        MockPeripheral {
            address: self.address,
            connected: AtomicBool::new(true),
            services: self.services,
            failing_services: self.failing_services,
            reads: self.reads,
            on_subscribe: self.on_subscribe,
            on_write: self.on_write,
            fail_subscribe: AtomicBool::new(false),
            fail_write: AtomicBool::new(false),
            ops: Mutex::new(Vec::new()),
            sender: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
        }
    }
}

/// A mock advertisement watcher.
///
/// Each `start_watch` replays the configured advertisements and then stays
/// silent (or yields the configured watcher error).
#[derive(Debug, Default)]
pub struct MockScanner {
    advertisements: Vec<PeripheralAddress>,
    peripherals: Vec<Arc<MockPeripheral>>,
    watch_error: Option<String>,
    watching: AtomicBool,
    open_calls: AtomicU32,
}

impl MockScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an advertisement from an address with no connectable peripheral.
    #[must_use]
    pub fn advertise(mut self, address: PeripheralAddress) -> Self {
        self.advertisements.push(address);
        self
    }

    /// Add a connectable peripheral; it also advertises.
    #[must_use]
    pub fn with_peripheral(mut self, peripheral: impl Into<Arc<MockPeripheral>>) -> Self {
        let peripheral = peripheral.into();
        self.advertisements.push(peripheral.address);
        self.peripherals.push(peripheral);
        self
    }

    /// Make the watcher fail after the configured advertisements.
    #[must_use]
    pub fn fail_watch(mut self, reason: impl Into<String>) -> Self {
        self.watch_error = Some(reason.into());
        self
    }

    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    /// Number of `open` calls so far.
    pub fn open_calls(&self) -> u32 {
        self.open_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scanner for MockScanner {
    async fn start_watch(&self) -> Result<ScanEventStream> {
        self.watching.store(true, Ordering::SeqCst);
        let mut events: Vec<ScanEvent> = self
            .advertisements
            .iter()
            .copied()
            .map(ScanEvent::Seen)
            .collect();
        if let Some(reason) = &self.watch_error {
            events.push(ScanEvent::WatcherError(reason.clone()));
        }
        Ok(Box::pin(stream::iter(events).chain(stream::pending())))
    }

    async fn stop_watch(&self) -> Result<()> {
        self.watching.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn open(&self, address: PeripheralAddress) -> Result<Option<Arc<dyn GattTransport>>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .peripherals
            .iter()
            .find(|p| p.address == address)
            .map(|p| {
                p.set_connected(true);
                Arc::clone(p) as Arc<dyn GattTransport>
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_mock_peripheral_records_ops() {
        let uuid = Uuid::from_u128(1);
        let p = MockPeripheral::builder("AA:BB:CC:DD:EE:FF".parse().unwrap())
            .characteristic(uuid, CharProperties::WRITE | CharProperties::NOTIFY)
            .build();
        let info = p.characteristics(MOCK_SERVICE).await.unwrap()[0];

        p.subscribe(&info, SubscriptionKind::Notify).await.unwrap();
        p.write(&info, &[1, 2]).await.unwrap();
        p.disconnect().await.unwrap();

        assert_eq!(
            p.ops(),
            vec![
                MockOp::Subscribe(uuid, SubscriptionKind::Notify),
                MockOp::Write(uuid, vec![1, 2]),
                MockOp::Disconnect,
            ]
        );
        assert_eq!(p.writes_to(uuid), vec![vec![1, 2]]);
        assert!(!p.is_connected().await);
    }

    #[tokio::test]
    async fn test_scripted_write_response() {
        let control = Uuid::from_u128(1);
        let data = Uuid::from_u128(2);
        let p = MockPeripheral::builder("AA:BB:CC:DD:EE:FF".parse().unwrap())
            .characteristic(control, CharProperties::WRITE)
            .characteristic(data, CharProperties::NOTIFY)
            .on_write(control, &[0x01], data, vec![vec![7], vec![8]])
            .build();
        let mut stream = p.notifications().await.unwrap();
        let info = p.characteristics(MOCK_SERVICE).await.unwrap()[0];

        p.write(&info, &[0x02]).await.unwrap();
        p.write(&info, &[0x01]).await.unwrap();

        assert_eq!(stream.next().await, Some((data, vec![7])));
        assert_eq!(stream.next().await, Some((data, vec![8])));
    }

    #[tokio::test]
    async fn test_pending_frames_flushed_on_stream_open() {
        let p = MockPeripheral::random();
        let uuid = Uuid::from_u128(3);
        p.notify(uuid, vec![1]);

        let mut stream = p.notifications().await.unwrap();
        assert_eq!(stream.next().await, Some((uuid, vec![1])));

        p.close_notifications();
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_scanner_replays_advertisements() {
        let address: PeripheralAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let scanner = MockScanner::new().advertise(address).fail_watch("boom");

        let mut events = scanner.start_watch().await.unwrap();
        assert!(scanner.is_watching());
        assert_eq!(events.next().await, Some(ScanEvent::Seen(address)));
        assert_eq!(
            events.next().await,
            Some(ScanEvent::WatcherError("boom".into()))
        );

        scanner.stop_watch().await.unwrap();
        assert!(!scanner.is_watching());
        assert!(scanner.open(address).await.unwrap().is_none());
    }
}
