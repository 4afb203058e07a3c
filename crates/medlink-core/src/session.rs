//! Attribute session: capability-checked operations on one bound peripheral.
//!
//! Value-change events are fanned out by a single dispatcher task to
//! per-subscription channels. A protocol creates a [`Listener`] with
//! [`Listener::channel`], subscribes it to one or more characteristics and
//! reads [`Frame`]s from the receiver. Frames for one characteristic arrive
//! in the order the peripheral sent them.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use medlink_types::PeripheralAddress;

use crate::error::{Error, Result};
use crate::traits::{CharProperties, CharacteristicInfo, GattTransport, SubscriptionKind};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// One value-change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// Receiving end of a [`Listener`].
pub type FrameReceiver = mpsc::UnboundedReceiver<Frame>;

/// A registration target for value-change events.
///
/// Clones share identity: subscribing a clone of an already-registered
/// listener to the same characteristic is a no-op.
#[derive(Debug, Clone)]
pub struct Listener {
    id: u64,
    tx: mpsc::UnboundedSender<Frame>,
}

impl Listener {
    /// Create a listener and the receiver its frames are delivered to.
    ///
    /// The receiver yields `None` once the session drops every registration
    /// of this listener (unbind or link loss) and all clones are gone.
    pub fn channel() -> (Self, FrameReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

type Registry = Arc<RwLock<HashMap<Uuid, Vec<Listener>>>>;

struct Dispatcher {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Session over at most one connected peripheral.
///
/// Created unbound. [`AttributeSession::bind`] attaches a transport and
/// discovers its characteristics; every operation fails fast with
/// [`Error::NotConnected`] until then.
#[derive(Default)]
pub struct AttributeSession {
    transport: Option<Arc<dyn GattTransport>>,
    characteristics: Vec<CharacteristicInfo>,
    registry: Registry,
    dispatcher: Mutex<Option<Dispatcher>>,
}

impl std::fmt::Debug for AttributeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeSession")
            .field("address", &self.address())
            .field("characteristics", &self.characteristics.len())
            .finish_non_exhaustive()
    }
}

impl AttributeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the bound peripheral, if any.
    pub fn address(&self) -> Option<PeripheralAddress> {
        self.transport.as_ref().map(|t| t.address())
    }

    pub fn is_bound(&self) -> bool {
        self.transport.is_some()
    }

    /// The discovered characteristic set.
    pub fn characteristics(&self) -> &[CharacteristicInfo] {
        &self.characteristics
    }

    /// Discovered properties of a characteristic.
    pub fn properties(&self, uuid: Uuid) -> Option<CharProperties> {
        self.lookup(uuid).map(|c| c.properties)
    }

    /// Replace the bound peripheral and discover its characteristics.
    ///
    /// Prior state is cleared first. `None` leaves the session unbound.
    /// Discovery errors are logged; the set stays partially populated.
    #[tracing::instrument(level = "info", skip_all, fields(address = ?handle.as_ref().map(|h| h.address())))]
    pub async fn bind(&mut self, handle: Option<Arc<dyn GattTransport>>) {
        self.reset().await;
        let Some(handle) = handle else {
            return;
        };
        self.transport = Some(handle);
        if let Err(e) = self.discover_all().await {
            warn!("Characteristic discovery incomplete: {}", e);
        }
    }

    /// Drop the bound peripheral and disconnect it.
    pub async fn unbind(&mut self) {
        let transport = self.transport.clone();
        self.reset().await;
        if let Some(transport) = transport
            && let Err(e) = transport.disconnect().await
        {
            warn!("Disconnect failed: {}", e);
        }
    }

    async fn reset(&mut self) {
        if let Some(dispatcher) = self.dispatcher.lock().await.take() {
            dispatcher.cancel.cancel();
            let _ = dispatcher.handle.await;
        }
        self.registry.write().await.clear();
        self.characteristics.clear();
        self.transport = None;
    }

    /// Enumerate every service, then every characteristic per service.
    ///
    /// Stops at the first enumeration error, keeping what was found so far.
    pub async fn discover_all(&mut self) -> Result<()> {
        let transport = self.transport.clone().ok_or(Error::NotConnected)?;
        self.characteristics.clear();

        let services = transport.services().await?;
        debug!("Found {} services", services.len());
        for service in services {
            let found = transport.characteristics(service).await?;
            for characteristic in &found {
                debug!(
                    service = %service,
                    uuid = %characteristic.uuid,
                    properties = ?characteristic.properties,
                    "Characteristic"
                );
            }
            self.characteristics.extend(found);
        }
        info!("Discovered {} characteristics", self.characteristics.len());
        Ok(())
    }

    fn lookup(&self, uuid: Uuid) -> Option<&CharacteristicInfo> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }

    /// Shared precondition checks: bound, link up, characteristic known.
    async fn check(&self, uuid: Uuid) -> Result<(Arc<dyn GattTransport>, CharacteristicInfo)> {
        let transport = self.transport.clone().ok_or(Error::NotConnected)?;
        if !transport.is_connected().await {
            return Err(Error::NotConnected);
        }
        let characteristic = *self
            .lookup(uuid)
            .ok_or_else(|| Error::invalid_characteristic(uuid))?;
        Ok((transport, characteristic))
    }

    async fn ensure_dispatcher(&self, transport: &Arc<dyn GattTransport>) -> Result<()> {
        let mut slot = self.dispatcher.lock().await;
        if slot.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            return Ok(());
        }

        let mut stream = transport.notifications().await?;
        let registry = Arc::clone(&self.registry);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("Dispatcher cancelled");
                        break;
                    }
                    next = stream.next() => match next {
                        Some((uuid, value)) => {
                            let registry = registry.read().await;
                            if let Some(listeners) = registry.get(&uuid) {
                                for listener in listeners {
                                    let _ = listener.tx.send(Frame {
                                        characteristic: uuid,
                                        value: value.clone(),
                                    });
                                }
                            }
                        }
                        None => {
                            debug!("Notification stream ended, dropping registrations");
                            registry.write().await.clear();
                            break;
                        }
                    },
                }
            }
        });

        *slot = Some(Dispatcher { cancel, handle });
        Ok(())
    }

    /// Enable value-change events for `uuid` and deliver them to `listener`.
    ///
    /// Selects indicate when available, otherwise notify. Subscribing the
    /// same listener twice to one characteristic is idempotent.
    #[tracing::instrument(level = "debug", skip(self, listener), fields(listener = listener.id))]
    pub async fn subscribe(&self, uuid: Uuid, listener: &Listener) -> Result<()> {
        let (transport, characteristic) = self.check(uuid).await?;
        if !characteristic.properties.can_subscribe() {
            return Err(Error::SubscribeNotSupported { uuid });
        }

        {
            let registry = self.registry.read().await;
            if registry
                .get(&uuid)
                .is_some_and(|ls| ls.iter().any(|l| l.id == listener.id))
            {
                debug!("Listener already registered");
                return Ok(());
            }
        }

        self.ensure_dispatcher(&transport).await?;
        // register before enabling so the first pushed value is not missed
        self.registry
            .write()
            .await
            .entry(uuid)
            .or_default()
            .push(listener.clone());

        let kind = if characteristic.properties.contains(CharProperties::INDICATE) {
            SubscriptionKind::Indicate
        } else {
            SubscriptionKind::Notify
        };
        if let Err(e) = transport.subscribe(&characteristic, kind).await {
            self.deregister(uuid, listener.id).await;
            return Err(e);
        }
        debug!(?kind, "Subscribed");
        Ok(())
    }

    /// Remove `listener`'s registration for `uuid`.
    ///
    /// When no listener remains the descriptor is disabled best-effort.
    pub async fn unsubscribe(&self, uuid: Uuid, listener: &Listener) -> Result<()> {
        self.unsubscribe_id(uuid, listener.id).await
    }

    /// [`unsubscribe`](Self::unsubscribe) by listener id.
    ///
    /// Lets a caller drop its [`Listener`] after subscribing, so the
    /// receiver closes as soon as the session drops the registrations.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn unsubscribe_id(&self, uuid: Uuid, listener: u64) -> Result<()> {
        let (transport, characteristic) = self.check(uuid).await?;
        if !characteristic.properties.can_subscribe() {
            return Err(Error::SubscribeNotSupported { uuid });
        }

        if self.deregister(uuid, listener).await
            && let Err(e) = transport.unsubscribe(&characteristic).await
        {
            debug!("Descriptor not disabled: {}", e);
        }
        Ok(())
    }

    /// Returns true when the characteristic has no listeners left.
    async fn deregister(&self, uuid: Uuid, id: u64) -> bool {
        let mut registry = self.registry.write().await;
        let Some(listeners) = registry.get_mut(&uuid) else {
            return true;
        };
        listeners.retain(|l| l.id != id);
        if listeners.is_empty() {
            registry.remove(&uuid);
            true
        } else {
            false
        }
    }

    /// Write `data` with response.
    #[tracing::instrument(level = "debug", skip(self, data), fields(len = data.len()))]
    pub async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        let (transport, characteristic) = self.check(uuid).await?;
        if !characteristic.properties.contains(CharProperties::WRITE) {
            return Err(Error::WriteNotSupported { uuid });
        }
        transport.write(&characteristic, data).await?;
        debug!("Write acknowledged");
        Ok(())
    }

    /// Read the current value.
    pub async fn read(&self, uuid: Uuid) -> Result<Vec<u8>> {
        let (transport, characteristic) = self.check(uuid).await?;
        if !characteristic.properties.contains(CharProperties::READ) {
            return Err(Error::ReadNotSupported { uuid });
        }
        transport.read(&characteristic).await
    }
}
