//! Trait abstractions over the Bluetooth stack.
//!
//! [`Scanner`] and [`GattTransport`] are the only seams between the protocol
//! engine and the radio. The btleplug implementations live in
//! [`crate::scan`] and [`crate::device`]; [`crate::mock`] provides in-process
//! versions for tests.

use std::fmt;
use std::ops::BitOr;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use medlink_types::PeripheralAddress;

use crate::error::Result;

/// Capability set of a characteristic.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CharProperties(u8);

impl CharProperties {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(1 << 0);
    pub const WRITE: Self = Self(1 << 1);
    pub const NOTIFY: Self = Self(1 << 2);
    pub const INDICATE: Self = Self(1 << 3);

    /// Whether every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the characteristic can push values (notify or indicate).
    pub const fn can_subscribe(self) -> bool {
        self.0 & (Self::NOTIFY.0 | Self::INDICATE.0) != 0
    }
}

impl BitOr for CharProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for CharProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::READ, "Read"),
            (Self::WRITE, "Write"),
            (Self::NOTIFY, "Notify"),
            (Self::INDICATE, "Indicate"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{{{}}}", set.join(", "))
    }
}

/// One discovered `{service, characteristic, properties}` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub service: Uuid,
    pub uuid: Uuid,
    pub properties: CharProperties,
}

/// Value written to the client characteristic configuration descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Notify,
    Indicate,
}

/// Stream of `(characteristic, value)` pairs pushed by the peripheral.
pub type NotificationStream = Pin<Box<dyn Stream<Item = (Uuid, Vec<u8>)> + Send>>;

/// A connected peripheral's attribute interface.
#[async_trait]
pub trait GattTransport: Send + Sync {
    /// Hardware address of the peripheral.
    fn address(&self) -> PeripheralAddress;

    /// Whether the link is currently up.
    async fn is_connected(&self) -> bool;

    /// Enumerate primary services.
    async fn services(&self) -> Result<Vec<Uuid>>;

    /// Enumerate the characteristics of one service.
    async fn characteristics(&self, service: Uuid) -> Result<Vec<CharacteristicInfo>>;

    /// Write the configuration descriptor to enable pushes.
    async fn subscribe(&self, characteristic: &CharacteristicInfo, kind: SubscriptionKind)
    -> Result<()>;

    /// Disable pushes for a characteristic.
    async fn unsubscribe(&self, characteristic: &CharacteristicInfo) -> Result<()>;

    /// Write with response; returns once the peripheral acknowledged.
    async fn write(&self, characteristic: &CharacteristicInfo, data: &[u8]) -> Result<()>;

    /// Read the current value.
    async fn read(&self, characteristic: &CharacteristicInfo) -> Result<Vec<u8>>;

    /// Stream of every value pushed by the peripheral, in arrival order.
    async fn notifications(&self) -> Result<NotificationStream>;

    /// Drop the link.
    async fn disconnect(&self) -> Result<()>;
}

/// One observation from the advertisement watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// An advertisement was received from this address.
    Seen(PeripheralAddress),
    /// The watcher stopped with an error.
    WatcherError(String),
}

/// Stream of advertisement watcher events.
pub type ScanEventStream = Pin<Box<dyn Stream<Item = ScanEvent> + Send>>;

/// The process-wide advertisement watcher.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Start observing advertisements.
    async fn start_watch(&self) -> Result<ScanEventStream>;

    /// Stop observing advertisements.
    async fn stop_watch(&self) -> Result<()>;

    /// Connect to a peripheral that was seen advertising.
    ///
    /// Returns `None` when the stack no longer knows the address.
    async fn open(&self, address: PeripheralAddress) -> Result<Option<Arc<dyn GattTransport>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_contains() {
        let props = CharProperties::READ | CharProperties::NOTIFY;
        assert!(props.contains(CharProperties::READ));
        assert!(props.contains(CharProperties::NOTIFY));
        assert!(!props.contains(CharProperties::WRITE));
        assert!(!props.contains(CharProperties::READ | CharProperties::WRITE));
        assert!(props.contains(CharProperties::NONE));
    }

    #[test]
    fn test_can_subscribe() {
        assert!(CharProperties::NOTIFY.can_subscribe());
        assert!(CharProperties::INDICATE.can_subscribe());
        assert!(!(CharProperties::READ | CharProperties::WRITE).can_subscribe());
        assert!(!CharProperties::NONE.can_subscribe());
    }

    #[test]
    fn test_properties_debug() {
        let props = CharProperties::WRITE | CharProperties::INDICATE;
        assert_eq!(format!("{:?}", props), "{Write, Indicate}");
        assert_eq!(format!("{:?}", CharProperties::NONE), "{}");
    }
}
