//! btleplug-backed attribute transport.
//!
//! [`BlePeripheral`] wraps a connected `btleplug` peripheral and implements
//! [`GattTransport`]. Every stack call is bounded by a timeout from
//! [`ConnectionConfig`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{BDAddr, CharPropFlags, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use medlink_types::PeripheralAddress;

use crate::error::{Error, Result};
use crate::traits::{
    CharProperties, CharacteristicInfo, GattTransport, NotificationStream, SubscriptionKind,
};

/// Default timeout for BLE characteristic read operations.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE characteristic write operations.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE connection operations.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for BLE connection timeouts.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use medlink_core::device::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connection_timeout(Duration::from_secs(20))
///     .write_timeout(Duration::from_secs(5));
/// assert_eq!(config.connection_timeout, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for BLE read operations.
    pub read_timeout: Duration,
    /// Timeout for BLE write and descriptor operations.
    pub write_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }
}

/// Convert a btleplug address to ours.
pub(crate) fn to_peripheral_address(addr: BDAddr) -> PeripheralAddress {
    PeripheralAddress::new(addr.into_inner())
}

/// Map btleplug capability flags onto [`CharProperties`].
pub(crate) fn map_properties(flags: CharPropFlags) -> CharProperties {
    let mut props = CharProperties::NONE;
    if flags.contains(CharPropFlags::READ) {
        props = props | CharProperties::READ;
    }
    // Writes always request a response, so write-without-response alone does not count
    if flags.contains(CharPropFlags::WRITE) {
        props = props | CharProperties::WRITE;
    }
    if flags.contains(CharPropFlags::NOTIFY) {
        props = props | CharProperties::NOTIFY;
    }
    if flags.contains(CharPropFlags::INDICATE) {
        props = props | CharProperties::INDICATE;
    }
    props
}

/// Classify stack errors that have a protocol-level meaning.
fn map_ble_error(err: btleplug::Error) -> Error {
    match err {
        btleplug::Error::PermissionDenied => Error::PairingRequired,
        btleplug::Error::NotConnected => Error::NotConnected,
        other => Error::Bluetooth(other),
    }
}

/// A connected peripheral.
///
/// Call [`GattTransport::disconnect`] when done; dropping the value does not
/// close the link.
pub struct BlePeripheral {
    peripheral: Peripheral,
    address: PeripheralAddress,
    characteristics: HashMap<Uuid, Characteristic>,
    config: ConnectionConfig,
}

impl std::fmt::Debug for BlePeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlePeripheral")
            .field("address", &self.address)
            .field("characteristics", &self.characteristics.len())
            .finish_non_exhaustive()
    }
}

impl BlePeripheral {
    /// Connect to a discovered peripheral and resolve its attribute table.
    #[tracing::instrument(level = "info", skip_all, fields(connect_timeout = ?config.connection_timeout))]
    pub async fn connect(peripheral: Peripheral, config: ConnectionConfig) -> Result<Self> {
        info!("Connecting to device...");
        timeout(config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", config.connection_timeout))?
            .map_err(map_ble_error)?;
        info!("Connected!");

        timeout(config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", config.discovery_timeout))?
            .map_err(map_ble_error)?;

        let mut characteristics = HashMap::new();
        for service in peripheral.services() {
            for characteristic in service.characteristics {
                characteristics.insert(characteristic.uuid, characteristic);
            }
        }
        debug!("Resolved {} characteristics", characteristics.len());

        Ok(Self {
            address: to_peripheral_address(peripheral.address()),
            peripheral,
            characteristics,
            config,
        })
    }

    fn resolve(&self, info: &CharacteristicInfo) -> Result<&Characteristic> {
        self.characteristics
            .get(&info.uuid)
            .ok_or_else(|| Error::invalid_characteristic(info.uuid))
    }
}

#[async_trait]
impl GattTransport for BlePeripheral {
    fn address(&self) -> PeripheralAddress {
        self.address
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn services(&self) -> Result<Vec<Uuid>> {
        Ok(self.peripheral.services().iter().map(|s| s.uuid).collect())
    }

    async fn characteristics(&self, service: Uuid) -> Result<Vec<CharacteristicInfo>> {
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| s.uuid == service)
            .flat_map(|s| s.characteristics)
            .map(|c| CharacteristicInfo {
                service: c.service_uuid,
                uuid: c.uuid,
                properties: map_properties(c.properties),
            })
            .collect())
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicInfo,
        kind: SubscriptionKind,
    ) -> Result<()> {
        let target = self.resolve(characteristic)?;
        // the stack picks notify or indicate from the advertised properties
        debug!(uuid = %characteristic.uuid, ?kind, "Writing configuration descriptor");
        timeout(self.config.write_timeout, self.peripheral.subscribe(target))
            .await
            .map_err(|_| {
                Error::timeout(
                    format!("subscribe {}", characteristic.uuid),
                    self.config.write_timeout,
                )
            })?
            .map_err(map_ble_error)
    }

    async fn unsubscribe(&self, characteristic: &CharacteristicInfo) -> Result<()> {
        let target = self.resolve(characteristic)?;
        timeout(self.config.write_timeout, self.peripheral.unsubscribe(target))
            .await
            .map_err(|_| {
                Error::timeout(
                    format!("unsubscribe {}", characteristic.uuid),
                    self.config.write_timeout,
                )
            })?
            .map_err(map_ble_error)
    }

    async fn write(&self, characteristic: &CharacteristicInfo, data: &[u8]) -> Result<()> {
        let target = self.resolve(characteristic)?;
        timeout(
            self.config.write_timeout,
            self.peripheral.write(target, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| {
            Error::timeout(
                format!("write characteristic {}", characteristic.uuid),
                self.config.write_timeout,
            )
        })?
        .map_err(|e| match map_ble_error(e) {
            Error::Bluetooth(inner) => Error::WriteFailed {
                uuid: characteristic.uuid,
                reason: inner.to_string(),
            },
            other => other,
        })
    }

    async fn read(&self, characteristic: &CharacteristicInfo) -> Result<Vec<u8>> {
        let target = self.resolve(characteristic)?;
        timeout(self.config.read_timeout, self.peripheral.read(target))
            .await
            .map_err(|_| {
                Error::timeout(
                    format!("read characteristic {}", characteristic.uuid),
                    self.config.read_timeout,
                )
            })?
            .map_err(map_ble_error)
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        let stream = self
            .peripheral
            .notifications()
            .await
            .map_err(map_ble_error)?;
        Ok(Box::pin(stream.map(|n| (n.uuid, n.value))))
    }

    #[tracing::instrument(level = "info", skip(self), fields(address = %self.address))]
    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from device...");
        self.peripheral.disconnect().await.map_err(map_ble_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_builder() {
        let config = ConnectionConfig::default()
            .read_timeout(Duration::from_secs(3))
            .discovery_timeout(Duration::from_secs(4));
        assert_eq!(config.read_timeout, Duration::from_secs(3));
        assert_eq!(config.discovery_timeout, Duration::from_secs(4));
        assert_eq!(config.write_timeout, DEFAULT_WRITE_TIMEOUT);
        assert_eq!(config.connection_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_map_properties() {
        let props = map_properties(CharPropFlags::READ | CharPropFlags::INDICATE);
        assert!(props.contains(CharProperties::READ));
        assert!(props.contains(CharProperties::INDICATE));
        assert!(!props.contains(CharProperties::NOTIFY));
        assert!(!props.contains(CharProperties::WRITE));

        let props = map_properties(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE);
        assert!(props.contains(CharProperties::WRITE));
    }

    #[test]
    fn test_write_without_response_is_not_writable() {
        let props = map_properties(CharPropFlags::WRITE_WITHOUT_RESPONSE | CharPropFlags::NOTIFY);
        assert!(!props.contains(CharProperties::WRITE));
        assert!(props.contains(CharProperties::NOTIFY));
    }

    #[test]
    fn test_address_conversion() {
        let addr = BDAddr::from([0xF7, 0x4C, 0x87, 0x32, 0x62, 0xFF]);
        assert_eq!(to_peripheral_address(addr).to_string(), "F7:4C:87:32:62:FF");
    }

    #[test]
    fn test_permission_denied_means_pairing() {
        assert!(matches!(
            map_ble_error(btleplug::Error::PermissionDenied),
            Error::PairingRequired
        ));
        assert!(matches!(
            map_ble_error(btleplug::Error::NotConnected),
            Error::NotConnected
        ));
    }
}
