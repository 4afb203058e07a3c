//! btleplug-backed advertisement watcher.
//!
//! [`BleScanner`] owns one adapter for the life of the process and turns its
//! central event stream into [`ScanEvent`]s.

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tracing::{debug, info};

use medlink_types::PeripheralAddress;

use crate::device::{BlePeripheral, ConnectionConfig, to_peripheral_address};
use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::traits::{GattTransport, ScanEvent, ScanEventStream, Scanner};

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Any failure to start watching aborts discovery the same way.
fn scan_failure(err: btleplug::Error) -> Error {
    Error::ScanFailure(err.to_string())
}

/// Advertisement watcher over the first system adapter.
#[derive(Debug, Clone)]
pub struct BleScanner {
    adapter: Adapter,
    config: ConnectionConfig,
}

impl BleScanner {
    /// Open the first adapter with default connection timeouts.
    pub async fn new() -> Result<Self> {
        Self::with_config(ConnectionConfig::default()).await
    }

    /// Open the first adapter with custom connection timeouts.
    pub async fn with_config(config: ConnectionConfig) -> Result<Self> {
        Ok(Self {
            adapter: get_adapter().await?,
            config,
        })
    }

    async fn address_of(adapter: &Adapter, id: &PeripheralId) -> Option<PeripheralAddress> {
        let peripheral = adapter.peripheral(id).await.ok()?;
        Some(to_peripheral_address(peripheral.address()))
    }

    async fn find(&self, address: PeripheralAddress) -> Result<Option<Peripheral>> {
        let peripherals = self.adapter.peripherals().await?;
        Ok(peripherals
            .into_iter()
            .find(|p| to_peripheral_address(p.address()) == address))
    }
}

#[async_trait]
impl Scanner for BleScanner {
    async fn start_watch(&self) -> Result<ScanEventStream> {
        let events = self.adapter.events().await.map_err(scan_failure)?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(scan_failure)?;
        debug!("Advertisement watcher started");

        let adapter = self.adapter.clone();
        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        Self::address_of(&adapter, &id).await.map(ScanEvent::Seen)
                    }
                    CentralEvent::StateUpdate(state) => {
                        debug!(?state, "Adapter state changed");
                        None
                    }
                    _ => None,
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn stop_watch(&self) -> Result<()> {
        self.adapter.stop_scan().await?;
        debug!("Advertisement watcher stopped");
        Ok(())
    }

    #[tracing::instrument(level = "info", skip(self), fields(address = %address))]
    async fn open(&self, address: PeripheralAddress) -> Result<Option<Arc<dyn GattTransport>>> {
        let Some(peripheral) = self.find(address).await? else {
            info!("Peripheral no longer known to the adapter");
            return Ok(None);
        };
        let device = BlePeripheral::connect(peripheral, self.config.clone()).await?;
        Ok(Some(Arc::new(device)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_errors_are_scan_failures() {
        let err = scan_failure(btleplug::Error::NotSupported("event stream".into()));
        assert!(matches!(&err, Error::ScanFailure(msg) if msg.contains("event stream")));
        assert!(!err.is_input_error());
    }
}
