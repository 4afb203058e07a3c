//! Discovery of a single peripheral by address.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{info, warn};

use medlink_types::PeripheralAddress;

use crate::error::{Error, Result};
use crate::traits::{GattTransport, ScanEvent, Scanner};

enum Outcome {
    Matched,
    TimedOut,
    Failed(String),
}

/// Runs scans against the process-wide advertisement watcher.
///
/// `scan` takes `&mut self`, so at most one scan is in flight per manager.
pub struct DiscoveryManager {
    scanner: Arc<dyn Scanner>,
}

impl DiscoveryManager {
    pub fn new(scanner: Arc<dyn Scanner>) -> Self {
        Self { scanner }
    }

    /// Watch advertisements until `target` is seen or `timeout` elapses.
    ///
    /// Every distinct address observed is logged. Returns `Ok(None)` when
    /// nothing matched in time, and [`Error::ScanFailure`] when the watcher
    /// itself failed.
    #[tracing::instrument(level = "info", skip(self), fields(target = %target, timeout = ?timeout))]
    pub async fn scan(
        &mut self,
        target: PeripheralAddress,
        timeout: Duration,
    ) -> Result<Option<Arc<dyn GattTransport>>> {
        let mut events = self.scanner.start_watch().await?;
        let mut seen = HashSet::new();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let outcome = loop {
            tokio::select! {
                _ = &mut deadline => break Outcome::TimedOut,
                event = events.next() => match event {
                    Some(ScanEvent::Seen(address)) => {
                        if seen.insert(address) {
                            info!(%address, "Advertisement received");
                        }
                        if address == target {
                            break Outcome::Matched;
                        }
                    }
                    Some(ScanEvent::WatcherError(reason)) => break Outcome::Failed(reason),
                    None => break Outcome::Failed("advertisement watcher stopped".to_string()),
                },
            }
        };

        drop(events);
        if let Err(e) = self.scanner.stop_watch().await {
            warn!("Failed to stop advertisement watcher: {}", e);
        }

        match outcome {
            Outcome::Matched => {
                info!("Device found");
                self.scanner.open(target).await
            }
            Outcome::TimedOut => {
                info!(distinct = seen.len(), "Device not found before timeout");
                Ok(None)
            }
            Outcome::Failed(reason) => Err(Error::ScanFailure(reason)),
        }
    }
}
