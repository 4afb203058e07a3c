//! Executes one command: scan, bind, run the protocol, tear down.

use std::sync::Arc;

use tracing::{info, warn};

use medlink_types::Measurement;

use crate::audio::{Passthrough, SignalEnhancer};
use crate::command::Command;
use crate::discovery::DiscoveryManager;
use crate::error::{Error, Result};
use crate::protocol::{WeightUpdateCallback, protocol_for};
use crate::session::AttributeSession;
use crate::settings::Settings;
use crate::traits::Scanner;

/// Owns the discovery manager and the attribute session for the lifetime
/// of the command loop. Commands run one at a time (`&mut self`).
pub struct Runner {
    discovery: DiscoveryManager,
    session: AttributeSession,
    settings: Settings,
    enhancer: Arc<dyn SignalEnhancer>,
    weight_updates: Option<WeightUpdateCallback>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("session", &self.session)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Runner {
    pub fn new(scanner: Arc<dyn Scanner>, settings: Settings) -> Self {
        Self {
            discovery: DiscoveryManager::new(scanner),
            session: AttributeSession::new(),
            settings,
            enhancer: Arc::new(Passthrough),
            weight_updates: None,
        }
    }

    /// Use `enhancer` for stethoscope recordings instead of passthrough.
    #[must_use]
    pub fn with_enhancer(mut self, enhancer: Arc<dyn SignalEnhancer>) -> Self {
        self.enhancer = enhancer;
        self
    }

    /// Receive intermediate weight readings when
    /// [`Settings::update_weight`] is enabled.
    #[must_use]
    pub fn on_weight_update(mut self, callback: WeightUpdateCallback) -> Self {
        self.weight_updates = Some(callback);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run `command` end to end.
    ///
    /// The peripheral is disconnected afterwards whether or not the
    /// protocol succeeded, so the next command starts from a fresh scan.
    #[tracing::instrument(level = "info", skip(self), fields(device = %command.device, address = %command.address))]
    pub async fn run(&mut self, command: &Command) -> Result<Option<Measurement>> {
        let handle = self
            .discovery
            .scan(command.address, self.settings.scan_timeout)
            .await?
            .ok_or_else(|| Error::device_not_found(command.address))?;

        self.session.bind(Some(handle)).await;
        if !self.session.is_bound() {
            return Err(Error::NotConnected);
        }
        info!(
            characteristics = self.session.characteristics().len(),
            "Connected"
        );

        let protocol = protocol_for(
            command.device,
            &self.settings,
            Arc::clone(&self.enhancer),
            self.weight_updates.clone(),
        );
        let result = protocol.run(&self.session).await;
        if let Err(e) = &result {
            warn!("{} protocol failed: {}", command.device, e);
        }

        self.session.unbind().await;
        result
    }
}
