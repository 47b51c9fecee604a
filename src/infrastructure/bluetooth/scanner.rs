//! BLE Scanner Module
//!
//! Discovers Pixels dice with `btleplug`.

use crate::infrastructure::bluetooth::backend::{BleBackend, BleDevice};
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::peripheral::BtleplugDevice;
use crate::infrastructure::bluetooth::protocol::{self, DiscoveryFilter};
use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

impl From<btleplug::Error> for BleError {
    fn from(e: btleplug::Error) -> Self {
        match e {
            btleplug::Error::DeviceNotFound => BleError::DiscoveryFailed(e.to_string()),
            other => BleError::Platform(other.to_string()),
        }
    }
}

/// `btleplug` central
pub struct BtleplugBackend {
    manager: Manager,
    scan_timeout: Duration,
}

impl BtleplugBackend {
    pub async fn new(scan_timeout: Duration) -> Result<Self, BleError> {
        let manager = Manager::new().await.map_err(|e| {
            warn!("Bluetooth manager unavailable: {}", e);
            BleError::Unavailable
        })?;
        Ok(Self {
            manager,
            scan_timeout,
        })
    }

    async fn adapter(&self) -> Result<Adapter, BleError> {
        self.manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(BleError::NoAdapter)
    }

    /// Matching peripherals seen so far, idle ones first
    async fn matching_peripherals(
        adapter: &Adapter,
        filters: &[DiscoveryFilter],
    ) -> Result<Vec<(Peripheral, String, bool)>, BleError> {
        let mut found = Vec::new();
        for peripheral in adapter.peripherals().await? {
            let Ok(Some(properties)) = peripheral.properties().await else {
                continue;
            };
            if !protocol::matches_any(filters, properties.local_name.as_deref(), &properties.services) {
                continue;
            }

            let name = properties
                .local_name
                .unwrap_or_else(|| format!("{:?}", peripheral.id()));
            let connected = peripheral.is_connected().await.unwrap_or(false);
            found.push((peripheral, name, connected));
        }
        found.sort_by_key(|(_, _, connected)| *connected);
        Ok(found)
    }
}

#[async_trait]
impl BleBackend for BtleplugBackend {
    async fn is_available(&self) -> bool {
        matches!(self.manager.adapters().await, Ok(adapters) if !adapters.is_empty())
    }

    async fn request_device(
        &self,
        filters: &[DiscoveryFilter],
    ) -> Result<Arc<dyn BleDevice>, BleError> {
        let adapter = self.adapter().await?;
        info!("Scanning for Pixels dice (timeout: {:?})", self.scan_timeout);
        adapter.start_scan(ScanFilter::default()).await?;

        let deadline = Instant::now() + self.scan_timeout;
        let result = loop {
            match Self::matching_peripherals(&adapter, filters).await {
                Ok(found) => {
                    if let Some((peripheral, name, _)) = found.into_iter().next() {
                        info!(device = %name, "Found die");
                        break Ok((peripheral, name));
                    }
                }
                Err(e) => break Err(e),
            }
            if Instant::now() >= deadline {
                break Err(BleError::DiscoveryFailed("no Pixels die found".to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };

        if let Err(e) = adapter.stop_scan().await {
            debug!("Failed to stop scan cleanly: {}", e);
        }

        let (peripheral, name) = result?;
        Ok(Arc::new(BtleplugDevice::new(peripheral, adapter, name)))
    }
}
