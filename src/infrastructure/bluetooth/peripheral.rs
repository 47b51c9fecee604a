//! `btleplug` peripheral behind the [`BleDevice`] trait.

use crate::infrastructure::bluetooth::backend::{BleDevice, DisconnectStream, NotificationStream};
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::protocol::NotifyCharacteristic;
use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use futures::{future, StreamExt};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// BlueZ can block forever on connect when the die is out of range
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(15);

pub struct BtleplugDevice {
    peripheral: Peripheral,
    adapter: Adapter,
    name: String,
}

impl BtleplugDevice {
    pub fn new(peripheral: Peripheral, adapter: Adapter, name: String) -> Self {
        Self {
            peripheral,
            adapter,
            name,
        }
    }

    fn find_characteristic(&self, service: Uuid, uuid: Uuid) -> Result<Characteristic, BleError> {
        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == service)
            .ok_or(BleError::ServiceNotFound(service))?;

        service
            .characteristics
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(BleError::CharacteristicNotFound(uuid))
    }
}

#[async_trait]
impl BleDevice for BtleplugDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn connect_gatt(&self) -> Result<(), BleError> {
        info!(device = %self.name, "Connecting GATT");
        tokio::time::timeout(CONNECT_TIMEOUT, self.peripheral.connect())
            .await
            .map_err(|_| BleError::Platform(format!("connect timed out after {:?}", CONNECT_TIMEOUT)))??;

        tokio::time::timeout(DISCOVERY_TIMEOUT, self.peripheral.discover_services())
            .await
            .map_err(|_| {
                BleError::Platform(format!(
                    "service discovery timed out after {:?}",
                    DISCOVERY_TIMEOUT
                ))
            })??;
        debug!(device = %self.name, services = self.peripheral.services().len(), "Services discovered");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn resolve_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotifyCharacteristic, BleError> {
        let found = self.find_characteristic(service, characteristic)?;
        Ok(NotifyCharacteristic {
            service: found.service_uuid,
            uuid: found.uuid,
        })
    }

    async fn start_notifications(
        &self,
        characteristic: &NotifyCharacteristic,
    ) -> Result<NotificationStream, BleError> {
        let found = self.find_characteristic(characteristic.service, characteristic.uuid)?;
        self.peripheral.subscribe(&found).await?;

        let uuid = characteristic.uuid;
        let stream = self
            .peripheral
            .notifications()
            .await?
            .filter_map(move |notification| {
                future::ready((notification.uuid == uuid).then_some(notification.value))
            });
        Ok(stream.boxed())
    }

    async fn disconnect_events(&self) -> Result<DisconnectStream, BleError> {
        let id = self.peripheral.id();
        let stream = self.adapter.events().await?.filter_map(move |event| {
            future::ready(match event {
                CentralEvent::DeviceDisconnected(disconnected) if disconnected == id => Some(()),
                _ => None,
            })
        });
        Ok(stream.boxed())
    }
}
