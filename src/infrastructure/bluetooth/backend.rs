//! Platform seam
//!
//! The connection manager only talks to Bluetooth through these traits, so the
//! real `btleplug` backend can be swapped for an in-memory one in tests.

use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::protocol::{DiscoveryFilter, NotifyCharacteristic};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use uuid::Uuid;

/// Raw characteristic values as they arrive
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

/// One item per platform-reported disconnect of a device
pub type DisconnectStream = BoxStream<'static, ()>;

/// Bluetooth central
#[async_trait]
pub trait BleBackend: Send + Sync {
    /// Whether the platform supports Bluetooth LE at all
    async fn is_available(&self) -> bool;

    /// Discover one device matching any of `filters`
    async fn request_device(
        &self,
        filters: &[DiscoveryFilter],
    ) -> Result<Arc<dyn BleDevice>, BleError>;
}

/// A discovered peripheral
#[async_trait]
pub trait BleDevice: Send + Sync {
    /// Advertised name, stable for the lifetime of the device
    fn name(&self) -> String;

    async fn connect_gatt(&self) -> Result<(), BleError>;

    async fn is_connected(&self) -> bool;

    async fn disconnect(&self) -> Result<(), BleError>;

    /// Look up a characteristic inside a primary service
    async fn resolve_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotifyCharacteristic, BleError>;

    /// Enable notifications and return the stream of values
    async fn start_notifications(
        &self,
        characteristic: &NotifyCharacteristic,
    ) -> Result<NotificationStream, BleError>;

    /// Stream of platform disconnect events for this device
    async fn disconnect_events(&self) -> Result<DisconnectStream, BleError>;
}

/// Stand-in when the platform has no Bluetooth stack: every discovery fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

#[async_trait]
impl BleBackend for UnavailableBackend {
    async fn is_available(&self) -> bool {
        false
    }

    async fn request_device(
        &self,
        _filters: &[DiscoveryFilter],
    ) -> Result<Arc<dyn BleDevice>, BleError> {
        Err(BleError::Unavailable)
    }
}
