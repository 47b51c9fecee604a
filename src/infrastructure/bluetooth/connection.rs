//! BLE Connection Module
//!
//! GATT protocol negotiation shared by first connections and reconnections.

use crate::infrastructure::bluetooth::backend::{BleDevice, NotificationStream};
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::protocol::{NotifyCharacteristic, ProtocolGeneration};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a successful negotiation
pub struct NegotiatedLink {
    pub generation: ProtocolGeneration,
    pub characteristic: NotifyCharacteristic,
    pub notifications: NotificationStream,
}

/// Resolve the notify characteristic (modern first, then legacy) and start
/// notifications on it. The device must already be GATT-connected.
pub async fn negotiate(device: &dyn BleDevice) -> Result<NegotiatedLink, BleError> {
    let name = device.name();
    let (generation, characteristic) = resolve_characteristic(device, &name).await?;

    info!(device = %name, protocol = %generation, "Starting notifications");
    let notifications = device.start_notifications(&characteristic).await?;

    Ok(NegotiatedLink {
        generation,
        characteristic,
        notifications,
    })
}

async fn resolve_characteristic(
    device: &dyn BleDevice,
    name: &str,
) -> Result<(ProtocolGeneration, NotifyCharacteristic), BleError> {
    let mut all_not_found = true;
    let mut last_error = None;

    for generation in ProtocolGeneration::NEGOTIATION_ORDER {
        match device
            .resolve_characteristic(generation.service_uuid(), generation.notify_char_uuid())
            .await
        {
            Ok(characteristic) => {
                info!(device = %name, protocol = %generation, "Found notify characteristic");
                return Ok((generation, characteristic));
            }
            Err(e) => {
                debug!(device = %name, protocol = %generation, "Negotiation failed: {}", e);
                all_not_found &= e.is_not_found();
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !all_not_found => Err(e),
        _ => Err(BleError::UnsupportedDevice(name.to_string())),
    }
}

/// Bring a dropped device back: disconnect leftovers, connect, verify the link
/// held, then negotiate again.
pub async fn reestablish(
    device: &dyn BleDevice,
    settle: Duration,
) -> Result<NegotiatedLink, BleError> {
    if device.is_connected().await {
        if let Err(e) = device.disconnect().await {
            warn!(device = %device.name(), "Could not drop stale connection: {}", e);
        }
    }
    tokio::time::sleep(settle).await;

    device.connect_gatt().await?;
    tokio::time::sleep(settle).await;

    if !device.is_connected().await {
        return Err(BleError::ConnectionDropped);
    }

    negotiate(device).await
}
