use thiserror::Error;
use uuid::Uuid;

/// Errors raised while discovering, connecting or negotiating with a die
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BleError {
    /// The platform has no Bluetooth LE support
    #[error("Bluetooth LE is not available on this system")]
    Unavailable,

    /// BLE support exists but no adapter is present
    #[error("No Bluetooth adapter found")]
    NoAdapter,

    /// Discovery was cancelled or found no matching die
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    /// Neither the modern nor the legacy service could be resolved
    #[error("{0} is not a supported Pixels die")]
    UnsupportedDevice(String),

    /// The GATT link dropped right after connecting
    #[error("Connection dropped immediately")]
    ConnectionDropped,

    #[error("Bluetooth error: {0}")]
    Platform(String),
}

impl BleError {
    /// True for lookup failures that should trigger the legacy fallback
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ServiceNotFound(_) | Self::CharacteristicNotFound(_)
        )
    }
}
