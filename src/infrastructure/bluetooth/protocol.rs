//! Pixels BLE Protocol
//!
//! Service and characteristic identifiers of the two Pixels firmware
//! generations, and the discovery filters derived from them.

use std::fmt;
use uuid::Uuid;

/// Modern firmware service
pub const MODERN_SERVICE_UUID: Uuid = Uuid::from_u128(0xa6b90001_7a5a_43f2_a962_350c8edc9b5b);

/// Modern firmware notify characteristic - roll state messages arrive here
pub const MODERN_NOTIFY_CHAR_UUID: Uuid = Uuid::from_u128(0xa6b90002_7a5a_43f2_a962_350c8edc9b5b);

/// Legacy firmware service (Nordic UART layout)
pub const LEGACY_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// Legacy firmware notify characteristic.
/// The firmware exposes it under the service UUID itself.
pub const LEGACY_NOTIFY_CHAR_UUID: Uuid = LEGACY_SERVICE_UUID;

/// Advertised name prefix of every Pixels die
pub const NAME_PREFIX: &str = "Pixel";

/// Firmware generation a die was negotiated with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolGeneration {
    Modern,
    Legacy,
}

impl ProtocolGeneration {
    /// Generations in negotiation order
    pub const NEGOTIATION_ORDER: [ProtocolGeneration; 2] = [Self::Modern, Self::Legacy];

    pub fn service_uuid(&self) -> Uuid {
        match self {
            Self::Modern => MODERN_SERVICE_UUID,
            Self::Legacy => LEGACY_SERVICE_UUID,
        }
    }

    pub fn notify_char_uuid(&self) -> Uuid {
        match self {
            Self::Modern => MODERN_NOTIFY_CHAR_UUID,
            Self::Legacy => LEGACY_NOTIFY_CHAR_UUID,
        }
    }
}

impl fmt::Display for ProtocolGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modern => write!(f, "modern"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

/// A resolved notify characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyCharacteristic {
    pub service: Uuid,
    pub uuid: Uuid,
}

/// One discovery filter. A device matches the request if it matches any filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryFilter {
    Service(Uuid),
    NamePrefix(String),
}

impl DiscoveryFilter {
    pub fn matches(&self, name: Option<&str>, services: &[Uuid]) -> bool {
        match self {
            Self::Service(uuid) => services.contains(uuid),
            Self::NamePrefix(prefix) => name.is_some_and(|n| n.starts_with(prefix.as_str())),
        }
    }
}

/// Filters used when looking for a new die
pub fn discovery_filters(name_prefix: &str) -> Vec<DiscoveryFilter> {
    vec![
        DiscoveryFilter::Service(MODERN_SERVICE_UUID),
        DiscoveryFilter::Service(LEGACY_SERVICE_UUID),
        DiscoveryFilter::NamePrefix(name_prefix.to_string()),
    ]
}

/// True if a device matches any of `filters`
pub fn matches_any(filters: &[DiscoveryFilter], name: Option<&str>, services: &[Uuid]) -> bool {
    filters.iter().any(|f| f.matches(name, services))
}
