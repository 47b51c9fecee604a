//! Bluetooth Module
//!
//! BLE communication with Pixels dice.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   ConnectionManager                      │
//! │  (Main coordinator - public API for the application)     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┬──────────────┐
//!         │             │              │              │
//!         ▼             ▼              ▼              ▼
//! ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐
//! │  Registry  │ │ Connection │ │ Reconnect  │ │  Cleanup   │
//! │            │ │            │ │            │ │            │
//! │ - Sessions │ │ - Modern / │ │ - Backoff  │ │ - Stale    │
//! │   by name  │ │   legacy   │ │ - Attempt  │ │   eviction │
//! │            │ │   GATT     │ │   cap      │ │            │
//! └────────────┘ └────────────┘ └────────────┘ └────────────┘
//!                       │
//!                       ▼
//!            BleBackend / BleDevice (btleplug)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Service/characteristic UUIDs and discovery filters
//! - [`backend`] - Platform traits
//! - [`scanner`] / [`peripheral`] - `btleplug` implementation of the platform traits
//! - [`connection`] - Protocol negotiation and link re-establishment
//! - [`session`] - Per-die state machine
//! - [`registry`] - Sessions by device name
//! - [`reconnect`] - Backoff policy
//! - [`cleanup`] - Periodic eviction of stale dice
//! - [`service`] - Main service coordinator

pub mod backend;
pub mod cleanup;
pub mod connection;
pub mod error;
pub mod peripheral;
pub mod protocol;
pub mod reconnect;
pub mod registry;
pub mod scanner;
pub mod service;
pub mod session;

// Re-export main service for convenience
pub use cleanup::CleanupScheduler;
pub use error::BleError;
pub use service::ConnectionManager;
