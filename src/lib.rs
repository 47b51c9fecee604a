//! Bridge between Bluetooth Pixels dice and the Roll20 chat.
//!
//! The library tracks dice over BLE, turns settled faces into chat messages
//! and talks to the browser extension through [`presentation::bridge`].

pub mod domain;
pub mod infrastructure;
pub mod presentation;
