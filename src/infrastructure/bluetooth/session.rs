//! Die Session
//!
//! Live connection state of one physical die. All methods are synchronous:
//! they run while the registry lock is held and never await.

use crate::domain::decoder;
use crate::domain::models::{ConnectionStatus, RollEvent};
use crate::infrastructure::bluetooth::backend::BleDevice;
use crate::infrastructure::bluetooth::protocol::{NotifyCharacteristic, ProtocolGeneration};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Handles that only exist while a die is connected.
/// Dropping the link unregisters the notification listener and stops the monitor.
pub struct SessionLink {
    pub generation: ProtocolGeneration,
    pub characteristic: NotifyCharacteristic,
    listener: Option<AbortHandle>,
    monitor: Option<AbortHandle>,
}

impl SessionLink {
    pub fn new(generation: ProtocolGeneration, characteristic: NotifyCharacteristic) -> Self {
        Self {
            generation,
            characteristic,
            listener: None,
            monitor: None,
        }
    }

    /// Attach the notification listener and the link monitor tasks
    pub fn with_tasks(mut self, listener: AbortHandle, monitor: AbortHandle) -> Self {
        self.listener = Some(listener);
        self.monitor = Some(monitor);
        self
    }
}

impl Drop for SessionLink {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

/// Where the automatic reconnection of a session stands
#[derive(Debug)]
enum ReconnectState {
    Idle,
    Pending(AbortHandle),
    Exhausted,
}

pub struct DieSession {
    name: String,
    device: Arc<dyn BleDevice>,
    link: Option<SessionLink>,
    has_moved: bool,
    last_activity: Instant,
    last_face_up: Option<u8>,
    reconnect_attempts: u32,
    reconnect: ReconnectState,
    disconnect_watch: Option<AbortHandle>,
}

impl DieSession {
    /// New, not yet connected session
    pub fn new(device: Arc<dyn BleDevice>, now: Instant) -> Self {
        Self {
            name: device.name(),
            device,
            link: None,
            has_moved: false,
            last_activity: now,
            last_face_up: None,
            reconnect_attempts: 0,
            reconnect: ReconnectState::Idle,
            disconnect_watch: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> Arc<dyn BleDevice> {
        Arc::clone(&self.device)
    }

    pub fn status(&self) -> ConnectionStatus {
        if self.link.is_some() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn has_moved(&self) -> bool {
        self.has_moved
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Last settled face, 0-indexed
    pub fn last_face_up(&self) -> Option<u8> {
        self.last_face_up
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn protocol(&self) -> Option<ProtocolGeneration> {
        self.link.as_ref().map(|link| link.generation)
    }

    pub fn characteristic(&self) -> Option<NotifyCharacteristic> {
        self.link.as_ref().map(|link| link.characteristic)
    }

    /// First connection of this session
    pub fn connect(&mut self, link: SessionLink, now: Instant) {
        info!(device = %self.name, protocol = %link.generation, "Die connected");
        self.link = Some(link);
        self.has_moved = false;
        self.last_activity = now;
    }

    /// Link restored after a drop. Keeps `has_moved` so a die in mid-session
    /// is not debounced again.
    pub fn reconnect(&mut self, link: SessionLink, now: Instant) {
        info!(device = %self.name, protocol = %link.generation, "Die reconnected");
        self.link = Some(link);
        self.reconnect_attempts = 0;
        self.reconnect = ReconnectState::Idle;
        self.last_activity = now;
    }

    /// Process one notification. Returns the 1-indexed face to roll, if any.
    pub fn handle_notification(&mut self, bytes: &[u8], now: Instant) -> Option<u16> {
        if !self.is_connected() {
            debug!(device = %self.name, "Notification after disconnect ignored");
            return None;
        }
        self.last_activity = now;

        let event = decoder::decode(bytes);
        if !self.has_moved {
            // A die resting face up at connect time reports its face without
            // having been rolled
            if !matches!(event, RollEvent::FaceUp { .. }) {
                self.has_moved = true;
            }
            return None;
        }

        match event {
            RollEvent::FaceUp { face } => {
                self.last_face_up = Some(face);
                event.display_value()
            }
            _ => None,
        }
    }

    /// Drop the link. Returns false if the session was already disconnected.
    pub fn mark_disconnected(&mut self, now: Instant) -> bool {
        match self.link.take() {
            Some(_) => {
                info!(device = %self.name, "Die disconnected");
                self.last_activity = now;
                true
            }
            None => false,
        }
    }

    /// No notification for longer than `timeout` while believed connected
    pub fn is_link_silent(&self, now: Instant, timeout: Duration) -> bool {
        self.is_connected() && now.saturating_duration_since(self.last_activity) > timeout
    }

    /// Disconnected and idle for longer than `threshold`
    pub fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        !self.is_connected() && now.saturating_duration_since(self.last_activity) > threshold
    }

    /// Whether an automatic reconnection may be started now
    pub fn can_start_reconnect(&self) -> bool {
        !self.is_connected() && matches!(self.reconnect, ReconnectState::Idle)
    }

    pub fn is_reconnect_pending(&self) -> bool {
        matches!(self.reconnect, ReconnectState::Pending(_))
    }

    pub fn is_reconnect_exhausted(&self) -> bool {
        matches!(self.reconnect, ReconnectState::Exhausted)
    }

    pub fn begin_reconnect(&mut self, task: AbortHandle) {
        self.reconnect = ReconnectState::Pending(task);
    }

    /// Count a failed attempt. Returns the number of failures so far.
    pub fn record_reconnect_failure(&mut self) -> u32 {
        self.reconnect_attempts += 1;
        self.reconnect_attempts
    }

    /// Stop retrying for good
    pub fn give_up_reconnect(&mut self) {
        warn!(device = %self.name, attempts = self.reconnect_attempts, "Giving up reconnection");
        self.reconnect = ReconnectState::Exhausted;
    }

    /// Abort a pending reconnection and allow a new one
    pub fn cancel_reconnect(&mut self) {
        if let ReconnectState::Pending(task) = &self.reconnect {
            task.abort();
        }
        self.reconnect = ReconnectState::Idle;
    }

    pub fn has_disconnect_watch(&self) -> bool {
        self.disconnect_watch.is_some()
    }

    pub fn set_disconnect_watch(&mut self, task: AbortHandle) {
        if let Some(previous) = self.disconnect_watch.replace(task) {
            previous.abort();
        }
    }

    /// Tear the session down and ask the platform to disconnect.
    /// The session must already be out of the registry.
    pub async fn disconnect(mut self) {
        self.mark_disconnected(Instant::now());
        self.cancel_reconnect();
        if let Some(watch) = self.disconnect_watch.take() {
            watch.abort();
        }

        let device = self.device();
        drop(self);
        if let Err(e) = device.disconnect().await {
            debug!(device = %device.name(), "Platform disconnect failed: {}", e);
        }
    }
}

impl Drop for DieSession {
    fn drop(&mut self) {
        if let ReconnectState::Pending(task) = &self.reconnect {
            task.abort();
        }
        if let Some(watch) = self.disconnect_watch.take() {
            watch.abort();
        }
    }
}
