//! Connection Manager
//!
//! Main service that coordinates discovery, negotiation, session reuse,
//! notification handling and automatic reconnection of the dice.

use crate::domain::formula::{self, FormulaTemplates, RollInput};
use crate::domain::models::{status_text, AppEvent, ConnectionStatus};
use crate::domain::modifier::ModifierSource;
use crate::domain::settings::{ConnectionSettings, Settings};
use crate::infrastructure::bluetooth::{
    backend::{BleBackend, BleDevice, DisconnectStream, NotificationStream},
    connection::{self, NegotiatedLink},
    error::BleError,
    protocol::{self, ProtocolGeneration},
    reconnect::{ReconnectPolicy, RetryDecision},
    registry::SessionRegistry,
    session::{DieSession, SessionLink},
};
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub name: String,
    pub status: ConnectionStatus,
    pub protocol: Option<ProtocolGeneration>,
    pub has_moved: bool,
    pub last_face_up: Option<u8>,
    pub reconnect_attempts: u32,
    pub reconnect_pending: bool,
    pub reconnect_exhausted: bool,
}

impl From<&DieSession> for SessionSnapshot {
    fn from(session: &DieSession) -> Self {
        Self {
            name: session.name().to_string(),
            status: session.status(),
            protocol: session.protocol(),
            has_moved: session.has_moved(),
            last_face_up: session.last_face_up(),
            reconnect_attempts: session.reconnect_attempts(),
            reconnect_pending: session.is_reconnect_pending(),
            reconnect_exhausted: session.is_reconnect_exhausted(),
        }
    }
}

enum Installed {
    New,
    Restored,
    AlreadyConnected,
}

/// State reachable from the background tasks of every session
struct Shared {
    registry: Mutex<SessionRegistry>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    modifier: Arc<dyn ModifierSource>,
    templates: FormulaTemplates,
    settings: ConnectionSettings,
    policy: ReconnectPolicy,
}

/// Owns the session registry and every BLE operation on the dice
#[derive(Clone)]
pub struct ConnectionManager {
    backend: Arc<dyn BleBackend>,
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        backend: Arc<dyn BleBackend>,
        modifier: Arc<dyn ModifierSource>,
        event_sender: mpsc::UnboundedSender<AppEvent>,
        settings: &Settings,
    ) -> Self {
        Self {
            backend,
            shared: Arc::new(Shared {
                registry: Mutex::new(SessionRegistry::new()),
                event_sender,
                modifier,
                templates: settings.templates.clone(),
                settings: settings.connection.clone(),
                policy: ReconnectPolicy::from_settings(&settings.connection),
            }),
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.shared.settings
    }

    /// Discover a die and connect to it, reusing its session if it is known.
    /// Returns the die name.
    pub async fn connect_to_new_pixel(&self) -> Result<String, BleError> {
        if !self.backend.is_available().await {
            return Err(BleError::Unavailable);
        }

        let filters = protocol::discovery_filters(&self.shared.settings.name_prefix);
        let device = self.backend.request_device(&filters).await?;
        let name = device.name();
        info!(device = %name, "Discovered die");

        // Best effort only: a second request for the same die may already be
        // past this point
        let already_connected = self
            .shared
            .lock()
            .get(&name)
            .is_some_and(DieSession::is_connected);
        if already_connected {
            info!(device = %name, "Die already connected");
            return Ok(name);
        }

        device.connect_gatt().await?;
        // Subscribe before the session is visible so an early drop is not missed
        let established = match connection::negotiate(device.as_ref()).await {
            Ok(negotiated) => device
                .disconnect_events()
                .await
                .map(|disconnects| (negotiated, disconnects)),
            Err(e) => Err(e),
        };
        let (negotiated, disconnects) = match established {
            Ok(established) => established,
            Err(e) => {
                if let Err(disconnect_error) = device.disconnect().await {
                    debug!(device = %name, "Disconnect after failed negotiation: {}", disconnect_error);
                }
                return Err(e);
            }
        };

        let message = match self.shared.install(&device, negotiated, disconnects) {
            Installed::New => format!("Connected to {}", name),
            Installed::Restored => format!("Reconnected to {}", name),
            Installed::AlreadyConnected => return Ok(name),
        };
        self.shared.send(AppEvent::post_chat(message));
        self.shared.send_status();
        Ok(name)
    }

    /// Disconnect every die and forget about it
    pub async fn disconnect_all(&self) {
        let sessions = self.shared.lock().drain();
        info!(count = sessions.len(), "Disconnecting all dice");
        for session in sessions {
            session.disconnect().await;
        }
        self.shared.send_status();
    }

    /// Evict dice that have been disconnected for too long. Returns how many.
    pub async fn sweep_stale(&self) -> usize {
        let stale_after = self.shared.settings.stale_after();
        let evicted = self.shared.lock().sweep_stale(Instant::now(), stale_after);
        if evicted.is_empty() {
            return 0;
        }

        let count = evicted.len();
        for session in evicted {
            info!(device = %session.name(), "Evicting stale die");
            session.disconnect().await;
        }
        self.shared.send_status();
        count
    }

    pub fn status_text(&self) -> String {
        let (connected, total) = self.shared.lock().counts();
        status_text(connected, total)
    }

    /// Push the current status line to the extension
    pub fn emit_status(&self) {
        self.shared.send_status();
    }

    /// Show a one-off message in the popup
    pub fn show_text(&self, text: impl Into<String>) {
        self.shared.send(AppEvent::show_text(text));
    }

    pub fn session(&self, name: &str) -> Option<SessionSnapshot> {
        self.shared.lock().get(name).map(SessionSnapshot::from)
    }

    pub fn session_names(&self) -> Vec<String> {
        self.shared.lock().names()
    }

    /// (connected, total)
    pub fn counts(&self) -> (usize, usize) {
        self.shared.lock().counts()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, event: AppEvent) {
        // A closed channel means the extension went away; nothing to report
        let _ = self.event_sender.send(event);
    }

    fn send_status(&self) {
        let (connected, total) = self.lock().counts();
        self.send(AppEvent::show_text(status_text(connected, total)));
    }

    /// Register a freshly negotiated link under the device name
    fn install(
        self: &Arc<Self>,
        device: &Arc<dyn BleDevice>,
        negotiated: NegotiatedLink,
        disconnects: DisconnectStream,
    ) -> Installed {
        let name = device.name();
        let link = self.build_link(&name, negotiated);
        let now = Instant::now();

        let mut registry = self.lock();
        let outcome = match registry.get_mut(&name) {
            Some(session) if session.is_connected() => {
                debug!(device = %name, "Lost connect race, keeping existing link");
                return Installed::AlreadyConnected;
            }
            Some(session) => {
                session.cancel_reconnect();
                session.reconnect(link, now);
                Installed::Restored
            }
            None => {
                let mut session = DieSession::new(Arc::clone(device), now);
                session.connect(link, now);
                // Cannot collide, the registry lock has been held since the lookup
                let _ = registry.insert(session);
                Installed::New
            }
        };

        if let Some(session) = registry.get_mut(&name) {
            if !session.has_disconnect_watch() {
                session.set_disconnect_watch(self.watch_disconnects(name.clone(), disconnects));
            }
        }
        outcome
    }

    fn build_link(self: &Arc<Self>, name: &str, negotiated: NegotiatedLink) -> SessionLink {
        let listener = self.spawn_listener(name.to_string(), negotiated.notifications);
        let monitor = self.spawn_monitor(name.to_string());
        SessionLink::new(negotiated.generation, negotiated.characteristic).with_tasks(listener, monitor)
    }

    fn spawn_listener(self: &Arc<Self>, name: String, mut notifications: NotificationStream) -> AbortHandle {
        let shared = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(bytes) = notifications.next().await {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.handle_notification(&name, &bytes);
            }
            debug!(device = %name, "Notification stream ended");
        })
        .abort_handle()
    }

    fn handle_notification(&self, name: &str, bytes: &[u8]) {
        let face = match self.lock().get_mut(name) {
            Some(session) => session.handle_notification(bytes, Instant::now()),
            None => None,
        };
        if let Some(face) = face {
            self.roll(name, face);
        }
    }

    fn roll(&self, name: &str, face_value: u16) {
        let modifier = self.modifier.modifier_state();
        let lines = formula::format_roll(
            &self.templates,
            &RollInput {
                face_value,
                die_name: name,
                modifier_visible: modifier.visible,
                modifier_value: modifier.value,
                modifier_name: &modifier.name,
            },
        );

        info!(device = %name, face = face_value, "Roll");
        for line in lines {
            self.send(AppEvent::post_chat(line));
        }
    }

    /// Catch links the platform dropped without telling us
    fn spawn_monitor(self: &Arc<Self>, name: String) -> AbortHandle {
        let shared = Arc::downgrade(self);
        let period = self.settings.monitor_interval();
        let timeout = self.settings.activity_timeout();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };

                let silenced = match shared.lock().get_mut(&name) {
                    Some(session) if session.is_link_silent(Instant::now(), timeout) => {
                        session.mark_disconnected(Instant::now())
                    }
                    Some(_) => false,
                    None => break,
                };
                if silenced {
                    warn!(device = %name, "No activity for {:?}, marking disconnected", timeout);
                    shared.send_status();
                    break;
                }
            }
        })
        .abort_handle()
    }

    fn watch_disconnects(self: &Arc<Self>, name: String, mut events: DisconnectStream) -> AbortHandle {
        let shared = Arc::downgrade(self);
        tokio::spawn(async move {
            while events.next().await.is_some() {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.on_platform_disconnect(&name);
            }
        })
        .abort_handle()
    }

    fn on_platform_disconnect(self: &Arc<Self>, name: &str) {
        {
            let mut registry = self.lock();
            let Some(session) = registry.get_mut(name) else {
                return;
            };

            session.mark_disconnected(Instant::now());
            if !session.can_start_reconnect() {
                debug!(device = %name, "Reconnection already pending or given up");
                return;
            }

            info!(device = %name, "Unexpected disconnect, scheduling reconnection");
            let task = self.spawn_reconnect(name.to_string(), session.device());
            session.begin_reconnect(task);
        }
        self.send_status();
    }

    fn spawn_reconnect(self: &Arc<Self>, name: String, device: Arc<dyn BleDevice>) -> AbortHandle {
        let shared = Arc::downgrade(self);
        let policy = self.policy;
        let settle = self.settings.reconnect_settle();
        tokio::spawn(async move {
            let mut delay = policy.initial_delay();
            loop {
                tokio::time::sleep(delay).await;
                let result = connection::reestablish(device.as_ref(), settle).await;
                let Some(shared) = shared.upgrade() else {
                    return;
                };

                let error = match result {
                    Ok(negotiated) => {
                        shared.finish_reconnect(&name, negotiated);
                        return;
                    }
                    Err(e) => e,
                };

                let attempts = match shared.lock().get_mut(&name) {
                    Some(session) if !session.is_connected() => session.record_reconnect_failure(),
                    _ => return,
                };
                match policy.after_failure(attempts) {
                    RetryDecision::RetryAfter(next) => {
                        warn!(
                            device = %name,
                            attempt = attempts,
                            delay_ms = next.as_millis() as u64,
                            "Reconnection failed: {}",
                            error
                        );
                        delay = next;
                    }
                    RetryDecision::GiveUp => {
                        shared.abandon_reconnect(&name, attempts, &error);
                        return;
                    }
                }
            }
        })
        .abort_handle()
    }

    fn finish_reconnect(self: &Arc<Self>, name: &str, negotiated: NegotiatedLink) {
        let link = self.build_link(name, negotiated);
        {
            let mut registry = self.lock();
            match registry.get_mut(name) {
                Some(session) if !session.is_connected() => session.reconnect(link, Instant::now()),
                // Evicted or connected by hand in the meantime; the link drops here
                _ => return,
            }
        }
        self.send(AppEvent::post_chat(format!("Reconnected to {}", name)));
        self.send_status();
    }

    fn abandon_reconnect(&self, name: &str, attempts: u32, last_error: &BleError) {
        match self.lock().get_mut(name) {
            Some(session) => session.give_up_reconnect(),
            None => return,
        }
        error!(device = %name, attempts, "Reconnection abandoned: {}", last_error);
        self.send(AppEvent::post_chat(format!(
            "Failed to reconnect to {} after {} attempts",
            name, attempts
        )));
        self.send_status();
    }
}
