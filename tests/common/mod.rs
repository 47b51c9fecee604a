//! In-memory Bluetooth for driving the connection manager in tests.
#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use pixels_roll20::domain::models::{AppEvent, ModifierState};
use pixels_roll20::domain::modifier::SharedModifier;
use pixels_roll20::domain::settings::Settings;
use pixels_roll20::infrastructure::bluetooth::backend::{
    BleBackend, BleDevice, DisconnectStream, NotificationStream,
};
use pixels_roll20::infrastructure::bluetooth::protocol::{
    DiscoveryFilter, NotifyCharacteristic, ProtocolGeneration,
};
use pixels_roll20::infrastructure::bluetooth::{BleError, ConnectionManager};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct FakeDevice {
    name: String,
    protocol: Option<ProtocolGeneration>,
    connected: AtomicBool,
    connect_fails: AtomicBool,
    notify_fails: AtomicBool,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    resolved_services: Mutex<Vec<Uuid>>,
    notifications: Mutex<Option<UnboundedSender<Vec<u8>>>>,
    disconnect_listeners: Mutex<Vec<UnboundedSender<()>>>,
}

impl FakeDevice {
    pub fn new(name: &str, protocol: Option<ProtocolGeneration>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            protocol,
            connected: AtomicBool::new(false),
            connect_fails: AtomicBool::new(false),
            notify_fails: AtomicBool::new(false),
            connect_calls: AtomicU32::new(0),
            disconnect_calls: AtomicU32::new(0),
            resolved_services: Mutex::new(Vec::new()),
            notifications: Mutex::new(None),
            disconnect_listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn modern(name: &str) -> Arc<Self> {
        Self::new(name, Some(ProtocolGeneration::Modern))
    }

    pub fn set_connect_fails(&self, fails: bool) {
        self.connect_fails.store(fails, Ordering::SeqCst);
    }

    /// Characteristic resolves but refuses to notify
    pub fn set_notify_fails(&self, fails: bool) {
        self.notify_fails.store(fails, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn resolved_services(&self) -> Vec<Uuid> {
        self.resolved_services.lock().unwrap().clone()
    }

    /// Push a characteristic value to whoever listens
    pub fn notify(&self, bytes: &[u8]) {
        if let Some(sender) = self.notifications.lock().unwrap().as_ref() {
            let _ = sender.unbounded_send(bytes.to_vec());
        }
    }

    /// Lose the radio link, as the platform would report it
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.notifications.lock().unwrap().take();
        self.disconnect_listeners
            .lock()
            .unwrap()
            .retain(|listener| listener.unbounded_send(()).is_ok());
    }
}

#[async_trait]
impl BleDevice for FakeDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn connect_gatt(&self) -> Result<(), BleError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.connect_fails.load(Ordering::SeqCst) {
            return Err(BleError::Platform("out of range".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.connected.load(Ordering::SeqCst) {
            self.drop_link();
        }
        Ok(())
    }

    async fn resolve_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotifyCharacteristic, BleError> {
        self.resolved_services.lock().unwrap().push(service);
        match self.protocol {
            Some(protocol) if protocol.service_uuid() == service => {
                if protocol.notify_char_uuid() == characteristic {
                    Ok(NotifyCharacteristic {
                        service,
                        uuid: characteristic,
                    })
                } else {
                    Err(BleError::CharacteristicNotFound(characteristic))
                }
            }
            _ => Err(BleError::ServiceNotFound(service)),
        }
    }

    async fn start_notifications(
        &self,
        _characteristic: &NotifyCharacteristic,
    ) -> Result<NotificationStream, BleError> {
        if self.notify_fails.load(Ordering::SeqCst) {
            return Err(BleError::Platform("notify refused".to_string()));
        }
        let (sender, receiver) = unbounded();
        *self.notifications.lock().unwrap() = Some(sender);
        Ok(receiver.boxed())
    }

    async fn disconnect_events(&self) -> Result<DisconnectStream, BleError> {
        let (sender, receiver) = unbounded();
        self.disconnect_listeners.lock().unwrap().push(sender);
        Ok(receiver.boxed())
    }
}

/// Hands out queued devices, one per discovery
#[derive(Default)]
pub struct FakeBackend {
    unavailable: bool,
    queue: Mutex<VecDeque<Arc<FakeDevice>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            unavailable: true,
            ..Default::default()
        })
    }

    pub fn offer(&self, device: &Arc<FakeDevice>) {
        self.queue.lock().unwrap().push_back(Arc::clone(device));
    }
}

#[async_trait]
impl BleBackend for FakeBackend {
    async fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn request_device(
        &self,
        _filters: &[DiscoveryFilter],
    ) -> Result<Arc<dyn BleDevice>, BleError> {
        match self.queue.lock().unwrap().pop_front() {
            Some(device) => Ok(device),
            None => Err(BleError::DiscoveryFailed("picker dismissed".to_string())),
        }
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub manager: ConnectionManager,
    pub modifier: SharedModifier,
    pub events: mpsc::UnboundedReceiver<AppEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::with_backend(FakeBackend::new(), settings)
    }

    pub fn with_backend(backend: Arc<FakeBackend>, settings: Settings) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        let modifier = SharedModifier::new(ModifierState::default());
        let manager = ConnectionManager::new(
            backend.clone(),
            Arc::new(modifier.clone()),
            sender,
            &settings,
        );
        Self {
            backend,
            manager,
            modifier,
            events,
        }
    }

    /// Everything sent to the extension since the last call
    pub fn drain(&mut self) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn chat_lines(&mut self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                AppEvent::PostChat { text } => Some(text),
                AppEvent::ShowText { .. } => None,
            })
            .collect()
    }
}

/// Let spawned tasks run; the clock is paused so this costs no real time
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Settings where an idle die is never considered lost
pub fn patient_settings() -> Settings {
    let mut settings = Settings::default();
    settings.connection.activity_timeout_ms = 24 * 60 * 60 * 1000;
    settings
}
