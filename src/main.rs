use pixels_roll20::domain::modifier::SharedModifier;
use pixels_roll20::domain::settings::SettingsService;
use pixels_roll20::infrastructure::bluetooth::backend::{BleBackend, UnavailableBackend};
use pixels_roll20::infrastructure::bluetooth::scanner::BtleplugBackend;
use pixels_roll20::infrastructure::bluetooth::{CleanupScheduler, ConnectionManager};
use pixels_roll20::infrastructure::logging;
use pixels_roll20::presentation::CommandHandler;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();
    let _logging_guard = logging::init_logger(&settings.log_settings)?;
    info!(
        "Starting Pixels Roll20 bridge (settings: {})",
        settings_service.path().display()
    );

    let (event_sender, event_receiver) = mpsc::unbounded_channel();
    let modifier = SharedModifier::new(settings.default_modifier.clone());
    let backend: Arc<dyn BleBackend> =
        match BtleplugBackend::new(settings.connection.scan_timeout()).await {
            Ok(backend) => Arc::new(backend),
            Err(e) => {
                warn!("Bluetooth unavailable, connect requests will fail: {}", e);
                Arc::new(UnavailableBackend)
            }
        };

    let manager = ConnectionManager::new(backend, Arc::new(modifier.clone()), event_sender, &settings);
    let _cleanup = CleanupScheduler::start(manager.clone());

    let handler = CommandHandler::new(manager, modifier);
    handler
        .run(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            event_receiver,
        )
        .await;

    info!("Pixels Roll20 bridge stopped");
    Ok(())
}
