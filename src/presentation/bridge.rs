//! Extension bridge
//!
//! Reads popup commands as line-delimited JSON and writes status and chat
//! messages back the same way.

use crate::domain::models::{AppEvent, Command};
use crate::domain::modifier::SharedModifier;
use crate::infrastructure::bluetooth::ConnectionManager;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Applies popup commands to the dice and the modifier
#[derive(Clone)]
pub struct CommandHandler {
    manager: ConnectionManager,
    modifier: SharedModifier,
}

impl CommandHandler {
    pub fn new(manager: ConnectionManager, modifier: SharedModifier) -> Self {
        Self { manager, modifier }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub async fn handle(&self, command: Command) {
        debug!("Handling {:?}", command);
        match command {
            Command::Connect => match self.manager.connect_to_new_pixel().await {
                Ok(name) => info!(device = %name, "Connect request finished"),
                Err(e) => {
                    warn!("Connect request failed: {}", e);
                    self.manager.show_text(format!("Connection failed: {}", e));
                }
            },
            Command::Disconnect => self.manager.disconnect_all().await,
            Command::GetStatus => self.manager.emit_status(),
            Command::SetModifier { modifier } => {
                self.modifier.set_value_from_str(&modifier);
            }
            Command::SetModifierName { name } => self.modifier.set_name(&name),
            Command::ShowModifier => self.modifier.set_visible(true),
            Command::HideModifier => self.modifier.set_visible(false),
        }
    }

    /// Serve commands from `input` until it closes, then disconnect every die.
    ///
    /// A failed write closes the output for good; commands are still served.
    pub async fn run<R, W>(&self, input: R, output: W, mut events: mpsc::UnboundedReceiver<AppEvent>)
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut writer = EventWriter::new(output);
        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.dispatch(&line).await,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Reading commands failed: {}", e);
                        break;
                    }
                },
                Some(event) = events.recv() => writer.write(&event).await,
            }
        }

        info!("Input closed, shutting down");
        self.manager.disconnect_all().await;
        while let Ok(event) = events.try_recv() {
            writer.write(&event).await;
        }
    }

    async fn dispatch(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let command = match serde_json::from_str::<Command>(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("Ignoring message {:?}: {}", line, e);
                return;
            }
        };

        match command {
            // Discovery can take a while; keep serving other commands meanwhile
            Command::Connect => {
                let handler = self.clone();
                tokio::spawn(async move { handler.handle(Command::Connect).await });
            }
            command => self.handle(command).await,
        }
    }
}

/// One JSON object per line; gone after the first failed write
struct EventWriter<W> {
    output: Option<W>,
}

impl<W: AsyncWrite + Unpin> EventWriter<W> {
    fn new(output: W) -> Self {
        Self {
            output: Some(output),
        }
    }

    async fn write(&mut self, event: &AppEvent) {
        let Some(output) = self.output.as_mut() else {
            return;
        };
        if let Err(e) = write_event(output, event).await {
            // The extension went away; nobody is left to read
            debug!("Closing event output: {}", e);
            self.output = None;
        }
    }
}

async fn write_event<W: AsyncWrite + Unpin>(output: &mut W, event: &AppEvent) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(event)?;
    json.push('\n');
    output.write_all(json.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
