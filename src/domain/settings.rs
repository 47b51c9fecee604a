use crate::domain::formula::FormulaTemplates;
use crate::domain::models::ModifierState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the bridge writes its diagnostics. Console output always goes to
/// stderr, never to the extension channel on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace" shows every decoded notification
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    /// Relative to the working directory the extension starts the bridge in
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    /// Console only; the file never gets escape codes
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "pixels_roll20".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Timing and discovery parameters of the dice connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Advertised name prefix accepted during discovery
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    // Per-die link monitor
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    #[serde(default = "default_activity_timeout_ms")]
    pub activity_timeout_ms: u64,

    // Global cleanup of forgotten dice
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,

    // Reconnection
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
    #[serde(default = "default_reconnect_settle_ms")]
    pub reconnect_settle_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            scan_timeout_secs: default_scan_timeout_secs(),
            monitor_interval_ms: default_monitor_interval_ms(),
            activity_timeout_ms: default_activity_timeout_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            stale_after_ms: default_stale_after_ms(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            reconnect_settle_ms: default_reconnect_settle_ms(),
        }
    }
}

impl ConnectionSettings {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_millis(self.activity_timeout_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn reconnect_settle(&self) -> Duration {
        Duration::from_millis(self.reconnect_settle_ms)
    }
}

fn default_name_prefix() -> String {
    "Pixel".to_string()
}
fn default_scan_timeout_secs() -> u64 {
    10
}
fn default_monitor_interval_ms() -> u64 {
    5_000
}
fn default_activity_timeout_ms() -> u64 {
    30_000
}
fn default_cleanup_interval_ms() -> u64 {
    60_000
}
fn default_stale_after_ms() -> u64 {
    5 * 60_000
}
fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}
fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}
fn default_reconnect_max_attempts() -> u32 {
    5
}
fn default_reconnect_settle_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // BLE Settings
    #[serde(default)]
    pub connection: ConnectionSettings,

    // Chat output
    #[serde(default)]
    pub templates: FormulaTemplates,
    #[serde(default)]
    pub default_modifier: ModifierState,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load_or_create(settings_path))
    }

    /// Load settings from `settings_path`, writing the defaults there on first run
    pub fn load_or_create(settings_path: PathBuf) -> Self {
        let existed = settings_path.exists();
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        let service = Self {
            settings,
            settings_path,
        };

        if !existed {
            // Best effort, logging is not initialized yet
            if let Err(e) = service.save() {
                eprintln!("Could not write default settings: {}", e);
            }
        }
        service
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("PixelsRoll20");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
