use serde::{Deserialize, Serialize};

/// Decoded BLE notification from a die
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollEvent {
    /// The die is tumbling or was picked up
    Movement,
    /// The die settled; `face` is 0-indexed as sent by the firmware
    FaceUp { face: u8 },
    /// Any message this bridge does not care about
    Unknown,
}

impl RollEvent {
    /// 1-indexed face value shown to players, if this is a face-up event
    pub fn display_value(&self) -> Option<u16> {
        match self {
            Self::FaceUp { face } => Some(u16::from(*face) + 1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Modifier configured in the settings panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierState {
    #[serde(default)]
    pub value: i32,
    #[serde(default = "default_modifier_name")]
    pub name: String,
    #[serde(default)]
    pub visible: bool,
}

impl Default for ModifierState {
    fn default() -> Self {
        Self {
            value: 0,
            name: default_modifier_name(),
            visible: false,
        }
    }
}

fn default_modifier_name() -> String {
    "Modifier".to_string()
}

/// Messages sent from the bridge to the extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AppEvent {
    /// Status line for the popup
    ShowText { text: String },
    /// One line to post into the Roll20 chat
    PostChat { text: String },
}

impl AppEvent {
    pub fn show_text(text: impl Into<String>) -> Self {
        Self::ShowText { text: text.into() }
    }

    pub fn post_chat(text: impl Into<String>) -> Self {
        Self::PostChat { text: text.into() }
    }
}

/// Commands received from the extension popup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    Connect,
    Disconnect,
    GetStatus,
    SetModifier { modifier: String },
    SetModifierName { name: String },
    ShowModifier,
    HideModifier,
}

/// Status line for `connected` out of `total` known dice
pub fn status_text(connected: usize, total: usize) -> String {
    match total {
        0 => "No Pixel connected".to_string(),
        1 if connected == 1 => "1 Pixel connected".to_string(),
        1 => "1 Pixel disconnected".to_string(),
        _ => format!("{}/{} Pixels connected", connected, total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(0, 0), "No Pixel connected");
        assert_eq!(status_text(1, 1), "1 Pixel connected");
        assert_eq!(status_text(0, 1), "1 Pixel disconnected");
        assert_eq!(status_text(2, 3), "2/3 Pixels connected");
        assert_eq!(status_text(0, 2), "0/2 Pixels connected");
    }

    #[test]
    fn test_show_text_wire_format() {
        let json = serde_json::to_value(AppEvent::show_text("No Pixel connected")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "showText", "text": "No Pixel connected"})
        );
    }

    #[test]
    fn test_parse_commands() {
        let cmd: Command = serde_json::from_str(r#"{"action":"getStatus"}"#).unwrap();
        assert_eq!(cmd, Command::GetStatus);

        let cmd: Command =
            serde_json::from_str(r#"{"action":"setModifier","modifier":"-2"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::SetModifier {
                modifier: "-2".to_string()
            }
        );

        assert!(serde_json::from_str::<Command>(r#"{"action":"explode"}"#).is_err());
    }

    #[test]
    fn test_display_value() {
        assert_eq!(RollEvent::FaceUp { face: 19 }.display_value(), Some(20));
        assert_eq!(RollEvent::Movement.display_value(), None);
    }
}
