//! Modifier state provided by the settings panel.

use crate::domain::models::ModifierState;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Read side of the settings panel
pub trait ModifierSource: Send + Sync {
    fn modifier_state(&self) -> ModifierState;
}

/// Used when no settings panel is attached: rolls are posted without modifier
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModifier;

impl ModifierSource for NoModifier {
    fn modifier_state(&self) -> ModifierState {
        ModifierState {
            value: 0,
            name: String::new(),
            visible: false,
        }
    }
}

/// Modifier state shared between the command handler and the dice
#[derive(Debug, Clone, Default)]
pub struct SharedModifier {
    state: Arc<Mutex<ModifierState>>,
}

impl SharedModifier {
    pub fn new(initial: ModifierState) -> Self {
        Self {
            state: Arc::new(Mutex::new(initial)),
        }
    }

    /// Set the value from the popup's text input. Unparsable input counts as 0.
    pub fn set_value_from_str(&self, raw: &str) -> i32 {
        let value = match raw.trim().parse::<i32>() {
            Ok(value) => value,
            Err(e) => {
                warn!("Invalid modifier {:?} ({}), using 0", raw, e);
                0
            }
        };
        self.update(|state| state.value = value);
        info!(modifier = value, "Modifier updated");
        value
    }

    pub fn set_name(&self, name: &str) {
        self.update(|state| state.name = name.to_string());
    }

    pub fn set_visible(&self, visible: bool) {
        self.update(|state| state.visible = visible);
    }

    fn update(&self, f: impl FnOnce(&mut ModifierState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

impl ModifierSource for SharedModifier {
    fn modifier_state(&self) -> ModifierState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
