//! Roll Formula Engine
//!
//! Builds the Roll20 chat message(s) for a settled die.

use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_MODIFIER_NAME: &str = "#modifier_name";
pub const PLACEHOLDER_FACE_VALUE: &str = "#face_value";
pub const PLACEHOLDER_PIXEL_NAME: &str = "#pixel_name";
pub const PLACEHOLDER_MODIFIER_VALUE: &str = "#modifier_value";
pub const PLACEHOLDER_RESULT: &str = "#result";

/// Separator a template uses to produce several chat messages
pub const LINE_MARKER: &str = "\\n";

const CRITICAL_DECORATION: &str = "CRITICAL! ";
const FUMBLE_DECORATION: &str = "FUMBLE! ";
const NAME_FIELD: &str = "{{name=";

/// Chat templates, editable through the settings file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaTemplates {
    #[serde(default = "default_simple")]
    pub simple: String,
    #[serde(default = "default_with_modifier")]
    pub with_modifier: String,
}

impl Default for FormulaTemplates {
    fn default() -> Self {
        Self {
            simple: default_simple(),
            with_modifier: default_with_modifier(),
        }
    }
}

fn default_simple() -> String {
    "&{template:default} {{name=#pixel_name}} {{Roll=[[#face_value]]}}".to_string()
}

fn default_with_modifier() -> String {
    "&{template:default} {{name=#pixel_name (#modifier_name)}} {{Pixel Roll=[[#face_value]]}} \
     {{Modifier=[[#modifier_value]]}} {{Result=[[#result]]}}"
        .to_string()
}

/// Everything the engine needs to know about one roll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollInput<'a> {
    /// 1-indexed face value
    pub face_value: u16,
    pub die_name: &'a str,
    pub modifier_visible: bool,
    pub modifier_value: i32,
    pub modifier_name: &'a str,
}

/// Build the chat messages for a roll, in posting order
pub fn format_roll(templates: &FormulaTemplates, input: &RollInput<'_>) -> Vec<String> {
    let face = input.face_value.to_string();

    let message = if input.modifier_visible {
        let mut template = templates.with_modifier.clone();
        match input.face_value {
            20 => template = decorate(&template, CRITICAL_DECORATION),
            1 => template = decorate(&template, FUMBLE_DECORATION),
            _ => {}
        }

        let result = i64::from(input.face_value) + i64::from(input.modifier_value);
        template
            .replace(PLACEHOLDER_MODIFIER_NAME, input.modifier_name)
            .replace(PLACEHOLDER_FACE_VALUE, &face)
            .replace(PLACEHOLDER_PIXEL_NAME, input.die_name)
            .replace(PLACEHOLDER_MODIFIER_VALUE, &input.modifier_value.to_string())
            .replace(PLACEHOLDER_RESULT, &result.to_string())
    } else {
        templates
            .simple
            .replace(PLACEHOLDER_FACE_VALUE, &face)
            .replace(PLACEHOLDER_PIXEL_NAME, input.die_name)
    };

    split_lines(&message)
}

fn decorate(template: &str, decoration: &str) -> String {
    match template.find(NAME_FIELD) {
        Some(index) => {
            let insert_at = index + NAME_FIELD.len();
            format!(
                "{}{}{}",
                &template[..insert_at],
                decoration,
                &template[insert_at..]
            )
        }
        None => format!("{}{}", decoration, template),
    }
}

fn split_lines(message: &str) -> Vec<String> {
    message
        .split(LINE_MARKER)
        .flat_map(|segment| segment.split('\n'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
