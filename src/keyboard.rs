use crate::fields::FieldSpec;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of option buttons per row.
const ROW_WIDTH: usize = 3;

const DEFAULT_TOKEN: &str = "DEFAULT";
const ADD_TOKEN: &str = "add";
const CUSTOM_TOKEN: &str = "custom";
const FINISH_TOKEN: &str = "finish";

// ===================================================================
// Presentation
// ===================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    /// Opaque callback payload, `field:action[:value]`.
    pub payload: String,
}

impl Button {
    fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Rows of quick-choice buttons attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Presentation {
    pub rows: Vec<Vec<Button>>,
}

impl Presentation {
    #[cfg(test)]
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// Build the quick-choice keyboard for a field, or `None` if the field has
/// no quick options.
pub fn present(field: &FieldSpec, now: NaiveDateTime) -> Option<Presentation> {
    if field.quick_options.is_empty() {
        return None;
    }
    let key = &field.key;

    let mut rows: Vec<Vec<Button>> = field
        .quick_options
        .chunks(ROW_WIDTH)
        .map(|chunk| {
            chunk
                .iter()
                .map(|opt| {
                    let payload = if field.multiple {
                        format!("{key}:{ADD_TOKEN}:{opt}")
                    } else {
                        format!("{key}:{opt}")
                    };
                    Button::new(opt.as_str(), payload)
                })
                .collect()
        })
        .collect();

    if field.multiple {
        rows.push(vec![Button::new(
            "✍️ Escribir hora personalizada",
            format!("{key}:{CUSTOM_TOKEN}"),
        )]);
        rows.push(vec![Button::new(
            "✅ Finalizar selección",
            format!("{key}:{FINISH_TOKEN}"),
        )]);
    } else if let Some(default) = &field.default {
        rows.push(vec![Button::new(
            format!("⏭️ Default ({})", default.resolve(now)),
            format!("{key}:{DEFAULT_TOKEN}"),
        )]);
    }

    Some(Presentation { rows })
}

// ===================================================================
// Payload codec
// ===================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("button payload `{0}` has no field")]
    MissingField(String),
    #[error("button payload `{0}` has no action")]
    MissingAction(String),
    #[error("unknown action `{action}` for multi-value field `{field}`")]
    UnknownAction { field: String, action: String },
}

/// A decoded `field:action[:value]` payload. When no value token is present
/// the action token doubles as the value, so `ph:7.0` carries the value
/// `7.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPayload {
    pub field: String,
    pub action: String,
    pub value: String,
}

/// What a button press asks the wizard to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// Store this value for an ordinary field.
    Value(String),
    /// Store the field's computed default.
    UseDefault,
    /// Append one entry to the multi-value selection.
    AddValue(String),
    /// Wait for the next free-text message as one entry.
    RequestCustom,
    /// Close the multi-value selection.
    Finish,
}

impl ButtonPayload {
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        let mut parts = raw.splitn(3, ':');
        let field = parts.next().unwrap_or_default();
        if field.is_empty() {
            return Err(PayloadError::MissingField(raw.to_string()));
        }
        let action = match parts.next() {
            Some(a) if !a.is_empty() => a,
            _ => return Err(PayloadError::MissingAction(raw.to_string())),
        };
        let value = parts.next().unwrap_or(action);
        Ok(Self {
            field: field.to_string(),
            action: action.to_string(),
            value: value.to_string(),
        })
    }

    /// Interpret the payload for a field; `multiple` selects the
    /// add/custom/finish vocabulary.
    pub fn into_choice(self, multiple: bool) -> Result<Choice, PayloadError> {
        if multiple {
            return match self.action.as_str() {
                ADD_TOKEN => Ok(Choice::AddValue(self.value)),
                CUSTOM_TOKEN => Ok(Choice::RequestCustom),
                FINISH_TOKEN => Ok(Choice::Finish),
                _ => Err(PayloadError::UnknownAction {
                    field: self.field,
                    action: self.action,
                }),
            };
        }
        if self.value == DEFAULT_TOKEN {
            Ok(Choice::UseDefault)
        } else {
            Ok(Choice::Value(self.value))
        }
    }
}
