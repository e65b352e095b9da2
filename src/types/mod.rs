use crate::keyboard::Presentation;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ===================================================================
// Session commands
// ===================================================================

/// Slash commands understood by the bot. The Spanish command names of the
/// chat front-end are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Start,
    Cancel,
    Status,
    Stats,
    #[serde(alias = "descargar")]
    Download,
    #[serde(alias = "limpiar_cloud")]
    Clear,
    #[serde(alias = "guardar")]
    Save,
}

// ===================================================================
// Transport events (one JSON object per stdin line, snake_case)
// ===================================================================

/// Fields shared by all events.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonInput {
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CommandEvent {
    #[serde(flatten)]
    pub common: CommonInput,
    pub command: Command,
}

#[derive(Debug, Deserialize)]
pub struct TextEvent {
    #[serde(flatten)]
    pub common: CommonInput,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ButtonEvent {
    #[serde(flatten)]
    pub common: CommonInput,
    /// Opaque `field:action[:value]` payload of the pressed button.
    pub payload: String,
}

/// Top-level transport event, tagged by the `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Command(CommandEvent),
    Text(TextEvent),
    Button(ButtonEvent),
}

impl Event {
    pub fn common(&self) -> &CommonInput {
        match self {
            Self::Command(e) => &e.common,
            Self::Text(e) => &e.common,
            Self::Button(e) => &e.common,
        }
    }
}

// ===================================================================
// Replies (one JSON object per stdout line)
// ===================================================================

/// Something for the transport to deliver to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Message {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keyboard: Option<Presentation>,
    },
    /// Send a file as a document attachment.
    Document {
        path: PathBuf,
        filename: String,
        caption: String,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Message {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Option<Presentation>) -> Self {
        Reply::Message {
            text: text.into(),
            keyboard,
        }
    }

    /// Message text, if this is a message.
    #[cfg(test)]
    pub fn message_text(&self) -> Option<&str> {
        match self {
            Reply::Message { text, .. } => Some(text.as_str()),
            Reply::Document { .. } => None,
        }
    }

    #[cfg(test)]
    pub fn keyboard(&self) -> Option<&Presentation> {
        match self {
            Reply::Message { keyboard, .. } => keyboard.as_ref(),
            Reply::Document { .. } => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Output {
    pub conversation_id: String,
    pub replies: Vec<Reply>,
}
