use crate::fields::{planilla_fields, Registry};
use crate::messages::{self, Messages};
use crate::metadata::Conversation;
use crate::preferences::Preferences;
use crate::store::{JsonRecordStore, RecordStore};
use crate::types::{ButtonEvent, Command, CommandEvent, Reply, TextEvent};
use crate::wizard::{Answer, Wizard};
use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use minijinja::context;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const CLEAR_CONFIRMATION: &str = "LIMPIAR CLOUD";

/// Read and deserialize a JSON file, returning `None` if it doesn't exist.
fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(s) => {
            let val = serde_json::from_str(&s)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(Some(val))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Remove a file, ignoring "not found" errors.
fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

fn valid_conversation_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// One conversation's view of the data directory: its persisted state, the
/// shared record log, and the form definition.
pub struct Session {
    dir: PathBuf,
    conversation_id: String,
    pub prefs: Preferences,
    registry: Registry,
    store: JsonRecordStore,
    messages: Messages,
}

impl Session {
    /// Load preferences from `data_dir`, make sure the record log exists, and
    /// return a `Session` for `conversation_id` ready for use.
    pub fn open(data_dir: &Path, conversation_id: &str, now: NaiveDateTime) -> Result<Self> {
        if !valid_conversation_id(conversation_id) {
            bail!("invalid conversation id {conversation_id:?}");
        }
        let sessions = data_dir.join("sessions");
        if !sessions.exists() {
            fs::create_dir_all(&sessions)
                .with_context(|| format!("creating {}", sessions.display()))?;
        }
        let prefs = Preferences::load(data_dir)?;
        let store = JsonRecordStore::new(
            data_dir.join(&prefs.data_file),
            data_dir.join(&prefs.backup_file),
        );
        store.initialize(now).context("initializing record log")?;
        let messages = Messages::new().context("loading message templates")?;
        let registry = Registry::new(planilla_fields()).context("building field registry")?;
        if registry.is_empty() {
            warn!("field registry is empty, forms are saved as soon as they start");
        }
        Ok(Self {
            dir: data_dir.to_path_buf(),
            conversation_id: conversation_id.to_string(),
            prefs,
            registry,
            store,
            messages,
        })
    }

    fn conversation_path(&self) -> PathBuf {
        self.dir
            .join("sessions")
            .join(format!("conversation-{}.json", self.conversation_id))
    }

    fn wizard(&self) -> Wizard<'_, JsonRecordStore> {
        Wizard::new(&self.registry, &self.store, &self.messages)
    }

    // ---------------------------------------------------------------
    // Conversation state
    // ---------------------------------------------------------------

    /// Read this conversation's state, dropping a form that outlived the
    /// configured TTL.
    fn read_conversation(&self, now: NaiveDateTime) -> Result<Conversation> {
        let mut conversation =
            read_json_file(&self.conversation_path())?.unwrap_or_else(|| Conversation::new(now));
        if conversation.expire(now, self.prefs.session_ttl()) {
            info!(conversation = %self.conversation_id, "discarded stale form");
        }
        Ok(conversation)
    }

    /// Persist this conversation's state, or delete it when there is nothing
    /// left to remember.
    fn write_conversation(&self, conversation: &mut Conversation, now: NaiveDateTime) -> Result<()> {
        let path = self.conversation_path();
        if conversation.is_empty() {
            return remove_if_exists(&path);
        }
        conversation.last_activity = now;
        let json =
            serde_json::to_string_pretty(conversation).context("serializing conversation")?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
    }

    // ---------------------------------------------------------------
    // Event handlers
    // ---------------------------------------------------------------

    pub fn handle_command(&self, input: &CommandEvent, now: NaiveDateTime) -> Result<Vec<Reply>> {
        let mut conversation = self.read_conversation(now)?;
        let wizard = self.wizard();

        let replies = match input.command {
            Command::Start => {
                conversation.awaiting_clear_confirmation = false;
                wizard.start(&mut conversation.form, now)?
            }
            Command::Cancel => {
                conversation.awaiting_clear_confirmation = false;
                wizard.cancel(&mut conversation.form)
            }
            Command::Status => wizard.status(conversation.form.as_ref())?,
            Command::Save => wizard.retry_save(&mut conversation.form, now)?,
            Command::Stats => self.stats()?,
            Command::Download => self.download(now)?,
            Command::Clear => {
                let replies = self.clear_prompt()?;
                conversation.awaiting_clear_confirmation = true;
                replies
            }
        };

        self.write_conversation(&mut conversation, now)?;
        Ok(replies)
    }

    pub fn handle_text(&self, input: &TextEvent, now: NaiveDateTime) -> Result<Vec<Reply>> {
        let mut conversation = self.read_conversation(now)?;

        // A pending clear confirmation consumes the next message, whatever it is.
        let replies = if conversation.awaiting_clear_confirmation {
            conversation.awaiting_clear_confirmation = false;
            self.confirm_clear(&input.text, now)?
        } else {
            self.wizard()
                .answer(&mut conversation.form, Answer::Text(input.text.clone()), now)?
        };

        self.write_conversation(&mut conversation, now)?;
        Ok(replies)
    }

    pub fn handle_button(&self, input: &ButtonEvent, now: NaiveDateTime) -> Result<Vec<Reply>> {
        let mut conversation = self.read_conversation(now)?;
        let replies = self.wizard().answer(
            &mut conversation.form,
            Answer::Button(input.payload.clone()),
            now,
        )?;
        self.write_conversation(&mut conversation, now)?;
        Ok(replies)
    }

    // ---------------------------------------------------------------
    // Record log commands
    // ---------------------------------------------------------------

    fn stats(&self) -> Result<Vec<Reply>> {
        let stats = match self.store.stats() {
            Ok(s) => s,
            Err(err) => {
                error!("reading stats: {err}");
                return Ok(vec![Reply::text(messages::STORE_UNAVAILABLE)]);
            }
        };
        let last_updated = stats
            .last_updated
            .map(|t| t.format("%Y-%m-%dT%H:%M").to_string())
            .unwrap_or_else(|| "Nunca".to_string());
        let text = self.messages.render(
            messages::STATS,
            context! {
                total_records => stats.total_records,
                file_size_kb => messages::kb(stats.file_size_kb),
                last_updated,
            },
        )?;
        Ok(vec![Reply::text(text)])
    }

    fn download(&self, now: NaiveDateTime) -> Result<Vec<Reply>> {
        let path = self.store.data_path();
        if !path.exists() {
            return Ok(vec![Reply::text(messages::NO_DATA)]);
        }
        let caption = self.messages.render(messages::DOWNLOAD_CAPTION, context! {})?;
        Ok(vec![Reply::Document {
            path: path.to_path_buf(),
            filename: format!("registros_planilla_{}.json", now.format("%Y%m%d_%H%M")),
            caption,
        }])
    }

    fn clear_prompt(&self) -> Result<Vec<Reply>> {
        let total_records = self
            .store
            .stats()
            .map(|s| s.total_records)
            .unwrap_or_default();
        let text = self
            .messages
            .render(messages::CLEAR_PROMPT, context! { total_records })?;
        Ok(vec![Reply::text(text)])
    }

    fn confirm_clear(&self, text: &str, now: NaiveDateTime) -> Result<Vec<Reply>> {
        if text.trim().to_uppercase() != CLEAR_CONFIRMATION {
            return Ok(vec![Reply::text(messages::CLEAR_ABORTED)]);
        }
        match self.store.clear(now) {
            Ok(()) => {
                let text = self.messages.render(messages::CLEARED, context! {})?;
                Ok(vec![Reply::text(text)])
            }
            Err(err) => {
                error!("clearing record log: {err}");
                Ok(vec![Reply::text(messages::CLEAR_FAILED)])
            }
        }
    }
}
