use crate::fields::{FieldSpec, Registry};
use crate::keyboard::{present, ButtonPayload, Choice};
use crate::messages::{self, Messages};
use crate::metadata::{HourSelection, Phase, SessionState};
use crate::normalize::normalize;
use crate::store::{RecordStore, StoreStats};
use crate::types::Reply;
use chrono::NaiveDateTime;
use minijinja::context;
use thiserror::Error;
use tracing::{error, warn};

// ===================================================================
// Input: one answer from the operator
// ===================================================================

/// An answer event, independent of how the transport delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Free text typed by the operator.
    Text(String),
    /// Raw payload of a pressed quick-choice button.
    Button(String),
}

// ===================================================================
// Error: only template rendering can fail
// ===================================================================

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("template render error: {0}")]
    Template(#[from] minijinja::Error),
}

type Replies = Vec<Reply>;

// ===================================================================
// State machine
// ===================================================================

/// Walks one session through the registry.
///
/// Every operation takes the conversation's session slot (`None` when idle),
/// mutates it in place, and returns the replies for the operator. Rejected
/// input (wrong field, malformed button, no session) leaves the slot as it
/// was.
pub struct Wizard<'a, S: ?Sized> {
    registry: &'a Registry,
    store: &'a S,
    messages: &'a Messages,
}

impl<'a, S: RecordStore + ?Sized> Wizard<'a, S> {
    pub fn new(registry: &'a Registry, store: &'a S, messages: &'a Messages) -> Self {
        Self {
            registry,
            store,
            messages,
        }
    }

    pub fn phase(&self, session: Option<&SessionState>) -> Phase {
        Phase::of(session, self.registry.len())
    }

    /// Discard whatever was in progress and ask for the first field.
    pub fn start(
        &self,
        session: &mut Option<SessionState>,
        now: NaiveDateTime,
    ) -> Result<Replies, WizardError> {
        *session = Some(SessionState::new(now));
        let stats = self.stats_or_default();
        let welcome = self.messages.render(
            messages::WELCOME,
            context! {
                total_records => stats.total_records,
                file_size_kb => messages::kb(stats.file_size_kb),
                field_count => self.registry.len(),
            },
        )?;
        let mut replies = vec![Reply::text(welcome)];
        self.ask_current(session, now, &mut replies)?;
        Ok(replies)
    }

    pub fn answer(
        &self,
        session: &mut Option<SessionState>,
        answer: Answer,
        now: NaiveDateTime,
    ) -> Result<Replies, WizardError> {
        let mut replies = Vec::new();
        match answer {
            Answer::Text(raw) => self.on_text(session, &raw, now, &mut replies)?,
            Answer::Button(raw) => self.on_button(session, &raw, now, &mut replies)?,
        }
        Ok(replies)
    }

    /// Persist a record whose earlier save failed.
    pub fn retry_save(
        &self,
        session: &mut Option<SessionState>,
        now: NaiveDateTime,
    ) -> Result<Replies, WizardError> {
        let mut replies = Vec::new();
        match self.phase(session.as_ref()) {
            Phase::ErrorPendingRetry | Phase::Finalizing => {
                if let Some(state) = session.as_mut() {
                    state.pending_save = false;
                }
                self.finalize(session, now, &mut replies)?;
            }
            Phase::Idle | Phase::Collecting(_) => {
                replies.push(Reply::text(messages::NOTHING_TO_SAVE))
            }
        }
        Ok(replies)
    }

    pub fn cancel(&self, session: &mut Option<SessionState>) -> Replies {
        *session = None;
        vec![Reply::text(messages::CANCELLED)]
    }

    pub fn status(&self, session: Option<&SessionState>) -> Result<Replies, WizardError> {
        let text = match (self.phase(session), session) {
            (Phase::ErrorPendingRetry, _) => {
                self.messages.render(messages::STATUS_PENDING, context! {})?
            }
            (Phase::Idle, _) | (_, None) => {
                self.messages.render(messages::STATUS_IDLE, context! {})?
            }
            (_, Some(state)) => {
                let total = self.registry.len();
                let completed = state.values.len();
                let next_field = self
                    .registry
                    .at(state.current_index)
                    .map(FieldSpec::title)
                    .unwrap_or_else(|| "Completado".to_string());
                self.messages.render(
                    messages::STATUS_ACTIVE,
                    context! {
                        bar => messages::progress_bar(completed, total),
                        completed,
                        total,
                        next_field,
                    },
                )?
            }
        };
        Ok(vec![Reply::text(text)])
    }

    // ---------------------------------------------------------------
    // Answer handling
    // ---------------------------------------------------------------

    fn on_text(
        &self,
        session: &mut Option<SessionState>,
        raw: &str,
        now: NaiveDateTime,
        replies: &mut Replies,
    ) -> Result<(), WizardError> {
        let Some(state) = session.as_mut() else {
            replies.push(Reply::text(messages::START_FIRST));
            return Ok(());
        };
        let Some(field) = self.registry.at(state.current_index) else {
            if state.pending_save {
                let text = self.messages.render(messages::STATUS_PENDING, context! {})?;
                replies.push(Reply::text(text));
            }
            return Ok(());
        };

        // Typing while an hour selection is open adds one entry instead of
        // answering the field outright.
        if field.multiple {
            if let Some(hours) = state.hours.as_mut() {
                let entry = normalize(raw, &field.key, now);
                hours.awaiting_custom = false;
                hours.add(entry.clone());
                let text = self.messages.render(
                    messages::HOUR_ADDED,
                    context! { hour => entry, hours => hours.summary() },
                )?;
                replies.push(Reply::with_keyboard(text, present(field, now)));
                return Ok(());
            }
        }

        let value = normalize(raw, &field.key, now);
        self.store_and_advance(session, value, now, replies)
    }

    fn on_button(
        &self,
        session: &mut Option<SessionState>,
        raw: &str,
        now: NaiveDateTime,
        replies: &mut Replies,
    ) -> Result<(), WizardError> {
        let Some(field) = session
            .as_ref()
            .and_then(|s| self.registry.at(s.current_index))
        else {
            replies.push(Reply::text(messages::SESSION_EXPIRED));
            return Ok(());
        };

        let payload = match ButtonPayload::parse(raw) {
            Ok(p) => p,
            Err(err) => {
                warn!("rejected button: {err}");
                replies.push(Reply::text(messages::BAD_PAYLOAD));
                return Ok(());
            }
        };
        if payload.field != field.key {
            replies.push(Reply::text(messages::wrong_field(&field.key)));
            return Ok(());
        }
        let choice = match payload.into_choice(field.multiple) {
            Ok(c) => c,
            Err(err) => {
                warn!("rejected button: {err}");
                replies.push(Reply::text(messages::BAD_PAYLOAD));
                return Ok(());
            }
        };

        match choice {
            Choice::Value(v) => {
                let value = normalize(&v, &field.key, now);
                self.store_and_advance(session, value, now, replies)
            }
            Choice::UseDefault => match &field.default {
                Some(default) => {
                    let value = normalize(&default.resolve(now), &field.key, now);
                    self.store_and_advance(session, value, now, replies)
                }
                None => {
                    warn!(field = %field.key, "default requested for a field without one");
                    replies.push(Reply::text(messages::BAD_PAYLOAD));
                    Ok(())
                }
            },
            Choice::AddValue(v) => self.add_hour(session, field, v, now, replies),
            Choice::RequestCustom => self.request_custom_hour(session, replies),
            Choice::Finish => self.finish_hours(session, now, replies),
        }
    }

    // ---------------------------------------------------------------
    // Multi-value sub-flow
    // ---------------------------------------------------------------

    fn add_hour(
        &self,
        session: &mut Option<SessionState>,
        field: &FieldSpec,
        value: String,
        now: NaiveDateTime,
        replies: &mut Replies,
    ) -> Result<(), WizardError> {
        let Some(state) = session.as_mut() else {
            return Ok(());
        };
        let hours = state.hours.get_or_insert_with(HourSelection::default);
        hours.add(value);
        let text = self.messages.render(
            messages::HOURS_SELECTED,
            context! { hours => hours.summary() },
        )?;
        replies.push(Reply::with_keyboard(text, present(field, now)));
        Ok(())
    }

    fn request_custom_hour(
        &self,
        session: &mut Option<SessionState>,
        replies: &mut Replies,
    ) -> Result<(), WizardError> {
        let Some(state) = session.as_mut() else {
            return Ok(());
        };
        let hours = state.hours.get_or_insert_with(HourSelection::default);
        hours.awaiting_custom = true;
        let text = self.messages.render(
            messages::HOURS_CUSTOM,
            context! { hours => hours.summary() },
        )?;
        replies.push(Reply::text(text));
        Ok(())
    }

    /// Close the selection and store it as one comma-separated answer. An
    /// empty selection becomes the current time.
    fn finish_hours(
        &self,
        session: &mut Option<SessionState>,
        now: NaiveDateTime,
        replies: &mut Replies,
    ) -> Result<(), WizardError> {
        let Some(state) = session.as_mut() else {
            return Ok(());
        };
        let mut hours = state.hours.take().unwrap_or_default();
        if hours.entries.is_empty() {
            hours.add(now.format("%H:%M").to_string());
        }
        self.store_and_advance(session, hours.joined(), now, replies)
    }

    // ---------------------------------------------------------------
    // Progression
    // ---------------------------------------------------------------

    /// Record `value` for the current field, move to the next one, and
    /// prompt for it (or finalize after the last field).
    fn store_and_advance(
        &self,
        session: &mut Option<SessionState>,
        value: String,
        now: NaiveDateTime,
        replies: &mut Replies,
    ) -> Result<(), WizardError> {
        let Some(state) = session.as_mut() else {
            return Ok(());
        };
        let Some(field) = self.registry.at(state.current_index) else {
            return Ok(());
        };
        check_format(field, &value);
        replies.push(Reply::text(messages::confirmation(&field.title(), &value)));
        state.values.insert(field.key.clone(), value);
        state.hours = None;
        state.current_index += 1;
        self.ask_current(session, now, replies)
    }

    fn ask_current(
        &self,
        session: &mut Option<SessionState>,
        now: NaiveDateTime,
        replies: &mut Replies,
    ) -> Result<(), WizardError> {
        let Some(state) = session.as_ref() else {
            return Ok(());
        };
        let index = state.current_index;
        match self.registry.at(index) {
            None => self.finalize(session, now, replies),
            Some(field) => {
                let prompt = format!("({}/{}) {}", index + 1, self.registry.len(), field.prompt);
                replies.push(Reply::with_keyboard(prompt, present(field, now)));
                Ok(())
            }
        }
    }

    /// Hand the finished record to the store. On success the session is
    /// cleared; on failure it is kept, flagged for an explicit retry.
    fn finalize(
        &self,
        session: &mut Option<SessionState>,
        now: NaiveDateTime,
        replies: &mut Replies,
    ) -> Result<(), WizardError> {
        let Some(state) = session.as_mut() else {
            return Ok(());
        };
        let elapsed = (now - state.started_at).num_seconds().max(0);
        let saving = self
            .messages
            .render(messages::SAVING, context! { elapsed })?;
        replies.push(Reply::text(saving));

        match self.store.save_record(&state.values, now) {
            Ok(_) => {
                *session = None;
                let stats = self.stats_or_default();
                let text = self.messages.render(
                    messages::SAVED,
                    context! {
                        elapsed,
                        total_records => stats.total_records,
                        file_size_kb => messages::kb(stats.file_size_kb),
                    },
                )?;
                replies.push(Reply::text(text));
            }
            Err(err) => {
                error!("failed to save record: {err}");
                state.pending_save = true;
                let text = self.messages.render(messages::SAVE_FAILED, context! {})?;
                replies.push(Reply::text(text));
            }
        }
        Ok(())
    }

    fn stats_or_default(&self) -> StoreStats {
        self.store.stats().unwrap_or_else(|err| {
            warn!("could not read store stats: {err}");
            StoreStats::default()
        })
    }
}

/// Log values that do not have the field's declared shape. They are kept
/// as answered.
fn check_format(field: &FieldSpec, value: &str) {
    let Some(validator) = field.validator else {
        return;
    };
    let ok = if field.multiple {
        value.split(", ").all(|v| validator.accepts(v))
    } else {
        validator.accepts(value)
    };
    if !ok {
        warn!(field = %field.key, value, "answer does not match the expected format");
    }
}
