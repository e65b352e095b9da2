use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Normalized answers keyed by field, in field order.
pub type FieldValues = IndexMap<String, String>;

/// Progress of one form being filled in.
///
/// `current_index` only ever moves forward within a session, and `values`
/// only holds keys for fields already passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_index: usize,
    #[serde(default)]
    pub values: FieldValues,
    pub started_at: NaiveDateTime,
    /// Present only while the multi-value field is being collected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<HourSelection>,
    /// Set when finalizing failed to persist; cleared by a retry or restart.
    #[serde(default)]
    pub pending_save: bool,
}

impl SessionState {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            current_index: 0,
            values: FieldValues::new(),
            started_at: now,
            hours: None,
            pending_save: false,
        }
    }
}

/// Provisional entries of the multi-value field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourSelection {
    pub entries: Vec<String>,
    /// The next free-text message is one custom entry.
    #[serde(default)]
    pub awaiting_custom: bool,
}

impl HourSelection {
    /// Append `entry` unless it is already selected. Returns whether it was added.
    pub fn add(&mut self, entry: String) -> bool {
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn joined(&self) -> String {
        self.entries.join(", ")
    }

    /// Display form of the current entries.
    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            "Ninguna".to_string()
        } else {
            self.joined()
        }
    }
}

/// Where a conversation stands, derived from its session and the field count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Collecting(usize),
    Finalizing,
    ErrorPendingRetry,
}

impl Phase {
    pub fn of(session: Option<&SessionState>, field_count: usize) -> Self {
        match session {
            None => Phase::Idle,
            Some(s) if s.pending_save => Phase::ErrorPendingRetry,
            Some(s) if s.current_index >= field_count => Phase::Finalizing,
            Some(s) => Phase::Collecting(s.current_index),
        }
    }
}

/// Everything remembered about one conversation between events.
/// Stored as `sessions/conversation-{id}.json` in the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<SessionState>,
    /// A clear of the record log was requested and awaits the confirmation phrase.
    #[serde(default)]
    pub awaiting_clear_confirmation: bool,
    pub last_activity: NaiveDateTime,
}

impl Conversation {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            form: None,
            awaiting_clear_confirmation: false,
            last_activity: now,
        }
    }

    /// Nothing worth persisting.
    pub fn is_empty(&self) -> bool {
        self.form.is_none() && !self.awaiting_clear_confirmation
    }

    /// Drop an in-progress form idle for longer than `ttl`. A zero TTL
    /// disables expiry. Returns whether a form was dropped.
    pub fn expire(&mut self, now: NaiveDateTime, ttl: Duration) -> bool {
        if ttl <= Duration::zero() || self.form.is_none() {
            return false;
        }
        if now - self.last_activity > ttl {
            self.form = None;
            return true;
        }
        false
    }
}
