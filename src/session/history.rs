use std::collections::VecDeque;

use anyhow::{Context, Result};

use crate::models::{InteractionSession, SessionKind};
use crate::store::{JsonStoreExt, KeyValueStore};

pub const DEFAULT_HISTORY_CAP: usize = 50;

pub fn history_key(kind: SessionKind) -> String {
    format!("session_history:{}", kind.as_str())
}

/// Finished sessions of one kind, newest last, capped at `cap` entries.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    cap: usize,
    entries: VecDeque<InteractionSession>,
}

impl SessionHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Loads persisted history; unreadable data starts an empty list.
    pub fn load(store: &dyn KeyValueStore, kind: SessionKind, cap: usize) -> Self {
        let mut history = Self::new(cap);
        let stored: Vec<InteractionSession> = store.get_json(&history_key(kind)).unwrap_or_default();
        for session in stored {
            history.push(session);
        }
        history
    }

    pub fn save(&self, store: &dyn KeyValueStore, kind: SessionKind) -> Result<()> {
        let entries: Vec<&InteractionSession> = self.entries.iter().collect();
        store
            .set_json(&history_key(kind), &entries)
            .with_context(|| format!("failed to save {} history", kind.as_str()))
    }

    pub fn push(&mut self, session: InteractionSession) {
        self.entries.push_back(session);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&InteractionSession> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &InteractionSession> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
