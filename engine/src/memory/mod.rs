//! Memory Store for agents
//!
//! Each agent owns a MemoryStore holding two independent stores:
//!
//! - a bounded conversation history (oldest entries are evicted first once the
//!   configured maximum length is reached), and
//! - an unbounded key/value scratchpad for arbitrary JSON values.
//!
//! Every mutation publishes a change notification on the agent's bus. The
//! `_async` variants make the same state change but wait until all listeners
//! of the notification have settled, for callers that need listener side
//! effects (persistence, replication) to be complete before moving on.

use crate::notification_bus::{EmitReport, Event, NotificationBus};
use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// Default maximum number of history entries
pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 100;

/// One completed exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Input the agent was run with
    pub input: Value,

    /// Processed response text
    pub response: String,

    /// When the exchange was recorded. Filled in by the store when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    /// Create an entry without timestamp; the store stamps it on insertion
    pub fn new(input: Value, response: impl Into<String>) -> Self {
        Self {
            input,
            response: response.into(),
            timestamp: None,
        }
    }
}

/// Bounded history plus key/value scratchpad
#[derive(Debug)]
pub struct MemoryStore {
    /// Identifier carried in notifications (the owning agent's id)
    owner: String,

    history: VecDeque<HistoryEntry>,

    max_history_length: usize,

    scratch: HashMap<String, Value>,

    bus: NotificationBus,
}

impl MemoryStore {
    /// Create a store with the default history bound
    pub fn new(owner: impl Into<String>, bus: NotificationBus) -> Self {
        Self {
            owner: owner.into(),
            history: VecDeque::new(),
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            scratch: HashMap::new(),
            bus,
        }
    }

    /// Create a store with a specific history bound
    ///
    /// # Errors
    /// A bound of zero is a configuration error.
    pub fn with_limit(
        owner: impl Into<String>,
        bus: NotificationBus,
        max_history_length: usize,
    ) -> Result<Self, EngineError> {
        if max_history_length == 0 {
            return Err(EngineError::Config(
                "max_history_length must be at least 1".to_string(),
            ));
        }

        let mut store = Self::new(owner, bus);
        store.max_history_length = max_history_length;
        Ok(store)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn max_history_length(&self) -> usize {
        self.max_history_length
    }

    /// Number of history entries currently held
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Append an entry, evicting the oldest ones beyond the bound
    pub fn add_to_history(&mut self, entry: HistoryEntry) -> EmitReport {
        let event = self.push_history(entry);
        self.bus.emit(event)
    }

    /// `add_to_history`, waiting for listeners to settle
    pub async fn add_to_history_async(&mut self, entry: HistoryEntry) -> EmitReport {
        let event = self.push_history(entry);
        self.bus.emit_async(event).await
    }

    /// The last `limit` entries, oldest first. `None` means the full bound.
    pub fn get_history(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        let limit = limit.unwrap_or(self.max_history_length);
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Entries with index in `start..end`, clamped to the stored range
    pub fn get_history_range(&self, start: usize, end: usize) -> Vec<HistoryEntry> {
        let end = end.min(self.history.len());
        let start = start.min(end);
        self.history.range(start..end).cloned().collect()
    }

    /// Store a value. Returns whether the stored value changed.
    ///
    /// Writing a value equal to the current one emits no notification.
    pub fn remember(&mut self, key: impl Into<String>, value: Value) -> bool {
        match self.store_value(key.into(), value) {
            Some(event) => {
                self.bus.emit(event);
                true
            }
            None => false,
        }
    }

    /// `remember`, waiting for listeners to settle
    pub async fn remember_async(&mut self, key: impl Into<String>, value: Value) -> bool {
        match self.store_value(key.into(), value) {
            Some(event) => {
                self.bus.emit_async(event).await;
                true
            }
            None => false,
        }
    }

    pub fn recall(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    /// Keys currently in the scratchpad, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.scratch.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove a key. Returns whether anything was removed.
    pub fn forget(&mut self, key: &str) -> bool {
        match self.remove_value(key) {
            Some(event) => {
                self.bus.emit(event);
                true
            }
            None => false,
        }
    }

    /// `forget`, waiting for listeners to settle
    pub async fn forget_async(&mut self, key: &str) -> bool {
        match self.remove_value(key) {
            Some(event) => {
                self.bus.emit_async(event).await;
                true
            }
            None => false,
        }
    }

    /// Wipe history and scratchpad
    pub fn clear(&mut self) -> EmitReport {
        let event = self.wipe();
        self.bus.emit(event)
    }

    /// `clear`, waiting for listeners to settle
    pub async fn clear_async(&mut self) -> EmitReport {
        let event = self.wipe();
        self.bus.emit_async(event).await
    }

    fn push_history(&mut self, mut entry: HistoryEntry) -> Event {
        if entry.timestamp.is_none() {
            entry.timestamp = Some(Utc::now());
        }

        self.history.push_back(entry);
        while self.history.len() > self.max_history_length {
            self.history.pop_front();
        }

        Event::HistoryUpdated {
            owner: self.owner.clone(),
            history: self.history.iter().cloned().collect(),
        }
    }

    fn store_value(&mut self, key: String, value: Value) -> Option<Event> {
        if self.scratch.get(&key) == Some(&value) {
            return None;
        }

        let old_value = self.scratch.insert(key.clone(), value.clone());
        Some(Event::MemoryUpdated {
            owner: self.owner.clone(),
            key,
            value,
            old_value,
        })
    }

    fn remove_value(&mut self, key: &str) -> Option<Event> {
        self.scratch.remove(key).map(|value| Event::MemoryForgotten {
            owner: self.owner.clone(),
            key: key.to_string(),
            value,
        })
    }

    fn wipe(&mut self) -> Event {
        self.history.clear();
        self.scratch.clear();
        Event::MemoryCleared {
            owner: self.owner.clone(),
        }
    }
}
