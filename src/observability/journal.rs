//! Bounded in-process journal of emitted events
//!
//! Every event the engine emits is logged and kept here, oldest first,
//! up to a fixed capacity. The journal describes what happened; nothing
//! reads it to decide anything.

use std::collections::VecDeque;

use super::events::Event;
use super::logger::Logger;

/// Default number of entries retained
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub event: Event,
    pub fields: Vec<(&'static str, String)>,
}

impl JournalEntry {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Journal {
    capacity: usize,
    entries: VecDeque<JournalEntry>,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_JOURNAL_CAPACITY)
    }
}

impl Journal {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_JOURNAL_CAPACITY)),
        }
    }

    /// Log `event` and append it.
    pub fn emit(&mut self, event: Event, fields: Vec<(&'static str, String)>) {
        let refs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        Logger::log(event.severity(), event.as_str(), &refs);

        self.entries.push_back(JournalEntry { event, fields });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    /// Number of retained entries for `event`.
    pub fn count(&self, event: Event) -> usize {
        self.entries.iter().filter(|e| e.event == event).count()
    }

    pub fn last(&self) -> Option<&JournalEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
