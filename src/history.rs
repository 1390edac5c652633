//! history.rs: bounded in-memory store of accepted signals, most recent first.
//!
//! The only writer is the dispatch path; readers always get a cloned
//! snapshot, never a live reference.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::signal::ClassifiedSignal;

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
pub const MAX_HISTORY_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub signal: ClassifiedSignal,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SignalHistory {
    inner: Mutex<VecDeque<HistoryEntry>>,
    cap: usize,
}

impl Default for SignalHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl SignalHistory {
    /// Capacity is clamped to `1..=MAX_HISTORY_CAPACITY`.
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, MAX_HISTORY_CAPACITY);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap.min(4096))),
            cap,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Prepend; drops from the old end once over capacity.
    pub fn add(&self, signal: ClassifiedSignal) {
        self.add_at(signal, Utc::now());
    }

    pub fn add_at(&self, signal: ClassifiedSignal, received_at: DateTime<Utc>) {
        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.push_front(HistoryEntry {
            signal,
            received_at,
        });
        v.truncate(self.cap);
    }

    /// Up to `limit` entries, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let v = self.inner.lock().expect("history mutex poisoned");
        v.iter().take(limit).cloned().collect()
    }

    /// Full point-in-time copy, most recent first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.recent(self.cap)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().expect("history mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
