//! Per-source "how many messages have I already seen" bookkeeping.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCursor {
    pub last_seen_count: usize,
}

impl SourceCursor {
    /// Range of indices that are new in a list of `len` messages.
    /// A list that shrank or stayed the same yields nothing.
    pub fn new_range(&self, len: usize) -> std::ops::Range<usize> {
        if len > self.last_seen_count {
            self.last_seen_count..len
        } else {
            len..len
        }
    }

    /// Never moves backwards.
    pub fn advance_to(&mut self, len: usize) {
        self.last_seen_count = self.last_seen_count.max(len);
    }
}

#[derive(Debug, Default)]
pub struct CursorTable {
    inner: Mutex<BTreeMap<String, SourceCursor>>,
}

impl CursorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor; unseen sources start at zero.
    pub fn get(&self, source_id: &str) -> SourceCursor {
        self.inner
            .lock()
            .expect("cursor mutex poisoned")
            .get(source_id)
            .copied()
            .unwrap_or(SourceCursor { last_seen_count: 0 })
    }

    pub fn advance(&self, source_id: &str, len: usize) -> SourceCursor {
        let mut map = self.inner.lock().expect("cursor mutex poisoned");
        let c = map
            .entry(source_id.to_string())
            .or_insert(SourceCursor { last_seen_count: 0 });
        c.advance_to(len);
        *c
    }

    pub fn reset(&self) {
        self.inner.lock().expect("cursor mutex poisoned").clear();
    }

    pub fn snapshot(&self) -> BTreeMap<String, SourceCursor> {
        self.inner.lock().expect("cursor mutex poisoned").clone()
    }
}
