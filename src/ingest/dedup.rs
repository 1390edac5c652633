//! Cross-source duplicate suppression.
//!
//! Relayed groups often repost the same call verbatim. A message whose
//! fingerprint (lower-cased author + normalized content) was already forwarded
//! within the time window is dropped before classification.
//!
//! - window of 0 seconds disables the filter
//! - at most `MAX_ENTRIES` fingerprints are remembered, oldest evicted first

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub const MAX_ENTRIES: usize = 4096;

#[derive(Debug, Clone)]
struct Seen {
    at: DateTime<Utc>,
    key: [u8; 32],
}

#[derive(Debug)]
pub struct DedupWindow {
    window_secs: u64,
    seen: Mutex<VecDeque<Seen>>,
}

impl DedupWindow {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs,
            seen: Mutex::new(VecDeque::with_capacity(64)),
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    fn key(author: &str, content: &str) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(author.trim().to_lowercase().as_bytes());
        h.update([0u8]);
        h.update(content.as_bytes());
        h.finalize().into()
    }

    /// `true` if this author/content pair was already seen inside the window.
    /// Otherwise the pair is remembered and `false` returned.
    pub fn check_and_remember(&self, author: &str, content: &str, now: DateTime<Utc>) -> bool {
        if self.window_secs == 0 {
            return false;
        }
        let key = Self::key(author, content);
        // an absurdly large window simply never expires anything
        let horizon = i64::try_from(self.window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|w| now.checked_sub_signed(w));

        let mut seen = self.seen.lock().expect("dedup mutex poisoned");
        while let (Some(front), Some(h)) = (seen.front(), horizon) {
            if front.at < h {
                seen.pop_front();
            } else {
                break;
            }
        }

        if seen.iter().any(|s| s.key == key) {
            return true;
        }

        if seen.len() >= MAX_ENTRIES {
            seen.pop_front();
        }
        seen.push_back(Seen { at: now, key });
        false
    }

    pub fn len(&self) -> usize {
        self.seen.lock().expect("dedup mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
