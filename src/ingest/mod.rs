// src/ingest/mod.rs
pub mod cursor;
pub mod dedup;
pub mod providers;
pub mod scheduler;
pub mod types;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::signal::RawMessage;

pub use crate::ingest::cursor::{CursorTable, SourceCursor};
pub use crate::ingest::dedup::DedupWindow;
pub use crate::ingest::scheduler::{MonitorScheduler, SchedulerState, SourceTickOutcome, TickReport};
pub use crate::ingest::types::MessageSource;

pub const MAX_MESSAGE_CHARS: usize = 2000;
const PREVIEW_CHARS: usize = 50;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize chat text: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, "");
    let collapsed = RE_WS.replace_all(&stripped, " ");
    let out = collapsed.trim();

    if out.chars().count() > MAX_MESSAGE_CHARS {
        out.chars().take(MAX_MESSAGE_CHARS).collect()
    } else {
        out.to_string()
    }
}

/// Case-insensitive substring match against any allow-list entry.
/// An empty allow-list lets everything through.
pub fn is_allowed(content: &str, allow_list: &[String]) -> bool {
    if allow_list.is_empty() {
        return true;
    }
    let lc = content.to_lowercase();
    allow_list.iter().any(|w| lc.contains(&w.to_lowercase()))
}

/// Normalize each message and split off those that are empty or not allowed.
/// Returns (survivors in input order, filtered-out count).
pub fn normalize_and_filter(
    messages: Vec<RawMessage>,
    allow_list: &[String],
) -> (Vec<RawMessage>, usize) {
    let mut filtered_out = 0usize;
    let mut kept = Vec::with_capacity(messages.len());
    for mut msg in messages {
        msg.content = normalize_text(&msg.content);
        if msg.content.is_empty() || !is_allowed(&msg.content, allow_list) {
            filtered_out += 1;
            continue;
        }
        kept.push(msg);
    }
    (kept, filtered_out)
}

/// Short stable id for log lines; raw text is never logged in full.
pub fn fingerprint(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub fn preview(text: &str) -> String {
    let mut p: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        p.push('…');
    }
    p
}
