//! Pipeline counters and derived breakdowns.
//!
//! Counters are fed by the monitor; per-symbol and per-action breakdowns are
//! derived from a `SignalHistory` snapshot at read time, so they also cover
//! signals that arrived over HTTP.

use std::collections::BTreeMap;
use std::sync::Mutex;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::Serialize;

use crate::history::SignalHistory;
use crate::signal::RawMessage;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "relay_messages_observed_total",
            "New messages seen across all sources."
        );
        describe_counter!(
            "relay_messages_filtered_total",
            "Messages dropped by the allow-list or normalization."
        );
        describe_counter!(
            "relay_messages_deduplicated_total",
            "Messages dropped as cross-source duplicates."
        );
        describe_counter!(
            "relay_signals_accepted_total",
            "Messages classified as signals above threshold."
        );
        describe_counter!(
            "relay_source_errors_total",
            "Source fetch failures."
        );
        describe_counter!(
            "relay_handler_errors_total",
            "Consumer handler failures."
        );
        describe_gauge!(
            "relay_monitor_last_tick_ts",
            "Unix ts when the monitor last completed a tick."
        );
    });
}

static AUTHOR_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#️⃣[^a-zA-Z]*([a-zA-Z]+)").expect("author tag regex"));

/// Author attributed to a message: a relayed `#️⃣🎯name` tag in the content
/// wins over the transport-level author.
pub fn extract_author(msg: &RawMessage) -> String {
    if let Some(c) = AUTHOR_TAG.captures(&msg.content) {
        return c[1].to_string();
    }
    let a = msg.author.trim();
    if a.is_empty() {
        "unknown".to_string()
    } else {
        a.to_string()
    }
}

#[derive(Debug, Default)]
struct Counters {
    observed: u64,
    filtered_in: u64,
    filtered_out: u64,
    deduplicated: u64,
    accepted: u64,
    classification_errors: u64,
    source_errors: u64,
    handler_errors: u64,
    by_author: BTreeMap<String, u64>,
    by_source: BTreeMap<String, u64>,
}

/// Read-only view for `/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_observed: u64,
    pub filtered_in: u64,
    pub filtered_out: u64,
    pub deduplicated: u64,
    pub signals_accepted: u64,
    pub classification_errors: u64,
    pub source_errors: u64,
    pub handler_errors: u64,
    /// filtered_in / total_observed
    pub filter_rate: f64,
    /// signals_accepted / filtered_in
    pub signal_rate: f64,
    pub by_author: BTreeMap<String, u64>,
    pub by_source: BTreeMap<String, u64>,
    pub by_symbol: BTreeMap<String, u64>,
    pub by_action: BTreeMap<String, u64>,
    pub history_size: usize,
}

#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: Mutex<Counters>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        ensure_metrics_described();
        Self::default()
    }

    pub fn record_observed(&self, source_id: &str, n: usize) {
        if n == 0 {
            return;
        }
        let mut c = self.inner.lock().expect("stats mutex poisoned");
        c.observed += n as u64;
        *c.by_source.entry(source_id.to_string()).or_default() += n as u64;
        counter!("relay_messages_observed_total").increment(n as u64);
    }

    /// A message that passed the allow-list.
    pub fn record_filtered_in(&self, msg: &RawMessage) {
        let author = extract_author(msg);
        let mut c = self.inner.lock().expect("stats mutex poisoned");
        c.filtered_in += 1;
        *c.by_author.entry(author).or_default() += 1;
    }

    pub fn record_filtered_out(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.inner.lock().expect("stats mutex poisoned").filtered_out += n as u64;
        counter!("relay_messages_filtered_total").increment(n as u64);
    }

    pub fn record_deduplicated(&self) {
        self.inner.lock().expect("stats mutex poisoned").deduplicated += 1;
        counter!("relay_messages_deduplicated_total").increment(1);
    }

    pub fn record_accepted(&self) {
        self.inner.lock().expect("stats mutex poisoned").accepted += 1;
        counter!("relay_signals_accepted_total").increment(1);
    }

    pub fn record_classification_error(&self) {
        self.inner.lock().expect("stats mutex poisoned").classification_errors += 1;
    }

    pub fn record_source_error(&self, source_id: &str) {
        self.inner.lock().expect("stats mutex poisoned").source_errors += 1;
        counter!("relay_source_errors_total", "source" => source_id.to_string()).increment(1);
    }

    pub fn record_handler_errors(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.inner.lock().expect("stats mutex poisoned").handler_errors += n as u64;
        counter!("relay_handler_errors_total").increment(n as u64);
    }

    pub fn record_tick(&self, now_unix: i64) {
        gauge!("relay_monitor_last_tick_ts").set(now_unix as f64);
    }

    /// Counters plus breakdowns derived from the current history contents.
    pub fn snapshot(&self, history: &SignalHistory) -> StatsSnapshot {
        let mut by_symbol = BTreeMap::new();
        let mut by_action = BTreeMap::new();
        let entries = history.snapshot();
        for e in &entries {
            let sym = e.signal.symbol.clone().unwrap_or_else(|| "UNKNOWN".to_string());
            *by_symbol.entry(sym).or_insert(0u64) += 1;
            *by_action
                .entry(e.signal.action.as_str().to_string())
                .or_insert(0u64) += 1;
        }

        let c = self.inner.lock().expect("stats mutex poisoned");
        StatsSnapshot {
            total_observed: c.observed,
            filtered_in: c.filtered_in,
            filtered_out: c.filtered_out,
            deduplicated: c.deduplicated,
            signals_accepted: c.accepted,
            classification_errors: c.classification_errors,
            source_errors: c.source_errors,
            handler_errors: c.handler_errors,
            filter_rate: ratio(c.filtered_in, c.observed),
            signal_rate: ratio(c.accepted, c.filtered_in),
            by_author: c.by_author.clone(),
            by_source: c.by_source.clone(),
            by_symbol,
            by_action,
            history_size: entries.len(),
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
