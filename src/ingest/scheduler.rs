// src/ingest/scheduler.rs
//! Polling loop over registered message sources.
//!
//! State machine: `Idle -> Running -> Stopped`, and `Stopped -> Running` again
//! on restart (cursors are kept unless `reset_cursors` is called). Stop is
//! cooperative: it is observed at the top of each tick, an in-flight tick
//! always runs to completion.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::classify::SignalClassifier;
use crate::context::PipelineContext;
use crate::dispatch::SignalDispatcher;
use crate::error::SourceFetchError;
use crate::ingest::cursor::{CursorTable, SourceCursor};
use crate::ingest::dedup::DedupWindow;
use crate::ingest::types::MessageSource;
use crate::ingest::{fingerprint, normalize_and_filter, preview};
use crate::signal::RawMessage;
use crate::stats::{extract_author, StatsAggregator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        }
    }
}

/// What happened to one source during one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTickOutcome {
    pub source_id: String,
    /// Messages beyond the cursor.
    pub new: usize,
    pub forwarded: usize,
    pub filtered: usize,
    pub deduplicated: usize,
    pub accepted: usize,
    pub classification_errors: usize,
    /// Set when the fetch failed; the cursor was not touched.
    pub error: Option<String>,
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceTickOutcome>,
}

impl TickReport {
    pub fn total_new(&self) -> usize {
        self.sources.iter().map(|s| s.new).sum()
    }

    pub fn total_accepted(&self) -> usize {
        self.sources.iter().map(|s| s.accepted).sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn source(&self, id: &str) -> Option<&SourceTickOutcome> {
        self.sources.iter().find(|s| s.source_id == id)
    }
}

type SourceEntry = (String, Arc<dyn MessageSource>);

pub struct MonitorScheduler {
    dispatcher: Arc<SignalDispatcher>,
    classifier: Arc<dyn SignalClassifier>,
    stats: Arc<StatsAggregator>,
    sources: RwLock<Vec<SourceEntry>>,
    cursors: CursorTable,
    dedup: DedupWindow,
    allow_list: Vec<String>,
    interval: Duration,
    state: Mutex<SchedulerState>,
    cancel: Mutex<Option<watch::Sender<bool>>>,
    tick_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for MonitorScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorScheduler")
            .field("state", &self.state())
            .field("sources", &self.source_ids())
            .field("interval", &self.interval)
            .finish()
    }
}

impl MonitorScheduler {
    pub fn new(
        ctx: &PipelineContext,
        dispatcher: Arc<SignalDispatcher>,
        classifier: Arc<dyn SignalClassifier>,
    ) -> Self {
        let m = &ctx.config.monitor;
        Self {
            dispatcher,
            classifier,
            stats: Arc::clone(&ctx.stats),
            sources: RwLock::new(Vec::new()),
            cursors: CursorTable::new(),
            dedup: DedupWindow::new(m.dedup_window_secs),
            allow_list: m.allow_list.clone(),
            interval: Duration::from_millis(m.interval_ms),
            state: Mutex::new(SchedulerState::Idle),
            cancel: Mutex::new(None),
            tick_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Register (or replace) a source. A replaced source keeps its cursor.
    pub fn register_source(&self, source_id: impl Into<String>, source: Arc<dyn MessageSource>) {
        let id = source_id.into();
        tracing::info!(target: "monitor", source = %id, kind = source.kind(), "message source registered");
        let mut sources = self.sources.write().expect("source registry poisoned");
        if let Some(slot) = sources.iter_mut().find(|(sid, _)| *sid == id) {
            slot.1 = source;
        } else {
            sources.push((id, source));
        }
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources
            .read()
            .expect("source registry poisoned")
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().expect("scheduler state poisoned")
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cursor(&self, source_id: &str) -> SourceCursor {
        self.cursors.get(source_id)
    }

    pub fn cursors(&self) -> BTreeMap<String, SourceCursor> {
        self.cursors.snapshot()
    }

    pub fn dedup_window_secs(&self) -> u64 {
        self.dedup.window_secs()
    }

    /// Forget every cursor: the next tick treats all current messages as new.
    pub fn reset_cursors(&self) {
        tracing::info!(target: "monitor", "source cursors reset");
        self.cursors.reset();
    }

    /// Run one poll over every source. Safe to call in any state; overlapping
    /// calls are serialized.
    pub async fn tick(&self) -> TickReport {
        let _guard = self.tick_lock.lock().await;
        let started_at = Utc::now();

        let sources: Vec<SourceEntry> = self
            .sources
            .read()
            .expect("source registry poisoned")
            .clone();

        let fetched = join_all(sources.iter().map(|(id, src)| async move {
            (id.as_str(), src.fetch_messages(id).await)
        }))
        .await;

        let mut outcomes = Vec::with_capacity(fetched.len());
        for (id, res) in fetched {
            outcomes.push(self.process_source(id, res).await);
        }

        self.stats.record_tick(Utc::now().timestamp());
        TickReport {
            started_at,
            sources: outcomes,
        }
    }

    async fn process_source(
        &self,
        source_id: &str,
        fetched: Result<Vec<RawMessage>, SourceFetchError>,
    ) -> SourceTickOutcome {
        let mut out = SourceTickOutcome {
            source_id: source_id.to_string(),
            ..Default::default()
        };

        let mut messages = match fetched {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "monitor", source = source_id, error = %e, "source fetch failed");
                self.stats.record_source_error(source_id);
                out.error = Some(e.to_string());
                out.cursor = self.cursors.get(source_id).last_seen_count;
                return out;
            }
        };

        let len = messages.len();
        let range = self.cursors.get(source_id).new_range(len);
        let fresh: Vec<RawMessage> = messages.drain(range).collect();
        out.new = fresh.len();
        self.stats.record_observed(source_id, fresh.len());

        let (kept, filtered) = normalize_and_filter(fresh, &self.allow_list);
        out.filtered = filtered;
        self.stats.record_filtered_out(filtered);

        let now = Utc::now();
        for msg in kept {
            self.stats.record_filtered_in(&msg);
            let id = fingerprint(&msg.content);

            if self
                .dedup
                .check_and_remember(&extract_author(&msg), &msg.content, now)
            {
                out.deduplicated += 1;
                self.stats.record_deduplicated();
                tracing::debug!(target: "monitor", source = source_id, %id, "duplicate message skipped");
                continue;
            }
            out.forwarded += 1;

            match self.classifier.classify_message(&msg) {
                Ok(Some(signal)) => {
                    out.accepted += 1;
                    self.stats.record_accepted();
                    tracing::info!(
                        target: "monitor",
                        source = source_id,
                        %id,
                        preview = %preview(&msg.content),
                        signal = %signal.summary(),
                        confidence = signal.confidence,
                        "signal accepted"
                    );
                    self.dispatcher.dispatch(&signal).await;
                }
                Ok(None) => {
                    tracing::debug!(target: "monitor", source = source_id, %id, "not a signal");
                }
                Err(e) => {
                    out.classification_errors += 1;
                    self.stats.record_classification_error();
                    tracing::warn!(target: "monitor", source = source_id, %id, error = %e, "message dropped");
                }
            }
        }

        out.cursor = self.cursors.advance(source_id, len).last_seen_count;
        out
    }

    /// Begin polling. Returns the loop handle, or `None` if already running.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut state = self.state.lock().expect("scheduler state poisoned");
        if *state == SchedulerState::Running {
            tracing::warn!(target: "monitor", "monitor already running");
            return None;
        }
        let resumed = *state == SchedulerState::Stopped;
        *state = SchedulerState::Running;

        let (tx, rx) = watch::channel(false);
        *self.cancel.lock().expect("cancel slot poisoned") = Some(tx);
        drop(state);

        tracing::info!(
            target: "monitor",
            interval_ms = self.interval.as_millis() as u64,
            sources = self.source_ids().len(),
            resumed,
            "monitor started"
        );
        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.run(rx).await }))
    }

    /// Request a stop. No-op unless running.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("scheduler state poisoned");
        if *state != SchedulerState::Running {
            return;
        }
        *state = SchedulerState::Stopped;
        if let Some(tx) = self.cancel.lock().expect("cancel slot poisoned").take() {
            let _ = tx.send(true);
        }
        tracing::info!(target: "monitor", "monitor stop requested");
    }

    async fn run(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        loop {
            if *cancel.borrow() {
                break;
            }

            let report = self.tick().await;
            if report.total_new() > 0 || report.failed_sources() > 0 {
                tracing::info!(
                    target: "monitor",
                    new = report.total_new(),
                    accepted = report.total_accepted(),
                    failed_sources = report.failed_sources(),
                    "monitor tick"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!(target: "monitor", "monitor loop exited");
    }
}
