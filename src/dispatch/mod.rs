// src/dispatch/mod.rs
//! Consumer registry and fan-out.
//!
//! Every accepted signal is written to history first and then handed to every
//! registered handler in registration order. A failing handler only affects
//! its own outcome entry; the outcome list always has one entry per handler.

pub mod forward;
pub mod handlers;
pub mod webhook;

use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::context::PipelineContext;
use crate::error::{HandlerError, ValidationError};
use crate::history::SignalHistory;
use crate::signal::{validate_signal, ClassifiedSignal};
use crate::stats::StatsAggregator;

pub use crate::dispatch::forward::Forwarder;
pub use crate::dispatch::handlers::{handler_fn, FnHandler, LogHandler};
pub use crate::dispatch::webhook::WebhookHandler;

/// A consumer of accepted signals.
#[async_trait::async_trait]
pub trait SignalHandler: Send + Sync {
    /// Identifier reported in outcomes (`handler` field).
    fn name(&self) -> &str;

    async fn handle(&self, signal: &ClassifiedSignal) -> Result<Value>;
}

/// Per-handler result of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerOutcome {
    #[serde(rename = "handler")]
    pub handler_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HandlerOutcome {
    fn ok(handler_id: &str, result: Value) -> Self {
        Self {
            handler_id: handler_id.to_string(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    fn failed(err: HandlerError) -> Self {
        Self {
            handler_id: err.handler,
            success: false,
            result: None,
            error: Some(err.message),
        }
    }
}

pub struct SignalDispatcher {
    handlers: RwLock<Vec<Arc<dyn SignalHandler>>>,
    history: Arc<SignalHistory>,
    stats: Arc<StatsAggregator>,
}

impl std::fmt::Debug for SignalDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalDispatcher")
            .field("handlers", &self.handler_names())
            .field("history_size", &self.history.size())
            .finish()
    }
}

impl SignalDispatcher {
    pub fn new(ctx: &PipelineContext) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            history: Arc::clone(&ctx.history),
            stats: Arc::clone(&ctx.stats),
        }
    }

    pub fn register_handler(&self, handler: Arc<dyn SignalHandler>) {
        tracing::info!(target: "dispatch", handler = handler.name(), "signal handler registered");
        self.handlers
            .write()
            .expect("handler registry poisoned")
            .push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().expect("handler registry poisoned").len()
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.handlers
            .read()
            .expect("handler registry poisoned")
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    pub fn history(&self) -> &Arc<SignalHistory> {
        &self.history
    }

    /// Validate an inbound JSON body, then dispatch it.
    pub async fn dispatch_json(
        &self,
        body: &Value,
    ) -> Result<(ClassifiedSignal, Vec<HandlerOutcome>), ValidationError> {
        let signal = validate_signal(body, Utc::now())?;
        let outcomes = self.dispatch(&signal).await;
        Ok((signal, outcomes))
    }

    /// Record the signal in history, then run every handler in order.
    pub async fn dispatch(&self, signal: &ClassifiedSignal) -> Vec<HandlerOutcome> {
        self.history.add(signal.clone());

        // Snapshot so registration never waits on a slow handler.
        let handlers: Vec<Arc<dyn SignalHandler>> = self
            .handlers
            .read()
            .expect("handler registry poisoned")
            .clone();

        let mut outcomes = Vec::with_capacity(handlers.len());
        let mut failures = 0usize;
        for h in handlers {
            match h.handle(signal).await {
                Ok(v) => outcomes.push(HandlerOutcome::ok(h.name(), v)),
                Err(e) => {
                    failures += 1;
                    let err = HandlerError {
                        handler: h.name().to_string(),
                        message: format!("{e:#}"),
                    };
                    tracing::error!(target: "dispatch", error = %err, "signal handler failed");
                    outcomes.push(HandlerOutcome::failed(err));
                }
            }
        }
        self.stats.record_handler_errors(failures);

        tracing::debug!(
            target: "dispatch",
            signal = %signal.summary(),
            handlers = outcomes.len(),
            failures,
            "signal dispatched"
        );
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::signal::Action;
    use serde_json::json;

    fn sig() -> ClassifiedSignal {
        ClassifiedSignal {
            action: Action::Buy,
            symbol: Some("BTC".into()),
            price: Some(45000.0),
            confidence: 0.64,
            author: "trader1".into(),
            source_id: "spot".into(),
            raw_text: "BTC 买入信号，价格：45000".into(),
            timestamp: Utc::now(),
        }
    }

    fn dispatcher() -> SignalDispatcher {
        SignalDispatcher::new(&PipelineContext::new(AppConfig::default()))
    }

    #[tokio::test]
    async fn partial_failure_is_isolated() {
        let d = dispatcher();
        d.register_handler(handler_fn("first", |_| Ok(json!({"n": 1}))));
        d.register_handler(handler_fn("boom", |_| anyhow::bail!("downstream exploded")));
        d.register_handler(handler_fn("third", |_| Ok(json!({"n": 3}))));

        let out = d.dispatch(&sig()).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out.iter().filter(|o| !o.success).count(), 1);
        assert_eq!(out[1].handler_id, "boom");
        assert!(out[1].error.as_deref().unwrap().contains("downstream exploded"));
        assert_eq!(out[2].result, Some(json!({"n": 3})));
        assert_eq!(d.history().size(), 1);
    }

    #[tokio::test]
    async fn history_is_written_even_if_every_handler_fails() {
        let d = dispatcher();
        d.register_handler(handler_fn("a", |_| anyhow::bail!("no")));
        d.register_handler(handler_fn("b", |_| anyhow::bail!("nope")));
        let s = sig();
        let out = d.dispatch(&s).await;
        assert!(out.iter().all(|o| !o.success));
        assert_eq!(d.history().recent(1)[0].signal, s);
    }

    #[tokio::test]
    async fn no_handlers_still_records() {
        let d = dispatcher();
        let out = d.dispatch(&sig()).await;
        assert!(out.is_empty());
        assert_eq!(d.history().size(), 1);
    }

    #[tokio::test]
    async fn invalid_json_never_reaches_handlers_or_history() {
        let d = dispatcher();
        d.register_handler(handler_fn("never", |_| panic!("must not run")));
        let err = d.dispatch_json(&json!({"action": "HOLD"})).await.unwrap_err();
        assert!(err.details[0].contains("HOLD"));
        assert_eq!(d.history().size(), 0);
    }

    #[test]
    fn outcome_wire_shape() {
        let ok = serde_json::to_value(HandlerOutcome::ok("log", json!({"processed": true}))).unwrap();
        assert_eq!(ok["handler"], "log");
        assert_eq!(ok["success"], true);
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(HandlerOutcome::failed(HandlerError {
            handler: "hook".into(),
            message: "timeout".into(),
        }))
        .unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "timeout");
        assert!(failed.get("result").is_none());
    }
}
