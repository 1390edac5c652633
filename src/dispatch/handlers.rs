//! Small built-in handlers.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};

use super::SignalHandler;
use crate::signal::ClassifiedSignal;

/// Default consumer: logs the signal and acknowledges it.
#[derive(Debug, Clone, Default)]
pub struct LogHandler;

#[async_trait::async_trait]
impl SignalHandler for LogHandler {
    fn name(&self) -> &str {
        "log"
    }

    async fn handle(&self, signal: &ClassifiedSignal) -> Result<Value> {
        tracing::info!(
            target: "dispatch",
            action = %signal.action,
            symbol = signal.symbol.as_deref().unwrap_or("UNKNOWN"),
            author = %signal.author,
            source = %signal.source_id,
            confidence = signal.confidence,
            "signal received"
        );
        Ok(json!({
            "processed": true,
            "action": "logged",
            "timestamp": Utc::now().to_rfc3339(),
            "signal_summary": signal.summary(),
        }))
    }
}

/// Adapter turning a synchronous closure into a handler.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait::async_trait]
impl<F> SignalHandler for FnHandler<F>
where
    F: Fn(&ClassifiedSignal) -> Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, signal: &ClassifiedSignal) -> Result<Value> {
        (self.f)(signal)
    }
}

pub fn handler_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn SignalHandler>
where
    F: Fn(&ClassifiedSignal) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}
