// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod classify;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod signal;
pub mod stats;

use std::sync::Arc;

use axum::Router;

pub use crate::api::router;
pub use crate::classify::{PatternClassifier, SignalClassifier};
pub use crate::config::AppConfig;
pub use crate::context::PipelineContext;
pub use crate::dispatch::{HandlerOutcome, SignalDispatcher, SignalHandler};
pub use crate::history::SignalHistory;
pub use crate::ingest::{MessageSource, MonitorScheduler};
pub use crate::signal::{Action, ClassifiedSignal, RawMessage};
pub use crate::stats::StatsAggregator;

use crate::dispatch::{Forwarder, LogHandler, WebhookHandler};
use crate::ingest::providers::{build_source, DemoSource};

/// Fully wired pipeline: shared context, dispatcher with the configured
/// handlers, and a scheduler with the configured sources (not yet started).
pub struct Relay {
    pub ctx: PipelineContext,
    pub dispatcher: Arc<SignalDispatcher>,
    pub scheduler: Arc<MonitorScheduler>,
}

impl Relay {
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let ctx = PipelineContext::new(config);
        let cfg = Arc::clone(&ctx.config);

        let dispatcher = Arc::new(SignalDispatcher::new(&ctx));
        dispatcher.register_handler(Arc::new(LogHandler));
        if let Some(hook) = cfg.notify.discord_webhook.as_ref() {
            dispatcher.register_handler(Arc::new(WebhookHandler::new(hook.clone())));
        }
        if let Some(url) = cfg.forward.url.as_ref() {
            let forwarder = Forwarder::new(url.clone(), cfg.forward.timeout_ms);
            tracing::info!(url = forwarder.url(), "forwarding accepted signals");
            dispatcher.register_handler(Arc::new(forwarder));
        }

        let classifier: Arc<dyn SignalClassifier> =
            Arc::new(PatternClassifier::new(cfg.parser.min_confidence));
        let scheduler = Arc::new(MonitorScheduler::new(&ctx, Arc::clone(&dispatcher), classifier));

        for sc in &cfg.monitor.sources {
            scheduler.register_source(sc.id.clone(), build_source(sc)?);
        }
        if cfg.monitor.sources.is_empty() && cfg.monitor.demo {
            scheduler.register_source("demo", Arc::new(DemoSource::new()));
        }

        Ok(Self {
            ctx,
            dispatcher,
            scheduler,
        })
    }

    /// HTTP router bound to this pipeline (without `/metrics`).
    pub fn router(&self) -> Router {
        api::router(api::AppState::new(
            &self.ctx,
            Arc::clone(&self.dispatcher),
            Some(Arc::clone(&self.scheduler)),
        ))
    }
}
