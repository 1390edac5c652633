//! Chat signal relay: binary entrypoint.
//! Loads config, wires the pipeline, starts the monitor and serves HTTP.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chat_signal_relay::config::{AppConfig, LogFormat};
use chat_signal_relay::metrics::Metrics;
use chat_signal_relay::Relay;

/// `RUST_LOG` wins; otherwise the configured level applies to this crate and
/// `warn` to dependencies.
fn init_tracing(cfg: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,chat_signal_relay={lvl},monitor={lvl},dispatch={lvl},classify={lvl},api={lvl}",
            lvl = cfg.logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match cfg.logging.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config);

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %e, "prometheus recorder unavailable, /metrics disabled");
            None
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let relay = Relay::from_config(config).context("building pipeline")?;

    tracing::info!(
        handlers = ?relay.dispatcher.handler_names(),
        sources = ?relay.scheduler.source_ids(),
        allow_list = relay.ctx.config.monitor.allow_list.len(),
        "relay configured"
    );
    if relay.scheduler.source_ids().is_empty() {
        tracing::warn!("no message sources configured; only POST /signal will produce signals");
    }

    let mut app = relay.router();
    if let Some(m) = &metrics {
        app = app.merge(m.router());
    }

    let monitor = relay.scheduler.start();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    relay.scheduler.stop();
    if let Some(handle) = monitor {
        let _ = handle.await;
    }
    tracing::info!("relay stopped");
    Ok(())
}
