use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::SignalHandler;
use crate::classify::format_signal;
use crate::signal::ClassifiedSignal;

/// Posts each signal as a Discord-style embed. Retries with exponential
/// backoff; the last failure becomes this handler's failed outcome.
#[derive(Clone)]
pub struct WebhookHandler {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookHandler {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn post(&self, payload: &WebhookPayload) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("webhook request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::warn!(target: "dispatch", attempt, error = %err, "webhook attempt failed, retrying");
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[async_trait::async_trait]
impl SignalHandler for WebhookHandler {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn handle(&self, signal: &ClassifiedSignal) -> Result<Value> {
        let payload = WebhookPayload::for_signal(signal);
        self.post(&payload).await?;
        Ok(json!({ "delivered": true }))
    }
}

#[derive(Serialize)]
struct WebhookEmbed {
    title: String,
    description: String,
}

#[derive(Serialize)]
struct WebhookPayload {
    content: Option<String>,
    embeds: Vec<WebhookEmbed>,
}

impl WebhookPayload {
    fn for_signal(signal: &ClassifiedSignal) -> Self {
        Self {
            content: None,
            embeds: vec![WebhookEmbed {
                title: format!(
                    "Signal: {} {}",
                    signal.action,
                    signal.symbol.as_deref().unwrap_or("?")
                ),
                description: format_signal(signal),
            }],
        }
    }
}
