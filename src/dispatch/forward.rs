//! Fire-and-forget forwarding of accepted signals to another relay's `/signal`.
//!
//! Delivery happens on a detached task: the handler acknowledges immediately
//! and failures are only logged. No retries.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::{json, Value};

use super::SignalHandler;
use crate::error::DownstreamDeliveryError;
use crate::signal::ClassifiedSignal;

#[derive(Clone)]
pub struct Forwarder {
    url: String,
    client: Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            timeout: Duration::from_millis(timeout_ms.max(1)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One delivery attempt. Exposed so callers that want to await it can.
    pub async fn deliver(&self, signal: &ClassifiedSignal) -> Result<(), DownstreamDeliveryError> {
        let rsp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(signal)
            .send()
            .await
            .map_err(|e| DownstreamDeliveryError::Request {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        let status = rsp.status();
        if !status.is_success() {
            return Err(DownstreamDeliveryError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SignalHandler for Forwarder {
    fn name(&self) -> &str {
        "forward"
    }

    async fn handle(&self, signal: &ClassifiedSignal) -> Result<Value> {
        let this = self.clone();
        let signal = signal.clone();
        tokio::spawn(async move {
            match this.deliver(&signal).await {
                Ok(()) => tracing::info!(
                    target: "dispatch",
                    url = %this.url,
                    signal = %signal.summary(),
                    "signal forwarded downstream"
                ),
                Err(e) => tracing::error!(target: "dispatch", error = %e, "downstream delivery failed"),
            }
        });
        Ok(json!({ "queued": true, "url": self.url }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Action;
    use chrono::Utc;

    fn sig() -> ClassifiedSignal {
        ClassifiedSignal {
            action: Action::Buy,
            symbol: Some("BTC".into()),
            price: None,
            confidence: 0.5,
            author: "a".into(),
            source_id: "s".into(),
            raw_text: "BTC long".into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn handle_acknowledges_even_when_downstream_is_down() {
        let f = Forwarder::new("http://127.0.0.1:9/signal", 200);
        let v = f.handle(&sig()).await.unwrap();
        assert_eq!(v["queued"], true);
    }

    #[tokio::test]
    async fn deliver_reports_request_errors() {
        let f = Forwarder::new("http://127.0.0.1:9/signal", 200);
        let err = f.deliver(&sig()).await.unwrap_err();
        assert!(matches!(err, DownstreamDeliveryError::Request { .. }));
    }
}
