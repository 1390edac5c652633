use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;

use super::WireMessage;
use crate::error::SourceFetchError;
use crate::ingest::types::MessageSource;
use crate::signal::RawMessage;

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

/// Polls an endpoint that returns the whole message list as a JSON array.
pub struct HttpPollSource {
    url: String,
    client: Client,
    timeout_ms: u64,
}

impl HttpPollSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms.max(1);
        self
    }
}

#[async_trait]
impl MessageSource for HttpPollSource {
    async fn fetch_messages(&self, source_id: &str) -> Result<Vec<RawMessage>, SourceFetchError> {
        let rsp = self
            .client
            .get(&self.url)
            .timeout(Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceFetchError::Timeout {
                        source_id: source_id.to_string(),
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    SourceFetchError::unavailable(source_id, e)
                }
            })?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(SourceFetchError::unavailable(
                source_id,
                format!("HTTP {status} from {}", self.url),
            ));
        }

        let items: Vec<WireMessage> = rsp
            .json()
            .await
            .map_err(|e| SourceFetchError::decode(source_id, e))?;
        let now = Utc::now();
        Ok(items.into_iter().map(|w| w.into_raw(source_id, now)).collect())
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}
