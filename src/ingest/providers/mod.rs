pub mod demo;
pub mod http_poll;
pub mod jsonl_file;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{SourceConfig, SourceKind};
use crate::ingest::types::MessageSource;
use crate::signal::{parse_timestamp, RawMessage, DEFAULT_AUTHOR};

pub use demo::DemoSource;
pub use http_poll::HttpPollSource;
pub use jsonl_file::JsonlFileSource;

/// Message shape shared by the file and HTTP sources.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireMessage {
    content: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    observed_at: Option<Value>,
}

impl WireMessage {
    pub(crate) fn into_raw(self, source_id: &str, fallback: DateTime<Utc>) -> RawMessage {
        let observed_at = self
            .observed_at
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or(fallback);
        let author = self
            .author
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());
        RawMessage::new(source_id, author, self.content, observed_at)
    }
}

/// Build a source from its config entry.
pub fn build_source(cfg: &SourceConfig) -> anyhow::Result<Arc<dyn MessageSource>> {
    let src: Arc<dyn MessageSource> = match cfg.kind {
        SourceKind::Jsonl => {
            let path = cfg
                .path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("source `{}`: jsonl needs `path`", cfg.id))?;
            Arc::new(JsonlFileSource::new(path))
        }
        SourceKind::Http => {
            let url = cfg
                .url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("source `{}`: http needs `url`", cfg.id))?;
            let mut s = HttpPollSource::new(url);
            if let Some(ms) = cfg.timeout_ms {
                s = s.with_timeout_ms(ms);
            }
            Arc::new(s)
        }
        SourceKind::Demo => Arc::new(DemoSource::new()),
    };
    Ok(src)
}
