use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use super::WireMessage;
use crate::error::SourceFetchError;
use crate::ingest::types::MessageSource;
use crate::signal::RawMessage;

/// Tails a JSON-lines file that some exporter appends chat messages to.
pub struct JsonlFileSource {
    path: PathBuf,
}

impl JsonlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Only newline-terminated lines count. A trailing fragment is still being
    /// written and is picked up on a later fetch once it is complete.
    fn parse(source_id: &str, body: &str) -> Vec<RawMessage> {
        let now = Utc::now();
        let complete = match body.rfind('\n') {
            Some(end) => &body[..=end],
            None => "",
        };
        let mut out = Vec::new();
        for (lineno, line) in complete.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<WireMessage>(line) {
                Ok(w) => out.push(w.into_raw(source_id, now)),
                Err(e) => {
                    tracing::warn!(
                        target: "monitor",
                        source = source_id,
                        line = lineno + 1,
                        error = %e,
                        "skipping unparseable message line"
                    );
                    // keep a blank slot so the cursor stays aligned with the file;
                    // normalization filters it out downstream
                    out.push(RawMessage::new(source_id, "", "", now));
                }
            }
        }
        out
    }
}

#[async_trait]
impl MessageSource for JsonlFileSource {
    async fn fetch_messages(&self, source_id: &str) -> Result<Vec<RawMessage>, SourceFetchError> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceFetchError::unavailable(source_id, format!("{}: {e}", self.path.display())))?;
        Ok(Self::parse(source_id, &body))
    }

    fn kind(&self) -> &'static str {
        "jsonl"
    }
}
