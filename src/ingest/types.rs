// src/ingest/types.rs
use crate::error::SourceFetchError;
use crate::signal::RawMessage;

/// Something that can report the full, ordered (oldest first) message list of
/// a chat-like feed. The scheduler diffs successive results itself, so an
/// implementation only needs to return what it currently sees.
#[async_trait::async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_messages(&self, source_id: &str) -> Result<Vec<RawMessage>, SourceFetchError>;

    /// Short label for logs.
    fn kind(&self) -> &'static str;
}
