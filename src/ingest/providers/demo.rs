use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::SourceFetchError;
use crate::ingest::types::MessageSource;
use crate::signal::RawMessage;

pub const DEMO_AUTHOR: &str = "demo_trader";

/// Sample chatter for demo mode, including one non-signal line.
pub const DEMO_MESSAGES: [&str; 8] = [
    "BTC 买入信号，价格：45000，止损：44000",
    "ETH做空，目标价格2800，SL：2900",
    "建议DOGE多单，入场价0.08附近",
    "SOL看涨，建议45美元附近建仓",
    "MATIC突破，建议1.2做多",
    "今天天气不错",
    "ADA有望上涨到0.5",
    "BNB止盈300",
];

/// Simulated group: every fetch appends the next sample line and returns
/// the whole conversation so far.
#[derive(Debug, Default)]
pub struct DemoSource {
    log: Mutex<Vec<RawMessage>>,
}

impl DemoSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageSource for DemoSource {
    async fn fetch_messages(&self, source_id: &str) -> Result<Vec<RawMessage>, SourceFetchError> {
        let mut log = self.log.lock().expect("demo log mutex poisoned");
        let next = DEMO_MESSAGES[log.len() % DEMO_MESSAGES.len()];
        log.push(RawMessage::new(source_id, DEMO_AUTHOR, next, Utc::now()));
        Ok(log.clone())
    }

    fn kind(&self) -> &'static str {
        "demo"
    }
}
