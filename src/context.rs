use std::sync::Arc;

use crate::config::AppConfig;
use crate::history::SignalHistory;
use crate::stats::StatsAggregator;

/// Shared state handed to the scheduler, dispatcher and HTTP layer at
/// construction. Nothing in the library reaches for process-global config.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub config: Arc<AppConfig>,
    pub history: Arc<SignalHistory>,
    pub stats: Arc<StatsAggregator>,
}

impl PipelineContext {
    pub fn new(config: AppConfig) -> Self {
        let history = SignalHistory::with_capacity(config.parser.max_history_size);
        Self {
            config: Arc::new(config),
            history: Arc::new(history),
            stats: Arc::new(StatsAggregator::new()),
        }
    }
}
