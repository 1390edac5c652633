// src/classify/mod.rs
//! Signal classification: free text -> action / symbol / price / confidence.
//!
//! `PatternClassifier::analyze` is the raw, unthresholded result (useful for
//! calibration and tests). `classify` and `parse_message` apply the acceptance
//! threshold and are what the pipeline uses. All of it is pure: same text in,
//! same result out.

pub mod patterns;
pub mod scoring;

use serde::Serialize;

use crate::error::ClassificationError;
use crate::signal::{Action, ClassifiedSignal, RawMessage};

pub use crate::classify::patterns::{PatternRegistry, BUILTIN};
pub use crate::classify::scoring::{confidence, ScoreInputs};

pub const DEFAULT_ACCEPTANCE_THRESHOLD: f32 = 0.3;
pub const MIN_TEXT_LEN: usize = 5;

/// Unthresholded classification of one text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub action: Action,
    pub symbol: Option<String>,
    pub price: Option<f64>,
    pub confidence: f32,
    pub keyword_hits: usize,
    /// Names of the patterns that fired, in table order (action, symbol, price).
    pub matched: Vec<&'static str>,
}

/// Seam between the scheduler and whatever decides what counts as a signal.
pub trait SignalClassifier: Send + Sync {
    /// `Ok(None)` means "not a signal" (gated out or below threshold).
    fn classify_message(&self, msg: &RawMessage) -> Result<Option<ClassifiedSignal>, ClassificationError>;
}

/// Regex-table classifier backed by the builtin `PatternRegistry`.
#[derive(Debug, Clone, Copy)]
pub struct PatternClassifier {
    threshold: f32,
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPTANCE_THRESHOLD)
    }
}

impl PatternClassifier {
    /// `threshold` is clamped to `[0,1]`.
    pub fn new(threshold: f32) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_ACCEPTANCE_THRESHOLD
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Gate + pattern tables + scoring, without the acceptance threshold.
    /// `None` when the text is too short or carries no trade keyword.
    pub fn analyze(&self, text: &str) -> Option<Analysis> {
        let reg = &*BUILTIN;
        let text_len = text.chars().count();
        if text_len < MIN_TEXT_LEN || !reg.is_trade_related(text) {
            return None;
        }

        let mut matched = Vec::new();

        let action = if let Some(p) = reg.buy.iter().find(|p| p.regex.is_match(text)) {
            matched.push(p.name);
            Action::Buy
        } else if let Some(p) = reg.sell.iter().find(|p| p.regex.is_match(text)) {
            matched.push(p.name);
            Action::Sell
        } else {
            Action::Unknown
        };

        let symbol = reg.symbol.iter().find_map(|p| {
            p.capture(text).map(|s| {
                matched.push(p.name);
                s.to_uppercase()
            })
        });

        let price = reg.price.iter().find_map(|p| {
            p.capture(text).and_then(|raw| {
                raw.parse::<f64>().ok().map(|v| {
                    matched.push(p.name);
                    v
                })
            })
        });

        let keyword_hits = reg.count_keywords(text);
        let confidence = confidence(&ScoreInputs {
            action: Some(action),
            has_symbol: symbol.is_some(),
            has_price: price.is_some(),
            keyword_hits,
            text_len,
        });

        Some(Analysis {
            action,
            symbol,
            price,
            confidence,
            keyword_hits,
            matched,
        })
    }

    /// Thresholded analysis of a bare text.
    pub fn classify(&self, text: &str) -> Option<Analysis> {
        self.analyze(text).filter(|a| a.confidence >= self.threshold)
    }

    /// Thresholded classification of a message into a full signal.
    pub fn parse_message(&self, msg: &RawMessage) -> Option<ClassifiedSignal> {
        let a = self.classify(&msg.content)?;
        Some(ClassifiedSignal {
            action: a.action,
            symbol: a.symbol,
            price: a.price,
            confidence: a.confidence,
            author: msg.author.clone(),
            source_id: msg.source_id.clone(),
            raw_text: msg.content.clone(),
            timestamp: msg.observed_at,
        })
    }
}

impl SignalClassifier for PatternClassifier {
    fn classify_message(&self, msg: &RawMessage) -> Result<Option<ClassifiedSignal>, ClassificationError> {
        let signal = self.parse_message(msg);
        if let Some(p) = signal.as_ref().and_then(|s| s.price) {
            if !p.is_finite() {
                return Err(ClassificationError::NonFinitePrice { raw: p.to_string() });
            }
        }
        if let Some(s) = &signal {
            tracing::debug!(
                target: "classify",
                action = %s.action,
                symbol = ?s.symbol,
                price = ?s.price,
                confidence = s.confidence,
                "signal classified"
            );
        }
        Ok(signal)
    }
}

/// Human-readable multi-line rendering of a signal (alerts, demo output).
pub fn format_signal(signal: &ClassifiedSignal) -> String {
    let preview: String = signal.raw_text.chars().take(100).collect();
    format!(
        "Trading signal\nAction: {}\nSymbol: {}\nPrice: {}\nConfidence: {:.1}%\nAuthor: {}\nTime: {}\nText: {}",
        signal.action,
        signal.symbol.as_deref().unwrap_or("unknown"),
        signal
            .price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unspecified".to_string()),
        signal.confidence * 100.0,
        signal.author,
        signal.timestamp.to_rfc3339(),
        preview
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn clf() -> PatternClassifier {
        PatternClassifier::default()
    }

    #[test]
    fn short_texts_are_rejected() {
        for t in ["", "买", "BTC", "做多!", "long"] {
            assert!(clf().analyze(t).is_none(), "{t}");
        }
    }

    #[test]
    fn texts_without_trade_keywords_are_rejected() {
        assert!(clf().classify("今天天气不错").is_none());
        assert!(clf().analyze("hello everyone, good morning").is_none());
    }

    #[test]
    fn reference_buy_message() {
        let a = clf().classify("BTC 买入信号，价格：45000").expect("signal");
        assert_eq!(a.action, Action::Buy);
        assert_eq!(a.symbol.as_deref(), Some("BTC"));
        assert_eq!(a.price, Some(45000.0));
        // 17 chars -> (0.3 + 0.2 + 0.2 + 2 * 0.05) * 0.8
        assert!((a.confidence - 0.64).abs() < 1e-4, "{}", a.confidence);
        assert_eq!(a.matched, vec!["buy_explicit", "known_asset", "price_label"]);
    }

    #[test]
    fn sell_without_price() {
        let a = clf().classify("ETH做空，目标价格2800").expect("signal");
        assert_eq!(a.action, Action::Sell);
        assert_eq!(a.symbol.as_deref(), Some("ETH"));
        assert_eq!(a.price, None);
    }

    #[test]
    fn buy_wins_over_sell() {
        let a = clf().analyze("BTC 先卖出再买入").unwrap();
        assert_eq!(a.action, Action::Buy);
    }

    #[test]
    fn unknown_action_can_still_pass() {
        // No buy/sell intent, but symbol + price + keywords.
        let a = clf().analyze("BTC 价格：45000 目标：47000 建议关注").unwrap();
        assert_eq!(a.action, Action::Unknown);
        assert!(a.confidence >= DEFAULT_ACCEPTANCE_THRESHOLD);
    }

    #[test]
    fn below_threshold_is_computable_but_not_accepted() {
        let a = clf().analyze("今天有点跌").unwrap();
        assert!(a.confidence < DEFAULT_ACCEPTANCE_THRESHOLD, "{}", a.confidence);
        assert!(clf().classify("今天有点跌").is_none());
        assert!(PatternClassifier::new(0.0).classify("今天有点跌").is_some());
    }

    #[test]
    fn classify_is_deterministic() {
        let t = "SOL看涨，建议45美元附近建仓";
        assert_eq!(clf().classify(t), clf().classify(t));
    }

    #[test]
    fn parse_message_carries_provenance() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        let msg = RawMessage::new("spot", "woods", "建议DOGE多单，入场价0.08附近", ts);
        let s = clf().parse_message(&msg).expect("signal");
        assert_eq!(s.author, "woods");
        assert_eq!(s.source_id, "spot");
        assert_eq!(s.timestamp, ts);
        assert_eq!(s.symbol.as_deref(), Some("DOGE"));
        assert_eq!(s.price, Some(0.08));
    }

    #[test]
    fn huge_price_is_a_classification_error() {
        let digits = "9".repeat(400);
        let msg = RawMessage::new("spot", "woods", format!("BTC 买入 价格：{digits}"), Utc::now());
        let err = clf().classify_message(&msg).unwrap_err();
        assert!(matches!(err, ClassificationError::NonFinitePrice { .. }));
    }
}
