// tests/classifier_properties.rs
//
// Property-style checks over a hand-picked corpus of chat lines.

use chat_signal_relay::classify::{PatternClassifier, SignalClassifier};
use chat_signal_relay::signal::{Action, RawMessage};
use chrono::Utc;

const CORPUS: &[&str] = &[
    "BTC 买入信号，价格：45000",
    "BTC 买入信号，价格：45000，止损：44000",
    "ETH做空，目标价格2800，SL：2900",
    "建议DOGE多单，入场价0.08附近",
    "SOL看涨，建议45美元附近建仓",
    "MATIC突破，建议1.2做多",
    "今天天气不错",
    "ADA有望上涨到0.5",
    "BNB止盈300",
    "long long long long long long long long BTC ETH $PEPE 100 USDT 买入 做多 建议 推荐",
    "short",
    "买",
    "",
    "   ",
    "$SOL breakout, buy the dip near 120 USD, target: 160, stop 110",
];

#[test]
fn short_texts_are_never_signals() {
    let c = PatternClassifier::new(0.0);
    for t in ["", "买", "BTC", "long", "1234"] {
        assert!(t.chars().count() < 5);
        assert!(c.analyze(t).is_none(), "{t:?} should be rejected");
    }
}

#[test]
fn confidence_stays_in_unit_interval() {
    let c = PatternClassifier::new(0.0);
    for t in CORPUS {
        if let Some(a) = c.analyze(t) {
            assert!(
                (0.0..=1.0).contains(&a.confidence),
                "{t:?} scored {}",
                a.confidence
            );
        }
    }
}

#[test]
fn non_trade_chatter_is_rejected() {
    let c = PatternClassifier::default();
    assert!(c.classify("今天天气不错").is_none());
    assert!(c.classify("see you all tomorrow").is_none());
}

#[test]
fn reference_message_extracts_fields() {
    let a = PatternClassifier::default()
        .classify("BTC 买入信号，价格：45000")
        .expect("accepted");
    assert_eq!(a.action, Action::Buy);
    assert_eq!(a.symbol.as_deref(), Some("BTC"));
    assert_eq!(a.price, Some(45000.0));
    // 17 chars, so the short-text penalty applies: (0.3 + 0.2 + 0.2 + 0.1) * 0.8
    assert!((a.confidence - 0.64).abs() < 1e-4, "got {}", a.confidence);
}

#[test]
fn buy_wins_when_both_intents_match() {
    let a = PatternClassifier::new(0.0)
        .analyze("ETH 先买入 后卖出")
        .expect("trade related");
    assert_eq!(a.action, Action::Buy);
}

#[test]
fn classification_is_deterministic() {
    let c = PatternClassifier::default();
    for t in CORPUS {
        assert_eq!(c.analyze(t), c.analyze(t), "{t:?}");
    }
}

#[test]
fn raising_threshold_only_removes_results() {
    let lo = PatternClassifier::new(0.0);
    let hi = PatternClassifier::new(0.6);
    for t in CORPUS {
        if let Some(a) = hi.classify(t) {
            assert_eq!(Some(a), lo.classify(t));
        }
    }
}

#[test]
fn parse_message_carries_provenance() {
    let now = Utc::now();
    let msg = RawMessage::new("futures", "eli", "ETH做空，目标价格2800，SL：2900", now);
    let s = PatternClassifier::default()
        .classify_message(&msg)
        .expect("no classifier error")
        .expect("accepted");
    assert_eq!(s.action, Action::Sell);
    assert_eq!(s.symbol.as_deref(), Some("ETH"));
    assert_eq!(s.author, "eli");
    assert_eq!(s.source_id, "futures");
    assert_eq!(s.raw_text, msg.content);
    assert_eq!(s.timestamp, now);
}
