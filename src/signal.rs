//! signal.rs: core data model: raw chat messages, trade actions and the
//! classified signals that flow through history and dispatch.
//!
//! Wire shape is camelCase (`sourceId`, `rawText`, `observedAt`) so that
//! externally produced signals can be posted to `/signal` unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Trade intent extracted from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Unknown,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Buy, Action::Sell, Action::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Unknown => "UNKNOWN",
        }
    }

    /// Strict parse: only the exact upper-case wire names are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message as produced by a `MessageSource`. Lives for a single pipeline pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub content: String,
    pub author: String,
    pub source_id: String,
    pub observed_at: DateTime<Utc>,
}

impl RawMessage {
    pub fn new(
        source_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content: content.into(),
            author: author.into(),
            source_id: source_id.into(),
            observed_at,
        }
    }
}

/// Structured signal. Built by the classifier (or validated from an inbound
/// HTTP body) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedSignal {
    pub action: Action,
    pub symbol: Option<String>,
    pub price: Option<f64>,
    /// Heuristic confidence in `[0.0, 1.0]`.
    pub confidence: f32,
    pub author: String,
    pub source_id: String,
    pub raw_text: String,
    pub timestamp: DateTime<Utc>,
}

impl ClassifiedSignal {
    /// "BUY BTC @ 45000" style one-liner used by logs and handlers.
    pub fn summary(&self) -> String {
        let price = self
            .price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        format!(
            "{} {} @ {}",
            self.action,
            self.symbol.as_deref().unwrap_or("UNKNOWN"),
            price
        )
    }
}

pub const DEFAULT_HTTP_SOURCE_ID: &str = "http";
pub const DEFAULT_AUTHOR: &str = "unknown";

/// Validate an inbound JSON body and turn it into a signal.
///
/// Every problem found is reported in `details`; the body is rejected if
/// there is at least one.
pub fn validate_signal(body: &Value, received_at: DateTime<Utc>) -> Result<ClassifiedSignal, ValidationError> {
    let Some(obj) = body.as_object() else {
        return Err(ValidationError::single("Signal is required"));
    };

    let mut errors = Vec::new();

    let action = match obj.get("action") {
        Some(Value::String(s)) => match Action::parse(s) {
            Some(a) => Some(a),
            None => {
                errors.push(format!(
                    "Invalid action \"{s}\": valid action is required (BUY, SELL, UNKNOWN)"
                ));
                None
            }
        },
        Some(Value::Null) | None => {
            errors.push("Valid action is required (BUY, SELL, UNKNOWN)".to_string());
            None
        }
        Some(other) => {
            errors.push(format!(
                "Invalid action {other}: valid action is required (BUY, SELL, UNKNOWN)"
            ));
            None
        }
    };

    let symbol = match obj.get("symbol") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(_) => {
            errors.push("symbol must be a string or null".to_string());
            None
        }
    };

    let price = match obj.get("price") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(_) => {
            errors.push("price must be a number or null".to_string());
            None
        }
    };

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(c) if (0.0..=1.0).contains(&c) => c as f32,
            _ => {
                errors.push(format!("confidence must be within [0, 1], got {n}"));
                0.0
            }
        },
        Some(_) => {
            errors.push("confidence must be a number".to_string());
            0.0
        }
    };

    let timestamp = match obj.get("timestamp") {
        None | Some(Value::Null) => received_at,
        Some(v) => match parse_timestamp(v) {
            Some(ts) => ts,
            None => {
                errors.push("timestamp must be an RFC 3339 string or epoch milliseconds".to_string());
                received_at
            }
        },
    };

    let author = string_field(obj.get("author"), DEFAULT_AUTHOR);
    let source_id = string_field(obj.get("sourceId"), DEFAULT_HTTP_SOURCE_ID);
    let raw_text = string_field(obj.get("rawText"), "");

    match action {
        Some(action) if errors.is_empty() => Ok(ClassifiedSignal {
            action,
            symbol,
            price,
            confidence,
            author,
            source_id,
            raw_text,
            timestamp,
        }),
        _ => Err(ValidationError::new(errors)),
    }
}

/// RFC 3339 string or epoch milliseconds (the form chat clients usually emit).
pub fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn string_field(v: Option<&Value>, default: &str) -> String {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn action_serializes_upper_case() {
        assert_eq!(serde_json::to_value(Action::Buy).unwrap(), json!("BUY"));
        assert_eq!(Action::parse("SELL"), Some(Action::Sell));
        assert_eq!(Action::parse("sell"), None);
        assert_eq!(Action::parse("HOLD"), None);
    }

    #[test]
    fn signal_wire_shape_is_camel_case() {
        let s = ClassifiedSignal {
            action: Action::Sell,
            symbol: Some("ETH".into()),
            price: None,
            confidence: 0.5,
            author: "eli".into(),
            source_id: "futures".into(),
            raw_text: "ETH做空".into(),
            timestamp: t0(),
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["action"], json!("SELL"));
        assert_eq!(v["sourceId"], json!("futures"));
        assert_eq!(v["rawText"], json!("ETH做空"));
        assert!(v["price"].is_null());
        assert_eq!(s.summary(), "SELL ETH @ N/A");
    }

    #[test]
    fn minimal_body_gets_defaults() {
        let s = validate_signal(&json!({"action": "SELL", "symbol": " eth "}), t0()).unwrap();
        assert_eq!(s.action, Action::Sell);
        assert_eq!(s.symbol.as_deref(), Some("eth"));
        assert_eq!(s.author, DEFAULT_AUTHOR);
        assert_eq!(s.source_id, DEFAULT_HTTP_SOURCE_ID);
        assert_eq!(s.timestamp, t0());
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn invalid_action_is_named_in_details() {
        let err = validate_signal(&json!({"action": "HOLD"}), t0()).unwrap_err();
        assert_eq!(err.details.len(), 1);
        assert!(err.details[0].contains("HOLD"), "{:?}", err.details);
    }

    #[test]
    fn missing_body_and_missing_action_are_rejected() {
        let err = validate_signal(&Value::Null, t0()).unwrap_err();
        assert_eq!(err.details, vec!["Signal is required".to_string()]);

        let err = validate_signal(&json!({"symbol": "BTC"}), t0()).unwrap_err();
        assert!(err.details[0].contains("action"));
    }

    #[test]
    fn all_field_problems_are_collected() {
        let err = validate_signal(
            &json!({"action": "BUY", "price": "cheap", "confidence": 3.0}),
            t0(),
        )
        .unwrap_err();
        assert_eq!(err.details.len(), 2, "{:?}", err.details);
    }

    #[test]
    fn epoch_millis_timestamp_is_accepted() {
        let s = validate_signal(
            &json!({"action": "BUY", "timestamp": 1_757_149_200_000i64}),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(s.timestamp, t0());
    }
}
