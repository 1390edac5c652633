//! Declarative pattern registry for the signal classifier.
//!
//! Every table is ordered and first-match-wins. Buy intent is tested before
//! sell intent, so a message matching both resolves to BUY. Each pattern
//! carries a stable name so tests and debug output can point at the rule
//! that fired.

use once_cell::sync::Lazy;
use regex::Regex;

/// A compiled pattern with a stable name.
#[derive(Debug)]
pub struct NamedPattern {
    pub name: &'static str,
    pub regex: Regex,
}

impl NamedPattern {
    fn new(name: &'static str, pattern: &str) -> Self {
        let regex = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("classifier pattern `{name}` does not compile: {e}"));
        Self { name, regex }
    }

    /// First capture group of the first match, if any.
    pub fn capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

/// Assets recognised without any pair suffix or `$` prefix.
pub const KNOWN_ASSETS: &[&str] = &[
    "BTC", "ETH", "BNB", "ADA", "SOL", "DOGE", "XRP", "DOT", "LINK", "UNI", "AVAX", "MATIC",
    "ATOM", "FTM", "NEAR", "ALGO", "VET", "THETA", "FIL", "EOS", "TRX", "XLM", "IOTA", "NEO",
    "DASH", "ZEC", "XMR", "LTC",
];

/// Cheap gate: at least one of these must occur (case-insensitive substring)
/// before any pattern matching runs.
pub const TRADE_GATE_KEYWORDS: &[&str] = &[
    "买", "卖", "做多", "做空", "long", "short", "开仓", "平仓", "止损", "止盈", "入场", "出场",
    "价格", "目标", "BTC", "ETH", "USDT", "涨", "跌", "看多", "看空", "建议", "推荐",
];

/// Keywords whose occurrences feed the confidence bonus. Occurrences are
/// summed per keyword, not de-duplicated.
pub const CONFIDENCE_KEYWORDS: &[&str] = &[
    "买入", "卖出", "做多", "做空", "开仓", "平仓", "止损", "止盈", "目标", "价格", "建议", "推荐",
    "long", "short", "buy", "sell",
];

/// All ordered tables used by the classifier.
#[derive(Debug)]
pub struct PatternRegistry {
    pub buy: Vec<NamedPattern>,
    pub sell: Vec<NamedPattern>,
    pub symbol: Vec<NamedPattern>,
    pub price: Vec<NamedPattern>,
    pub gate_keywords: Vec<String>,
    pub keyword_counters: Vec<Regex>,
}

impl PatternRegistry {
    pub fn builtin() -> Self {
        let buy = vec![
            NamedPattern::new("buy_explicit", r"(?i)买入|买进|做多|long|开多|建仓"),
            NamedPattern::new("buy_entry", r"(?i)入场|进场|买|多单"),
            NamedPattern::new("buy_bullish", r"(?i)看涨|上涨|涨|bullish"),
        ];
        let sell = vec![
            NamedPattern::new("sell_explicit", r"(?i)卖出|卖掉|做空|short|开空|平仓"),
            NamedPattern::new("sell_exit", r"(?i)出场|离场|卖|空单"),
            NamedPattern::new("sell_bearish", r"(?i)看跌|下跌|跌|bearish"),
        ];

        let known = KNOWN_ASSETS.join("|");
        let symbol = vec![
            NamedPattern::new("pair_suffix", r"(?i)([A-Z]{2,10})\s*(?:/USDT|/USD|USDT|USD)"),
            NamedPattern::new("cashtag", r"(?i)\$([A-Z]{2,10})"),
            NamedPattern::new("known_asset", &format!("(?i)({known})")),
            NamedPattern::new("stock_code", r"(?:^|[^A-Za-z0-9])([A-Z]{2,6}[0-9]{4})(?:$|[^A-Za-z0-9])"),
            NamedPattern::new("upper_token", r"(?:^|[^A-Za-z0-9])([A-Z]{2,10})(?:$|[^A-Za-z0-9])"),
        ];

        let price = vec![
            NamedPattern::new("amount_with_unit", r"(?i)([0-9]+\.?[0-9]*)\s*(?:元|USDT|USD|美元|刀)"),
            NamedPattern::new("price_label", r"价格[：:]\s*([0-9]+\.?[0-9]*)"),
            NamedPattern::new("target_label", r"目标[：:]\s*([0-9]+\.?[0-9]*)"),
            NamedPattern::new("near_level", r"([0-9]+\.?[0-9]*)\s*附近"),
        ];

        let gate_keywords = TRADE_GATE_KEYWORDS
            .iter()
            .map(|k| k.to_lowercase())
            .collect();

        let keyword_counters = CONFIDENCE_KEYWORDS
            .iter()
            .map(|k| {
                Regex::new(&format!("(?i){}", regex::escape(k)))
                    .unwrap_or_else(|e| panic!("keyword `{k}` does not compile: {e}"))
            })
            .collect();

        Self {
            buy,
            sell,
            symbol,
            price,
            gate_keywords,
            keyword_counters,
        }
    }

    /// True if the text contains at least one trade gate keyword.
    pub fn is_trade_related(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.gate_keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Total keyword occurrences across the confidence keyword list.
    pub fn count_keywords(&self, text: &str) -> usize {
        self.keyword_counters
            .iter()
            .map(|re| re.find_iter(text).count())
            .sum()
    }
}

/// Process-wide registry; patterns are fixed so one compiled copy is enough.
pub static BUILTIN: Lazy<PatternRegistry> = Lazy::new(PatternRegistry::builtin);

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match<'a>(table: &'a [NamedPattern], text: &str) -> Option<&'a str> {
        table.iter().find(|p| p.regex.is_match(text)).map(|p| p.name)
    }

    #[test]
    fn every_table_is_non_empty_and_named_uniquely() {
        let r = &*BUILTIN;
        let mut names: Vec<&str> = r
            .buy
            .iter()
            .chain(&r.sell)
            .chain(&r.symbol)
            .chain(&r.price)
            .map(|p| p.name)
            .collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(!r.buy.is_empty() && !r.sell.is_empty());
    }

    #[test]
    fn buy_tables_cover_both_languages() {
        let r = &*BUILTIN;
        assert_eq!(first_match(&r.buy, "准备做多"), Some("buy_explicit"));
        assert_eq!(first_match(&r.buy, "Going LONG here"), Some("buy_explicit"));
        assert_eq!(first_match(&r.buy, "建议DOGE多单"), Some("buy_entry"));
        assert_eq!(first_match(&r.buy, "very bullish"), Some("buy_bullish"));
        assert_eq!(first_match(&r.buy, "ETH做空"), None);
    }

    #[test]
    fn sell_tables_cover_both_languages() {
        let r = &*BUILTIN;
        assert_eq!(first_match(&r.sell, "ETH做空"), Some("sell_explicit"));
        assert_eq!(first_match(&r.sell, "short it"), Some("sell_explicit"));
        assert_eq!(first_match(&r.sell, "先离场观望"), Some("sell_exit"));
        assert_eq!(first_match(&r.sell, "turning bearish"), Some("sell_bearish"));
    }

    #[test]
    fn symbol_captures() {
        let r = &*BUILTIN;
        assert_eq!(r.symbol[0].capture("pepe/USDT 冲"), Some("pepe"));
        assert_eq!(r.symbol[1].capture("看好 $wif"), Some("wif"));
        assert_eq!(r.symbol[2].capture("ETH做空"), Some("ETH"));
        assert_eq!(r.symbol[4].capture("ORDI 突破"), Some("ORDI"));
        assert_eq!(r.symbol[4].capture("ordi 突破"), None);
    }

    #[test]
    fn price_captures() {
        let r = &*BUILTIN;
        assert_eq!(r.price[0].capture("SOL 45美元附近"), Some("45"));
        assert_eq!(r.price[1].capture("价格：45000"), Some("45000"));
        assert_eq!(r.price[2].capture("目标:2800.5"), Some("2800.5"));
        assert_eq!(r.price[3].capture("入场价0.08附近"), Some("0.08"));
    }

    #[test]
    fn fullwidth_digits_are_not_prices() {
        let r = &*BUILTIN;
        assert_eq!(first_match(&r.price, "价格：４５０００"), None);
        assert_eq!(first_match(&r.price, "价格：４５０００，45000附近"), Some("near_level"));
        assert_eq!(r.symbol[3].capture("SZ０００１ 买入"), None);
    }

    #[test]
    fn gate_and_keyword_count() {
        let r = &*BUILTIN;
        assert!(r.is_trade_related("btc looks good"));
        assert!(!r.is_trade_related("今天天气不错"));
        // 买入 + 价格, plus "buy" twice (case-insensitive, not de-duplicated)
        assert_eq!(r.count_keywords("买入 价格 BUY buy"), 4);
    }
}
