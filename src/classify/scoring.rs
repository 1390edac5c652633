//! Confidence scoring for classified messages.
//!
//! Additive, then scaled:
//! - `+0.3` when the action is known
//! - `+0.2` when a symbol was extracted
//! - `+0.2` when a price was extracted
//! - `+min(keyword_hits * 0.05, 0.2)`
//! - `*0.8` when the text is shorter than 20 or longer than 500 chars
//!
//! Clamping to `[0,1]` happens once, after every adjustment.

use crate::signal::Action;

pub const ACTION_WEIGHT: f32 = 0.3;
pub const SYMBOL_WEIGHT: f32 = 0.2;
pub const PRICE_WEIGHT: f32 = 0.2;
pub const KEYWORD_STEP: f32 = 0.05;
pub const KEYWORD_CAP: f32 = 0.2;
pub const LENGTH_PENALTY: f32 = 0.8;
pub const MIN_COMFORT_LEN: usize = 20;
pub const MAX_COMFORT_LEN: usize = 500;

/// Everything the score depends on. Kept separate from the text so the
/// formula can be tested on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreInputs {
    pub action: Option<Action>,
    pub has_symbol: bool,
    pub has_price: bool,
    pub keyword_hits: usize,
    /// Length in chars.
    pub text_len: usize,
}

pub fn confidence(inputs: &ScoreInputs) -> f32 {
    let mut score = 0.0f32;

    if matches!(inputs.action, Some(a) if a != Action::Unknown) {
        score += ACTION_WEIGHT;
    }
    if inputs.has_symbol {
        score += SYMBOL_WEIGHT;
    }
    if inputs.has_price {
        score += PRICE_WEIGHT;
    }
    score += (inputs.keyword_hits as f32 * KEYWORD_STEP).min(KEYWORD_CAP);

    if inputs.text_len < MIN_COMFORT_LEN || inputs.text_len > MAX_COMFORT_LEN {
        score *= LENGTH_PENALTY;
    }

    score.clamp(0.0, 1.0)
}
