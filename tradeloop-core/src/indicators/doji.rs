//! Doji test: a candle whose body is small relative to its range.

use crate::domain::Candle;

/// True when `|close - open| <= threshold * (high - low)`.
///
/// A zero-range candle counts as a doji. Void candles are never dojis.
pub fn is_doji(candle: &Candle, threshold: f64) -> bool {
    if candle.is_void() {
        return false;
    }
    let range = candle.range();
    if range <= 0.0 {
        return true;
    }
    candle.body() <= threshold * range
}
