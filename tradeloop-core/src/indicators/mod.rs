//! Concrete indicator implementations.
//!
//! Every indicator implements the `Indicator` trait from `components::indicator`.
//! Multi-output indicators (ADX/DI, Donchian, Heiken-Ashi, UT-Bot) are exposed as
//! separate named instances per output line, keeping the single-series trait
//! unchanged. Sequential transforms (Heiken-Ashi, UT-Bot) are single folds over
//! the candle slice.

pub mod adx;
pub mod atr;
pub mod doji;
pub mod donchian;
pub mod ema;
pub mod heiken_ashi;
pub mod rsi;
pub mod sma;
pub mod ut_bot;

pub use adx::{Adx, AdxLine};
pub use atr::Atr;
pub use doji::is_doji;
pub use donchian::{Donchian, DonchianBand};
pub use ema::Ema;
pub use heiken_ashi::{HaChannel, HaLine, HeikenAshi};
pub use rsi::Rsi;
pub use sma::{PriceSource, Sma};
pub use ut_bot::{UtBot, UtBotLine};

/// Create synthetic candles from close prices for testing.
///
/// Generates plausible OHLCV: open = prev_close (or close for the first candle),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, tick volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<crate::domain::Candle> {
    let ohlc: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, open.max(close) + 1.0, open.min(close) - 1.0, close)
        })
        .collect();
    make_ohlc_candles(&ohlc)
}

/// Create M1 candles from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| crate::domain::Candle {
            open_time: base + chrono::Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            tick_volume: 1000,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
