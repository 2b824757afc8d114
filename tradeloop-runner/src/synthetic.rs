//! Synthetic M1 candles for replay without market data.
//!
//! A seeded random walk with mild volatility clustering. The seed comes from
//! the symbol name, so the same symbol always produces the same series.
//! Weekends are skipped the way a forex feed skips them.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tradeloop_core::domain::Candle;

/// Parameters of the walk.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub start: DateTime<Utc>,
    pub start_price: f64,
    /// Typical one-minute move in price units.
    pub step: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 22, 0, 0).single().unwrap_or_default(),
            start_price: 1.10000,
            step: 0.00012,
        }
    }
}

fn rng_for(symbol: &str) -> StdRng {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    StdRng::from_seed(seed)
}

fn is_weekend(time: DateTime<Utc>) -> bool {
    matches!(time.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Generate `count` M1 candles for `symbol`.
pub fn generate_m1(symbol: &str, count: usize, spec: &SyntheticSpec) -> Vec<Candle> {
    let mut rng = rng_for(symbol);
    let mut candles = Vec::with_capacity(count);
    let mut time = spec.start;
    let mut price = spec.start_price;
    let mut vol = 1.0_f64;

    while candles.len() < count {
        if is_weekend(time) {
            time += Duration::minutes(1);
            continue;
        }

        // volatility regime drifts slowly between calm and active
        vol = (vol + rng.gen_range(-0.05..0.05)).clamp(0.3, 3.0);
        let scale = spec.step * vol;
        let open = price;
        let close = (open + rng.gen_range(-1.0..1.0) * scale).max(spec.step);
        let high = open.max(close) + rng.gen_range(0.0..0.6) * scale;
        let low = (open.min(close) - rng.gen_range(0.0..0.6) * scale).max(spec.step * 0.5);

        candles.push(Candle {
            open_time: time,
            open,
            high,
            low,
            close,
            tick_volume: rng.gen_range(20..400u64),
        });
        price = close;
        time += Duration::minutes(1);
    }
    candles
}
