//! Heiken-Ashi transform and the Heiken-Ashi channel.
//!
//! ha_close[i] = (open + high + low + close) / 4
//! ha_open[0]  = (open[0] + close[0]) / 2
//! ha_open[i]  = (ha_open[i-1] + ha_close[i-1]) / 2
//! ha_high[i]  = max(high, ha_open, ha_close)
//! ha_low[i]   = min(low, ha_open, ha_close)
//!
//! The transform is one sequential fold. The channel is an SMA of ha_high
//! (upper) and ha_low (lower).

use crate::components::indicator::Indicator;
use crate::domain::Candle;
use crate::indicators::sma::rolling_mean;

/// Transform raw candles into Heiken-Ashi candles (time and volume preserved).
pub fn heiken_ashi(candles: &[Candle]) -> Vec<Candle> {
    let mut out = Vec::with_capacity(candles.len());
    let mut prev: Option<(f64, f64)> = None;
    for c in candles {
        let ha_close = (c.open + c.high + c.low + c.close) / 4.0;
        let ha_open = match prev {
            None => (c.open + c.close) / 2.0,
            Some((p_open, p_close)) => (p_open + p_close) / 2.0,
        };
        out.push(Candle {
            open_time: c.open_time,
            open: ha_open,
            high: c.high.max(ha_open).max(ha_close),
            low: c.low.min(ha_open).min(ha_close),
            close: ha_close,
            tick_volume: c.tick_volume,
        });
        prev = Some((ha_open, ha_close));
    }
    out
}

/// Which Heiken-Ashi field to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaLine {
    Open,
    High,
    Low,
    Close,
}

#[derive(Debug, Clone)]
pub struct HeikenAshi {
    line: HaLine,
    name: &'static str,
}

impl HeikenAshi {
    pub fn open() -> Self {
        Self { line: HaLine::Open, name: "ha_open" }
    }

    pub fn high() -> Self {
        Self { line: HaLine::High, name: "ha_high" }
    }

    pub fn low() -> Self {
        Self { line: HaLine::Low, name: "ha_low" }
    }

    pub fn close() -> Self {
        Self { line: HaLine::Close, name: "ha_close" }
    }
}

impl Indicator for HeikenAshi {
    fn name(&self) -> &str {
        self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        heiken_ashi(candles)
            .iter()
            .map(|ha| match self.line {
                HaLine::Open => ha.open,
                HaLine::High => ha.high,
                HaLine::Low => ha.low,
                HaLine::Close => ha.close,
            })
            .collect()
    }
}

/// SMA of Heiken-Ashi highs (upper) or lows (lower).
#[derive(Debug, Clone)]
pub struct HaChannel {
    period: usize,
    upper: bool,
    name: String,
}

impl HaChannel {
    pub fn upper(period: usize) -> Self {
        assert!(period >= 1, "HA channel period must be >= 1");
        Self {
            period,
            upper: true,
            name: format!("ha_channel_upper_{period}"),
        }
    }

    pub fn lower(period: usize) -> Self {
        assert!(period >= 1, "HA channel period must be >= 1");
        Self {
            period,
            upper: false,
            name: format!("ha_channel_lower_{period}"),
        }
    }
}

impl Indicator for HaChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let source: Vec<f64> = heiken_ashi(candles)
            .iter()
            .map(|ha| if self.upper { ha.high } else { ha.low })
            .collect();
        rolling_mean(&source, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, make_ohlc_candles, DEFAULT_EPSILON};

    #[test]
    fn ha_first_candle() {
        let candles = make_ohlc_candles(&[(10.0, 14.0, 8.0, 12.0)]);
        let ha = heiken_ashi(&candles);
        assert_approx(ha[0].close, 11.0, DEFAULT_EPSILON);
        assert_approx(ha[0].open, 11.0, DEFAULT_EPSILON);
        assert_approx(ha[0].high, 14.0, DEFAULT_EPSILON);
        assert_approx(ha[0].low, 8.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ha_recursive_open() {
        let candles = make_ohlc_candles(&[(10.0, 14.0, 8.0, 12.0), (12.0, 13.0, 11.0, 12.5)]);
        let ha = heiken_ashi(&candles);
        // ha_open[1] = (11 + 11) / 2
        assert_approx(ha[1].open, 11.0, DEFAULT_EPSILON);
        assert_approx(ha[1].close, 12.125, DEFAULT_EPSILON);
        assert_approx(ha[1].high, 13.0, DEFAULT_EPSILON);
        assert_approx(ha[1].low, 11.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ha_deterministic_and_prefix_stable() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.3).cos() * 4.0).collect();
        let candles = make_candles(&closes);
        let a = heiken_ashi(&candles);
        let b = heiken_ashi(&candles);
        assert_eq!(a, b);
        let prefix = heiken_ashi(&candles[..30]);
        assert_eq!(&a[..30], &prefix[..]);
    }

    #[test]
    fn ha_line_indicators_match_transform() {
        let candles = make_candles(&[10.0, 11.0, 10.5, 12.0]);
        let ha = heiken_ashi(&candles);
        let closes = HeikenAshi::close().compute(&candles);
        for (v, c) in closes.iter().zip(&ha) {
            assert_approx(*v, c.close, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn ha_channel_is_sma_of_ha_extremes() {
        let candles = make_candles(&[10.0, 11.0, 10.5, 12.0, 12.5]);
        let ha = heiken_ashi(&candles);
        let upper = HaChannel::upper(2).compute(&candles);
        let lower = HaChannel::lower(2).compute(&candles);
        assert!(upper[0].is_nan());
        assert_approx(upper[4], (ha[3].high + ha[4].high) / 2.0, DEFAULT_EPSILON);
        assert_approx(lower[4], (ha[3].low + ha[4].low) / 2.0, DEFAULT_EPSILON);
        assert_eq!(HaChannel::upper(2).lookback(), 1);
    }
}
