//! Donchian channel bands: rolling highest high and lowest low.
//!
//! The window at candle t covers `high[t-period+1..=t]` (or `low`), so the
//! band includes t itself. The breakout trigger reads the band one candle
//! back, which is the channel of the `period` candles before the signal.
//!
//! Lookback: period - 1.

use crate::components::indicator::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonchianBand {
    Upper,
    Lower,
}

impl DonchianBand {
    fn label(self) -> &'static str {
        match self {
            DonchianBand::Upper => "upper",
            DonchianBand::Lower => "lower",
        }
    }
}

/// One band of a Donchian channel, named `donchian_{band}_{period}`.
#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    band: DonchianBand,
    name: String,
}

impl Donchian {
    pub fn new(period: usize, band: DonchianBand) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self {
            period,
            band,
            name: format!("donchian_{}_{period}", band.label()),
        }
    }

    pub fn upper(period: usize) -> Self {
        Self::new(period, DonchianBand::Upper)
    }

    pub fn lower(period: usize) -> Self {
        Self::new(period, DonchianBand::Lower)
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mut bands = vec![f64::NAN; candles.len()];
        if candles.len() < self.period {
            return bands;
        }

        for (i, window) in candles.windows(self.period).enumerate() {
            bands[i + self.period - 1] = match self.band {
                DonchianBand::Upper => window
                    .iter()
                    .map(|c| c.high)
                    .try_fold(f64::NEG_INFINITY, |acc, h| (!h.is_nan()).then(|| acc.max(h)))
                    .unwrap_or(f64::NAN),
                DonchianBand::Lower => window
                    .iter()
                    .map(|c| c.low)
                    .try_fold(f64::INFINITY, |acc, l| (!l.is_nan()).then(|| acc.min(l)))
                    .unwrap_or(f64::NAN),
            };
        }

        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_candles, DEFAULT_EPSILON};

    fn sample() -> Vec<Candle> {
        make_ohlc_candles(&[
            (10.0, 12.0, 9.0, 11.0),
            (11.0, 15.0, 10.0, 14.0),
            (14.0, 14.0, 13.0, 13.5),
            (13.5, 16.0, 12.0, 15.0),
            (15.0, 15.5, 14.0, 14.5),
        ])
    }

    #[test]
    fn upper_band_tracks_rolling_high() {
        let result = Donchian::upper(3).compute(&sample());
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 15.0, DEFAULT_EPSILON);
        assert_approx(result[3], 16.0, DEFAULT_EPSILON);
        assert_approx(result[4], 16.0, DEFAULT_EPSILON);
    }

    #[test]
    fn lower_band_tracks_rolling_low() {
        let result = Donchian::lower(3).compute(&sample());
        assert!(result[0].is_nan());
        assert_approx(result[2], 9.0, DEFAULT_EPSILON);
        assert_approx(result[3], 10.0, DEFAULT_EPSILON);
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_inside_window_poisons_band() {
        let mut candles = sample();
        candles[1].high = f64::NAN;
        candles[1].low = f64::NAN;
        assert!(Donchian::upper(3).compute(&candles)[2].is_nan());
        assert!(Donchian::lower(3).compute(&candles)[2].is_nan());
        // Window [2..=4] no longer contains the NaN
        assert_approx(Donchian::upper(3).compute(&candles)[4], 16.0, DEFAULT_EPSILON);
    }

    #[test]
    fn names_and_lookback() {
        assert_eq!(Donchian::upper(20).name(), "donchian_upper_20");
        assert_eq!(Donchian::lower(1).name(), "donchian_lower_1");
        assert_eq!(Donchian::upper(20).lookback(), 19);
        assert_eq!(Donchian::lower(1).lookback(), 0);
    }
}
