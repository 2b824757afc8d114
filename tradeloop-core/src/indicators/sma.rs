//! Simple Moving Average (SMA).
//!
//! Rolling mean of a candle field over a lookback window.
//! Lookback: period - 1 (first valid value at index period-1).

use crate::components::indicator::Indicator;
use crate::domain::Candle;
use serde::{Deserialize, Serialize};

/// Candle field an average is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceSource {
    pub fn extract(self, candle: &Candle) -> f64 {
        match self {
            PriceSource::Open => candle.open,
            PriceSource::High => candle.high,
            PriceSource::Low => candle.low,
            PriceSource::Close => candle.close,
            PriceSource::Volume => candle.tick_volume as f64,
        }
    }

    fn label(self) -> &'static str {
        match self {
            PriceSource::Open => "open",
            PriceSource::High => "high",
            PriceSource::Low => "low",
            PriceSource::Close => "close",
            PriceSource::Volume => "volume",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: PriceSource,
    name: String,
}

impl Sma {
    /// SMA of close prices, named `sma_{period}`.
    pub fn new(period: usize) -> Self {
        Self::of(PriceSource::Close, period)
    }

    /// SMA of any candle field. Non-close sources are named `sma_{source}_{period}`.
    pub fn of(source: PriceSource, period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        let name = match source {
            PriceSource::Close => format!("sma_{period}"),
            other => format!("sma_{}_{period}", other.label()),
        };
        Self { period, source, name }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let values: Vec<f64> = candles.iter().map(|c| self.source.extract(c)).collect();
        rolling_mean(&values, self.period)
    }
}

/// Rolling mean over `period` values ending at each index.
///
/// NaN anywhere in a window makes that window's mean NaN. Each window is summed
/// afresh so a NaN never leaks into later windows.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        result[i] = window.iter().sum::<f64>() / period as f64;
    }
    result
}
