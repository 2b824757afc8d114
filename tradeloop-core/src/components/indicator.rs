//! Indicator trait and named indicator values container.
//!
//! Indicators are pure functions: candle history in, numeric series out.
//! Everything is recomputed from scratch on each poll; nothing is persisted.

use crate::domain::Candle;
use std::collections::HashMap;

/// Trait for indicators.
///
/// Indicators take a full candle series and produce a numeric output series of
/// the same length. The first `lookback()` values are `f64::NAN` (warmup), and
/// callers treat NaN as "no signal", never as zero.
///
/// # Look-ahead guard
/// No value at index t may depend on candle t+1 or later. Every indicator
/// must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_50", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire candle series.
    ///
    /// Returns a `Vec<f64>` of the same length as `candles`.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Container for computed indicator values, queried by name and candle index.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Value at a specific candle index. NaN warmup values are returned as-is.
    pub fn get(&self, name: &str, index: usize) -> Option<f64> {
        self.series.get(name).and_then(|v| v.get(index).copied())
    }

    /// Value at `index` if present and finite.
    pub fn defined(&self, name: &str, index: usize) -> Option<f64> {
        self.get(name, index).filter(|v| v.is_finite())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
