//! Per-timeframe indicator frames.
//!
//! A [`FramePlan`] collects which indicators each timeframe needs and how many
//! closed candles they require. Each poll the engine fetches candles, drops the
//! forming candle and builds one [`IndicatorFrame`] per timeframe.

use crate::components::indicator::{Indicator, IndicatorValues};
use crate::domain::{Candle, Timeframe};
use std::collections::BTreeMap;

/// Closed candles of one timeframe plus index-aligned named indicator series.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    pub values: IndicatorValues,
}

impl IndicatorFrame {
    /// Compute every indicator over `candles`. The caller passes closed candles only.
    pub fn compute(timeframe: Timeframe, candles: Vec<Candle>, indicators: &[Box<dyn Indicator>]) -> Self {
        let mut values = IndicatorValues::new();
        for indicator in indicators {
            values.insert(indicator.name(), indicator.compute(&candles));
        }
        Self {
            timeframe,
            candles,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Index of the most recent closed candle.
    pub fn last_index(&self) -> Option<usize> {
        self.candles.len().checked_sub(1)
    }

    /// Index `back` candles before the most recent closed one.
    pub fn index_back(&self, back: usize) -> Option<usize> {
        self.last_index().and_then(|i| i.checked_sub(back))
    }

    pub fn candle(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    /// Finite indicator value at `index`, `None` while undefined.
    pub fn value(&self, name: &str, index: usize) -> Option<f64> {
        self.values.defined(name, index)
    }

    /// Finite indicator value `back` candles before the latest closed one.
    pub fn value_back(&self, name: &str, back: usize) -> Option<f64> {
        self.index_back(back).and_then(|i| self.value(name, i))
    }
}

/// What to compute per timeframe, and the closed-candle depth each needs.
#[derive(Default)]
pub struct FramePlan {
    indicators: BTreeMap<Timeframe, Vec<Box<dyn Indicator>>>,
    depth: BTreeMap<Timeframe, usize>,
}

impl FramePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an indicator on a timeframe. Duplicate names are ignored.
    pub fn require<I: Indicator + 'static>(&mut self, timeframe: Timeframe, indicator: I) {
        self.require_depth(timeframe, indicator.lookback() + 1);
        let list = self.indicators.entry(timeframe).or_default();
        if list.iter().all(|existing| existing.name() != indicator.name()) {
            list.push(Box::new(indicator));
        }
    }

    /// Require at least `closed` closed candles on a timeframe.
    pub fn require_depth(&mut self, timeframe: Timeframe, closed: usize) {
        let entry = self.depth.entry(timeframe).or_insert(0);
        *entry = (*entry).max(closed);
    }

    pub fn timeframes(&self) -> impl Iterator<Item = Timeframe> + '_ {
        self.depth.keys().copied()
    }

    /// Minimum number of closed candles a timeframe needs.
    pub fn min_closed(&self, timeframe: Timeframe) -> usize {
        self.depth.get(&timeframe).copied().unwrap_or(0)
    }

    pub fn indicator_names(&self, timeframe: Timeframe) -> Vec<&str> {
        self.indicators
            .get(&timeframe)
            .map(|list| list.iter().map(|i| i.name()).collect())
            .unwrap_or_default()
    }

    pub fn build(&self, timeframe: Timeframe, closed: Vec<Candle>) -> IndicatorFrame {
        let indicators = self.indicators.get(&timeframe).map(Vec::as_slice).unwrap_or(&[]);
        IndicatorFrame::compute(timeframe, closed, indicators)
    }
}

/// One frame per timeframe for a single evaluation.
#[derive(Debug, Clone, Default)]
pub struct MarketFrames {
    frames: BTreeMap<Timeframe, IndicatorFrame>,
}

impl MarketFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, frame: IndicatorFrame) {
        self.frames.insert(frame.timeframe, frame);
    }

    pub fn get(&self, timeframe: Timeframe) -> Option<&IndicatorFrame> {
        self.frames.get(&timeframe)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_candles, Atr, Ema, Sma};

    #[test]
    fn plan_dedups_and_tracks_depth() {
        let mut plan = FramePlan::new();
        plan.require(Timeframe::M5, Sma::new(20));
        plan.require(Timeframe::M5, Sma::new(20));
        plan.require(Timeframe::M5, Atr::new(14));
        plan.require_depth(Timeframe::H1, 3);
        assert_eq!(plan.indicator_names(Timeframe::M5), vec!["sma_20", "atr_14"]);
        assert_eq!(plan.min_closed(Timeframe::M5), 20);
        assert_eq!(plan.min_closed(Timeframe::H1), 3);
        assert_eq!(plan.min_closed(Timeframe::D1), 0);
        assert_eq!(plan.timeframes().collect::<Vec<_>>(), vec![Timeframe::M5, Timeframe::H1]);
    }

    #[test]
    fn frame_values_aligned_with_candles() {
        let mut plan = FramePlan::new();
        plan.require(Timeframe::M1, Ema::new(3));
        plan.require(Timeframe::M1, Sma::new(3));
        let frame = plan.build(Timeframe::M1, make_candles(&[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(frame.last_index(), Some(3));
        assert_eq!(frame.value("sma_3", 1), None);
        assert_eq!(frame.value_back("sma_3", 0), Some(3.0));
        assert_eq!(frame.value_back("sma_3", 1), Some(2.0));
        assert_eq!(frame.value_back("sma_3", 4), None);
        assert!(frame.value("ema_3", 0).is_some());
    }

    #[test]
    fn market_frames_lookup() {
        let mut frames = MarketFrames::new();
        frames.insert(IndicatorFrame::compute(Timeframe::H1, make_candles(&[1.0]), &[]));
        assert!(frames.get(Timeframe::H1).is_some());
        assert!(frames.get(Timeframe::M1).is_none());
    }
}
