//! Shared building blocks: the indicator trait and per-timeframe indicator frames.

pub mod frame;
pub mod indicator;

pub use frame::{FramePlan, IndicatorFrame, MarketFrames};
pub use indicator::{Indicator, IndicatorValues};
