//! Risk sizer: turns a trade intent into a fully-sized order plan.
//!
//! # Responsibilities
//! - Stop-loss / take-profit levels under the configured stop policy
//! - Minimum-distance floor and optional maximum-risk cap
//! - Order volume (fixed lots or percent of balance at risk)
//!
//! # Non-Responsibilities
//! - Deciding whether to trade (signal evaluator and guards)
//! - Managing the stop after entry (position manager)

pub mod levels;
pub mod volume;

pub use levels::{AtrTarget, Levels, StopPolicy};
pub use volume::VolumePolicy;

use crate::components::{FramePlan, MarketFrames};
use crate::domain::{AccountInfo, InstrumentError, InstrumentSpec, OrderPlan, Timeframe};
use crate::signal::TradeIntent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RiskError {
    #[error("invalid instrument: {0}")]
    Instrument(#[from] InstrumentError),

    #[error("ATR({period}) on {timeframe} is undefined")]
    MissingAtr { timeframe: Timeframe, period: usize },

    #[error("no closed {timeframe} candle for a structural stop")]
    MissingStructure { timeframe: Timeframe },

    #[error("structural stop {stop} is not beyond entry {entry}")]
    StructureOnWrongSide { stop: f64, entry: f64 },

    #[error("non-finite {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("invalid risk config: {0}")]
    InvalidConfig(String),
}

/// Missing fields fall back to [`RiskConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub stop: StopPolicy,
    pub volume: VolumePolicy,
    /// Smallest allowed stop distance. Applied after the stop policy.
    pub min_stop_pips: f64,
    /// Largest allowed stop distance, if capped.
    pub max_risk_pips: Option<f64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop: StopPolicy::Fixed {
                sl_pips: 20.0,
                tp_pips: 40.0,
            },
            volume: VolumePolicy::RiskPercent { percent: 1.0 },
            min_stop_pips: 5.0,
            max_risk_pips: None,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), RiskError> {
        self.stop.validate()?;
        self.volume.validate()?;
        if !(self.min_stop_pips >= 0.0) {
            return Err(RiskError::InvalidConfig("min_stop_pips must be >= 0".into()));
        }
        if let Some(max) = self.max_risk_pips {
            if !(max > 0.0) || max < self.min_stop_pips {
                return Err(RiskError::InvalidConfig(format!(
                    "max_risk_pips {max} must be positive and >= min_stop_pips {}",
                    self.min_stop_pips
                )));
            }
        }
        Ok(())
    }
}

/// Stateless sizer over a validated [`RiskConfig`].
#[derive(Debug, Clone)]
pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> Result<Self, RiskError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Register the frames the stop policy reads.
    pub fn register(&self, plan: &mut FramePlan) {
        self.config.stop.register(plan);
    }

    /// Size `intent` into an order plan. Any error discards the intent.
    pub fn plan(
        &self,
        intent: &TradeIntent,
        frames: &MarketFrames,
        instrument: &InstrumentSpec,
        account: &AccountInfo,
    ) -> Result<OrderPlan, RiskError> {
        instrument.validate()?;
        if !intent.entry_price.is_finite() || intent.entry_price <= 0.0 {
            return Err(RiskError::NonFinite {
                what: "entry price",
                value: intent.entry_price,
            });
        }

        let levels = levels::compute(
            &self.config.stop,
            intent.direction,
            intent.entry_price,
            frames,
            instrument,
            self.config.min_stop_pips,
            self.config.max_risk_pips,
        )?;
        let volume = self.config.volume.size(account.balance, levels.stop_distance, instrument);

        Ok(OrderPlan {
            symbol: intent.symbol.clone(),
            direction: intent.direction,
            entry_price: intent.entry_price,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
            volume,
            stop_distance: levels.stop_distance,
        })
    }
}
