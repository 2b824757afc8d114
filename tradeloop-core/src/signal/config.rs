//! Strategy configuration: an ordered list of filters with exactly one trigger.
//!
//! Thresholds are plain data. Presets in [`super::presets`] reproduce the
//! known strategy variants; anything else is assembled in TOML.

use crate::components::FramePlan;
use crate::domain::Timeframe;
use crate::indicators::{Adx, Atr, Donchian, Ema, HaChannel, HeikenAshi, PriceSource, Rsi, Sma, UtBot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovingAverageKind {
    Ema,
    Sma,
}

impl MovingAverageKind {
    pub fn key(self, period: usize) -> String {
        match self {
            MovingAverageKind::Ema => format!("ema_{period}"),
            MovingAverageKind::Sma => format!("sma_{period}"),
        }
    }
}

/// Entry trigger. Its raw market read also supplies the candidate direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Close beyond the channel of the previous `period` candles plus buffer.
    Donchian {
        timeframe: Timeframe,
        period: usize,
        #[serde(default)]
        buffer_pips: f64,
    },
    /// Fresh Heiken-Ashi close beyond the HA channel, not on a doji.
    HeikenAshiChannel {
        timeframe: Timeframe,
        period: usize,
        #[serde(default)]
        buffer_pips: f64,
        #[serde(default = "default_doji_threshold")]
        doji_threshold: f64,
    },
    EmaCross {
        timeframe: Timeframe,
        fast: usize,
        slow: usize,
        #[serde(default)]
        confirmation_candles: usize,
        #[serde(default)]
        require_momentum: bool,
    },
    UtBot {
        timeframe: Timeframe,
        sensitivity: f64,
        atr_period: usize,
        #[serde(default)]
        confirmation_candles: usize,
        #[serde(default)]
        require_momentum: bool,
        #[serde(default)]
        heiken_ashi: bool,
    },
}

fn default_doji_threshold() -> f64 {
    0.1
}

impl TriggerConfig {
    pub fn name(&self) -> &'static str {
        match self {
            TriggerConfig::Donchian { .. } => "donchian_breakout",
            TriggerConfig::HeikenAshiChannel { .. } => "heiken_ashi_channel",
            TriggerConfig::EmaCross { .. } => "ema_crossover",
            TriggerConfig::UtBot { .. } => "ut_bot",
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        match self {
            TriggerConfig::Donchian { timeframe, .. }
            | TriggerConfig::HeikenAshiChannel { timeframe, .. }
            | TriggerConfig::EmaCross { timeframe, .. }
            | TriggerConfig::UtBot { timeframe, .. } => *timeframe,
        }
    }
}

/// One step of the filter pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Close on the side of a moving average that agrees with the direction.
    Trend {
        timeframe: Timeframe,
        kind: MovingAverageKind,
        period: usize,
    },
    Adx {
        timeframe: Timeframe,
        period: usize,
        min: f64,
        #[serde(default)]
        require_di_alignment: bool,
    },
    /// ATR in pips inside [min_pips, max_pips]. Failure stops the evaluation.
    Volatility {
        timeframe: Timeframe,
        atr_period: usize,
        min_pips: f64,
        max_pips: f64,
    },
    Trigger(TriggerConfig),
    Rsi {
        timeframe: Timeframe,
        period: usize,
        buy_above: f64,
        sell_below: f64,
        #[serde(default)]
        require_slope: bool,
    },
    /// Tick volume above `multiplier` times its SMA.
    Volume {
        timeframe: Timeframe,
        period: usize,
        multiplier: f64,
    },
    /// Broker-server hour in [start_hour, end_hour), wrapping past midnight.
    Session { start_hour: u32, end_hour: u32 },
}

impl FilterSpec {
    pub fn name(&self) -> &'static str {
        match self {
            FilterSpec::Trend { .. } => "trend",
            FilterSpec::Adx { .. } => "adx",
            FilterSpec::Volatility { .. } => "volatility",
            FilterSpec::Trigger(trigger) => trigger.name(),
            FilterSpec::Rsi { .. } => "rsi",
            FilterSpec::Volume { .. } => "volume",
            FilterSpec::Session { .. } => "session",
        }
    }

    /// Register the indicators and candle depth this filter reads.
    pub fn register(&self, plan: &mut FramePlan) {
        match *self {
            FilterSpec::Trend { timeframe, kind, period } => {
                match kind {
                    MovingAverageKind::Ema => plan.require(timeframe, Ema::new(period)),
                    MovingAverageKind::Sma => plan.require(timeframe, Sma::new(period)),
                }
                plan.require_depth(timeframe, period);
            }
            FilterSpec::Adx { timeframe, period, .. } => {
                plan.require(timeframe, Adx::new(period));
                plan.require(timeframe, Adx::plus_di(period));
                plan.require(timeframe, Adx::minus_di(period));
            }
            FilterSpec::Volatility { timeframe, atr_period, .. } => {
                plan.require(timeframe, Atr::new(atr_period));
            }
            FilterSpec::Trigger(ref trigger) => register_trigger(trigger, plan),
            FilterSpec::Rsi { timeframe, period, .. } => {
                plan.require(timeframe, Rsi::new(period));
                plan.require_depth(timeframe, period + 2);
            }
            FilterSpec::Volume { timeframe, period, .. } => {
                plan.require(timeframe, Sma::of(PriceSource::Volume, period));
            }
            FilterSpec::Session { .. } => {}
        }
    }
}

fn register_trigger(trigger: &TriggerConfig, plan: &mut FramePlan) {
    match *trigger {
        TriggerConfig::Donchian { timeframe, period, .. } => {
            plan.require(timeframe, Donchian::upper(period));
            plan.require(timeframe, Donchian::lower(period));
            // band at i-2 plus the breakout candle
            plan.require_depth(timeframe, period + 2);
        }
        TriggerConfig::HeikenAshiChannel { timeframe, period, .. } => {
            plan.require(timeframe, HaChannel::upper(period));
            plan.require(timeframe, HaChannel::lower(period));
            plan.require(timeframe, HeikenAshi::open());
            plan.require(timeframe, HeikenAshi::high());
            plan.require(timeframe, HeikenAshi::low());
            plan.require(timeframe, HeikenAshi::close());
            plan.require_depth(timeframe, period + 1);
        }
        TriggerConfig::EmaCross {
            timeframe,
            fast,
            slow,
            confirmation_candles,
            ..
        } => {
            plan.require(timeframe, Ema::new(fast));
            plan.require(timeframe, Ema::new(slow));
            plan.require_depth(timeframe, slow + confirmation_candles + 2);
        }
        TriggerConfig::UtBot {
            timeframe,
            sensitivity,
            atr_period,
            confirmation_candles,
            heiken_ashi,
            ..
        } => {
            plan.require(timeframe, UtBot::stop(sensitivity, atr_period, heiken_ashi));
            plan.require(timeframe, UtBot::position(sensitivity, atr_period, heiken_ashi));
            plan.require_depth(timeframe, atr_period + confirmation_candles + 2);
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StrategyConfigError {
    #[error("strategy '{0}' has no trigger")]
    MissingTrigger(String),

    #[error("strategy '{0}' has {1} triggers, expected exactly one")]
    MultipleTriggers(String, usize),

    #[error("{filter}: {message}")]
    InvalidFilter { filter: &'static str, message: String },
}

/// Parameterised strategy: name, symbol and the ordered filter pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub symbol: String,
    pub filters: Vec<FilterSpec>,
}

impl StrategyConfig {
    pub fn trigger(&self) -> Option<&TriggerConfig> {
        self.filters.iter().find_map(|f| match f {
            FilterSpec::Trigger(t) => Some(t),
            _ => None,
        })
    }

    pub fn register(&self, plan: &mut FramePlan) {
        for filter in &self.filters {
            filter.register(plan);
        }
    }

    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        let triggers = self
            .filters
            .iter()
            .filter(|f| matches!(f, FilterSpec::Trigger(_)))
            .count();
        match triggers {
            0 => return Err(StrategyConfigError::MissingTrigger(self.name.clone())),
            1 => {}
            n => return Err(StrategyConfigError::MultipleTriggers(self.name.clone(), n)),
        }
        for filter in &self.filters {
            validate_filter(filter)?;
        }
        Ok(())
    }
}

fn invalid(filter: &'static str, message: impl Into<String>) -> StrategyConfigError {
    StrategyConfigError::InvalidFilter {
        filter,
        message: message.into(),
    }
}

fn validate_filter(filter: &FilterSpec) -> Result<(), StrategyConfigError> {
    let name = filter.name();
    match *filter {
        FilterSpec::Trend { period, .. } if period == 0 => Err(invalid(name, "period must be >= 1")),
        FilterSpec::Adx { period, min, .. } => {
            if period == 0 {
                Err(invalid(name, "period must be >= 1"))
            } else if !(0.0..=100.0).contains(&min) {
                Err(invalid(name, format!("min {min} outside 0..=100")))
            } else {
                Ok(())
            }
        }
        FilterSpec::Volatility {
            atr_period,
            min_pips,
            max_pips,
            ..
        } => {
            if atr_period == 0 {
                Err(invalid(name, "atr_period must be >= 1"))
            } else if min_pips < 0.0 || min_pips > max_pips {
                Err(invalid(name, format!("band [{min_pips}, {max_pips}] is empty or negative")))
            } else {
                Ok(())
            }
        }
        FilterSpec::Rsi {
            period,
            buy_above,
            sell_below,
            ..
        } => {
            if period == 0 {
                Err(invalid(name, "period must be >= 1"))
            } else if !(0.0..=100.0).contains(&buy_above) || !(0.0..=100.0).contains(&sell_below) {
                Err(invalid(name, "thresholds must lie in 0..=100"))
            } else {
                Ok(())
            }
        }
        FilterSpec::Volume { period, multiplier, .. } => {
            if period == 0 {
                Err(invalid(name, "period must be >= 1"))
            } else if multiplier < 0.0 {
                Err(invalid(name, "multiplier must be >= 0"))
            } else {
                Ok(())
            }
        }
        FilterSpec::Session { start_hour, end_hour } if start_hour > 23 || end_hour > 23 => {
            Err(invalid(name, "hours must lie in 0..=23"))
        }
        FilterSpec::Trigger(ref trigger) => validate_trigger(trigger),
        _ => Ok(()),
    }
}

fn validate_trigger(trigger: &TriggerConfig) -> Result<(), StrategyConfigError> {
    let name = trigger.name();
    match *trigger {
        TriggerConfig::Donchian { period, buffer_pips, .. } => {
            if period == 0 {
                return Err(invalid(name, "period must be >= 1"));
            }
            if buffer_pips < 0.0 {
                return Err(invalid(name, "buffer_pips must be >= 0"));
            }
        }
        TriggerConfig::HeikenAshiChannel {
            period,
            buffer_pips,
            doji_threshold,
            ..
        } => {
            if period == 0 {
                return Err(invalid(name, "period must be >= 1"));
            }
            if buffer_pips < 0.0 {
                return Err(invalid(name, "buffer_pips must be >= 0"));
            }
            if !(0.0..=1.0).contains(&doji_threshold) {
                return Err(invalid(name, "doji_threshold must lie in 0..=1"));
            }
        }
        TriggerConfig::EmaCross { fast, slow, .. } => {
            if fast == 0 || slow <= fast {
                return Err(invalid(name, format!("need 1 <= fast < slow, got {fast}/{slow}")));
            }
        }
        TriggerConfig::UtBot {
            sensitivity,
            atr_period,
            ..
        } => {
            if atr_period == 0 {
                return Err(invalid(name, "atr_period must be >= 1"));
            }
            if !(sensitivity > 0.0) {
                return Err(invalid(name, "sensitivity must be positive"));
            }
        }
    }
    Ok(())
}
