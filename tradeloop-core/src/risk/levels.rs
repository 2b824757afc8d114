//! Stop-loss and take-profit levels.
//!
//! ```text
//! Fixed:       distance = sl_pips,              target = tp_pips
//! AtrMultiple: distance = ATR * sl_multiplier,  target = ATR * tp_multiplier | distance * R
//! Structural:  stop = prev candle low/high ∓ buffer, target = distance * R
//! ```
//!
//! After the policy, the distance is floored to the minimum and capped at the
//! maximum risk. A moved distance recomputes the target through the policy's
//! reward ratio (tp/sl for ATR multiples); a fixed target is left alone.
//! Stops are rounded away from entry onto the point grid, targets to nearest.

use super::RiskError;
use crate::components::{FramePlan, Indicator, MarketFrames};
use crate::domain::{Direction, InstrumentSpec, Timeframe};
use crate::indicators::Atr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrTarget {
    /// Target distance = ATR * multiplier.
    AtrMultiple(f64),
    /// Target distance = stop distance * ratio.
    RewardRatio(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum StopPolicy {
    Fixed {
        sl_pips: f64,
        tp_pips: f64,
    },
    AtrMultiple {
        timeframe: Timeframe,
        period: usize,
        sl_multiplier: f64,
        target: AtrTarget,
    },
    /// Stop beyond the previous closed candle of `timeframe`.
    Structural {
        timeframe: Timeframe,
        buffer_pips: f64,
        reward_ratio: f64,
    },
}

impl StopPolicy {
    pub fn register(&self, plan: &mut FramePlan) {
        match *self {
            StopPolicy::Fixed { .. } => {}
            StopPolicy::AtrMultiple { timeframe, period, .. } => plan.require(timeframe, Atr::new(period)),
            StopPolicy::Structural { timeframe, .. } => plan.require_depth(timeframe, 1),
        }
    }

    pub fn validate(&self) -> Result<(), RiskError> {
        let ok = match *self {
            StopPolicy::Fixed { sl_pips, tp_pips } => sl_pips > 0.0 && tp_pips > 0.0,
            StopPolicy::AtrMultiple {
                period,
                sl_multiplier,
                target,
                ..
            } => {
                let target_ok = match target {
                    AtrTarget::AtrMultiple(m) | AtrTarget::RewardRatio(m) => m > 0.0,
                };
                period >= 1 && sl_multiplier > 0.0 && target_ok
            }
            StopPolicy::Structural {
                buffer_pips,
                reward_ratio,
                ..
            } => buffer_pips >= 0.0 && reward_ratio > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(RiskError::InvalidConfig(format!("stop policy {self:?} has non-positive parameters")))
        }
    }
}

/// Final, rounded levels for one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub stop_loss: f64,
    pub take_profit: f64,
    /// |entry - stop_loss| after rounding.
    pub stop_distance: f64,
}

/// Raw (stop distance, target distance, reward ratio) before floors and caps.
fn policy_distances(
    policy: &StopPolicy,
    direction: Direction,
    entry: f64,
    frames: &MarketFrames,
    instrument: &InstrumentSpec,
) -> Result<(f64, f64, Option<f64>), RiskError> {
    match *policy {
        StopPolicy::Fixed { sl_pips, tp_pips } => Ok((
            instrument.pips_to_price(sl_pips),
            instrument.pips_to_price(tp_pips),
            None,
        )),
        StopPolicy::AtrMultiple {
            timeframe,
            period,
            sl_multiplier,
            target,
        } => {
            let atr = frames
                .get(timeframe)
                .and_then(|frame| frame.value_back(Atr::new(period).name(), 0))
                .ok_or(RiskError::MissingAtr { timeframe, period })?;
            let distance = atr * sl_multiplier;
            Ok(match target {
                AtrTarget::AtrMultiple(tp) => (distance, atr * tp, Some(tp / sl_multiplier)),
                AtrTarget::RewardRatio(r) => (distance, distance * r, Some(r)),
            })
        }
        StopPolicy::Structural {
            timeframe,
            buffer_pips,
            reward_ratio,
        } => {
            let candle = frames
                .get(timeframe)
                .and_then(|frame| frame.candles.last())
                .ok_or(RiskError::MissingStructure { timeframe })?;
            let buffer = instrument.pips_to_price(buffer_pips);
            let stop = match direction {
                Direction::Long => candle.low - buffer,
                Direction::Short => candle.high + buffer,
            };
            let distance = direction.favorable_move(stop, entry);
            if !(distance > 0.0) {
                return Err(RiskError::StructureOnWrongSide { stop, entry });
            }
            Ok((distance, distance * reward_ratio, Some(reward_ratio)))
        }
    }
}

pub fn compute(
    policy: &StopPolicy,
    direction: Direction,
    entry: f64,
    frames: &MarketFrames,
    instrument: &InstrumentSpec,
    min_stop_pips: f64,
    max_risk_pips: Option<f64>,
) -> Result<Levels, RiskError> {
    let (mut distance, mut target, ratio) = policy_distances(policy, direction, entry, frames, instrument)?;
    for (what, value) in [("stop distance", distance), ("target distance", target)] {
        if !value.is_finite() {
            return Err(RiskError::NonFinite { what, value });
        }
    }

    let min_distance = instrument.pips_to_price(min_stop_pips);
    if distance < min_distance {
        distance = min_distance;
        if let Some(r) = ratio {
            target = distance * r;
        }
    }
    let max_distance = max_risk_pips.map(|pips| instrument.pips_to_price(pips));
    if let Some(max) = max_distance {
        if distance > max {
            distance = max;
            if let Some(r) = ratio {
                target = distance * r;
            }
        }
    }

    let sign = direction.sign();
    let raw_stop = entry - sign * distance;
    let mut stop_loss = instrument.round_away_from(raw_stop, entry);
    if let Some(max) = max_distance {
        // Rounding away must not breach the cap.
        if (entry - stop_loss).abs() > max + 1e-9 {
            stop_loss = instrument.round_toward(raw_stop, entry);
        }
    }
    let take_profit = instrument.round_to_point(entry + sign * target);

    Ok(Levels {
        stop_loss,
        take_profit,
        stop_distance: (entry - stop_loss).abs(),
    })
}
