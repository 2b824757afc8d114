//! Breakeven-then-trail stop management.
//!
//! # Phases
//! ```text
//! Initial ──profit > BE trigger──▶ Breakeven ──profit > trail trigger──▶ Trailing
//!    └──────────────────profit > trail trigger─────────────────────────────┘
//! ```
//!
//! Floating profit is measured at the price the position would close at
//! (bid for longs, ask for shorts). Triggers compare strictly:
//!
//! ```text
//! breakeven: profit_pips > max(trigger_pips, initial_stop_pips * trigger_fraction)
//! trailing:  profit_pips > max(trigger_pips, initial_stop_pips * trigger_multiplier)
//! ```
//!
//! Trailing is sticky once reached. The trail distance is clamped to
//! [min_pips, max_pips] and a new stop is only proposed when it strictly
//! tightens the current one.

use super::ratchet::RatchetState;
use crate::components::{FramePlan, Indicator, MarketFrames};
use crate::domain::{InstrumentSpec, ManagedPosition, Quote, StopPhase, Timeframe};
use crate::indicators::Atr;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakevenConfig {
    pub trigger_pips: f64,
    /// Fraction of the initial stop distance (0.0 disables the relative trigger).
    #[serde(default)]
    pub trigger_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TrailDistance {
    FixedPips { pips: f64 },
    Atr {
        timeframe: Timeframe,
        period: usize,
        multiplier: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingConfig {
    pub trigger_pips: f64,
    #[serde(default)]
    pub trigger_multiplier: f64,
    pub distance: TrailDistance,
    #[serde(default)]
    pub min_pips: f64,
    #[serde(default = "default_max_pips")]
    pub max_pips: f64,
}

fn default_max_pips() -> f64 {
    f64::INFINITY
}

/// Position-management settings. A missing section disables that phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ManagementConfig {
    #[serde(default)]
    pub breakeven: Option<BreakevenConfig>,
    #[serde(default)]
    pub trailing: Option<TrailingConfig>,
}

impl ManagementConfig {
    pub fn register(&self, plan: &mut FramePlan) {
        if let Some(TrailingConfig {
            distance: TrailDistance::Atr { timeframe, period, .. },
            ..
        }) = &self.trailing
        {
            plan.require(*timeframe, Atr::new(*period));
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(be) = &self.breakeven {
            if !(be.trigger_pips >= 0.0) || !(be.trigger_fraction >= 0.0) {
                return Err(format!("breakeven triggers must be non-negative: {be:?}"));
            }
        }
        if let Some(trail) = &self.trailing {
            if !(trail.trigger_pips >= 0.0) || !(trail.trigger_multiplier >= 0.0) {
                return Err(format!("trailing triggers must be non-negative: {trail:?}"));
            }
            if !(trail.min_pips >= 0.0) || trail.min_pips > trail.max_pips {
                return Err(format!(
                    "trailing distance bounds [{}, {}] are invalid",
                    trail.min_pips, trail.max_pips
                ));
            }
            let distance_ok = match trail.distance {
                TrailDistance::FixedPips { pips } => pips > 0.0,
                TrailDistance::Atr { period, multiplier, .. } => period >= 1 && multiplier > 0.0,
            };
            if !distance_ok {
                return Err(format!("trailing distance {:?} is invalid", trail.distance));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StopAction {
    Hold,
    Modify { new_stop: f64 },
}

/// Outcome of one management pass over a position.
///
/// `phase` is the phase the position should move to. For a `Modify` the
/// caller promotes only after the broker accepts the new stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopAdjustment {
    pub action: StopAction,
    pub phase: StopPhase,
}

impl StopAdjustment {
    pub fn hold(phase: StopPhase) -> Self {
        Self {
            action: StopAction::Hold,
            phase,
        }
    }

    pub fn modify(new_stop: f64, phase: StopPhase) -> Self {
        Self {
            action: StopAction::Modify { new_stop },
            phase,
        }
    }

    pub fn new_stop(&self) -> Option<f64> {
        match self.action {
            StopAction::Hold => None,
            StopAction::Modify { new_stop } => Some(new_stop),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositionManager {
    config: ManagementConfig,
}

impl PositionManager {
    pub fn new(config: ManagementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ManagementConfig {
        &self.config
    }

    pub fn register(&self, plan: &mut FramePlan) {
        self.config.register(plan);
    }

    /// Decide the next stop for `position`. Pure: nothing is mutated.
    pub fn decide(
        &self,
        position: &ManagedPosition,
        quote: &Quote,
        frames: &MarketFrames,
        instrument: &InstrumentSpec,
    ) -> StopAdjustment {
        let direction = position.direction;
        let exit = direction.exit_price(quote);
        let profit_pips = instrument.price_to_pips(direction.favorable_move(position.entry_price, exit));
        let initial_pips = instrument.price_to_pips(position.initial_stop_distance);

        let mut phase = position.phase;
        let mut ratchet = if position.has_stop() {
            RatchetState::with_initial_level(direction, position.current_stop)
        } else {
            RatchetState::new(direction)
        };

        if let Some(trail) = &self.config.trailing {
            let trigger = trail.trigger_pips.max(initial_pips * trail.trigger_multiplier);
            if position.phase == StopPhase::Trailing || profit_pips > trigger {
                phase = StopPhase::Trailing;
                match trail_distance(trail, frames, instrument) {
                    Some(distance) => {
                        let raw = exit - direction.sign() * distance;
                        let candidate = instrument.round_away_from(raw, exit);
                        if ratchet.would_tighten(candidate) {
                            debug!(
                                position = %position.id,
                                profit_pips,
                                stop = candidate,
                                "trailing stop tightens"
                            );
                            return StopAdjustment::modify(ratchet.apply(candidate), phase);
                        }
                    }
                    None => debug!(position = %position.id, "trail distance undefined, holding"),
                }
            }
        }

        if let Some(be) = &self.config.breakeven {
            let trigger = be.trigger_pips.max(initial_pips * be.trigger_fraction);
            if position.phase == StopPhase::Initial && profit_pips > trigger {
                phase = phase.max(StopPhase::Breakeven);
                if position.stop_at_or_through_entry() {
                    return StopAdjustment::hold(phase);
                }
                if ratchet.would_tighten(position.entry_price) {
                    debug!(position = %position.id, profit_pips, "moving stop to breakeven");
                    return StopAdjustment::modify(ratchet.apply(position.entry_price), phase);
                }
            }
        }

        StopAdjustment::hold(phase)
    }
}

/// Trail distance in price units, or `None` when the ATR is undefined.
fn trail_distance(trail: &TrailingConfig, frames: &MarketFrames, instrument: &InstrumentSpec) -> Option<f64> {
    let pips = match trail.distance {
        TrailDistance::FixedPips { pips } => pips,
        TrailDistance::Atr {
            timeframe,
            period,
            multiplier,
        } => {
            let atr = frames.get(timeframe)?.value_back(Atr::new(period).name(), 0)?;
            instrument.price_to_pips(atr * multiplier)
        }
    };
    Some(instrument.pips_to_price(pips.clamp(trail.min_pips, trail.max_pips)))
}
