//! Order volume.
//!
//! # Formula (RiskPercent)
//! ```text
//! risk_money = balance * percent / 100
//! volume     = risk_money / (stop_pips * pip_value_per_lot)
//! ```
//! floored to `volume_step` and clamped to [volume_min, volume_max].
//!
//! # Example
//! - Balance: $10,000, risk 1% ($100)
//! - Stop: 25 pips on EURUSD ($10 per pip per lot)
//! - Volume: 100 / 250 = 0.40 lots

use super::RiskError;
use crate::domain::InstrumentSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VolumePolicy {
    FixedLots { lots: f64 },
    /// Percent of balance at risk (1.0 = 1%).
    RiskPercent { percent: f64 },
}

impl VolumePolicy {
    pub fn validate(&self) -> Result<(), RiskError> {
        match *self {
            VolumePolicy::FixedLots { lots } if !(lots > 0.0) => {
                Err(RiskError::InvalidConfig(format!("fixed lots {lots} must be positive")))
            }
            VolumePolicy::RiskPercent { percent } if !(percent > 0.0 && percent <= 100.0) => {
                Err(RiskError::InvalidConfig(format!("risk percent {percent} outside (0, 100]")))
            }
            _ => Ok(()),
        }
    }

    /// Volume for a stop `stop_distance` (price units) away from entry.
    pub fn size(&self, balance: f64, stop_distance: f64, instrument: &InstrumentSpec) -> f64 {
        match *self {
            VolumePolicy::FixedLots { lots } => normalize(lots, instrument),
            VolumePolicy::RiskPercent { percent } => {
                let stop_pips = instrument.price_to_pips(stop_distance);
                let per_lot = stop_pips * instrument.pip_value_per_lot();
                if !(per_lot > 0.0) || !per_lot.is_finite() || !(balance > 0.0) {
                    return instrument.volume_min;
                }
                let raw = balance * percent / 100.0 / per_lot;
                normalize(raw, instrument)
            }
        }
    }
}

/// Floor to the volume step and clamp to the instrument's range.
pub fn normalize(volume: f64, instrument: &InstrumentSpec) -> f64 {
    let step = instrument.volume_step;
    let steps = (volume / step + 1e-9).floor();
    // Strip float noise from steps * step (e.g. 0.30000000000000004).
    let floored = ((steps * step) * 1e8).round() / 1e8;
    floored.clamp(instrument.volume_min, instrument.volume_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> InstrumentSpec {
        InstrumentSpec::forex_major("EURUSD")
    }

    #[test]
    fn risk_percent_example() {
        let volume = VolumePolicy::RiskPercent { percent: 1.0 }.size(10_000.0, 0.0025, &eurusd());
        assert!((volume - 0.40).abs() < 1e-12);
    }

    #[test]
    fn floors_to_step() {
        // 100 / (30 * 10) = 0.3333 → 0.33
        let volume = VolumePolicy::RiskPercent { percent: 1.0 }.size(10_000.0, 0.0030, &eurusd());
        assert!((volume - 0.33).abs() < 1e-12);
    }

    #[test]
    fn clamps_to_range() {
        let tiny = VolumePolicy::RiskPercent { percent: 0.01 }.size(100.0, 0.0100, &eurusd());
        assert_eq!(tiny, 0.01);
        let huge = VolumePolicy::FixedLots { lots: 1_000.0 }.size(0.0, 0.001, &eurusd());
        assert_eq!(huge, 100.0);
    }

    #[test]
    fn degenerate_distance_uses_minimum() {
        let volume = VolumePolicy::RiskPercent { percent: 1.0 }.size(10_000.0, 0.0, &eurusd());
        assert_eq!(volume, 0.01);
    }

    #[test]
    fn validate_rejects_bad_percent() {
        assert!(VolumePolicy::RiskPercent { percent: 0.0 }.validate().is_err());
        assert!(VolumePolicy::RiskPercent { percent: 150.0 }.validate().is_err());
        assert!(VolumePolicy::FixedLots { lots: 0.1 }.validate().is_ok());
    }
}
