use serde::{Deserialize, Serialize};
use thiserror::Error;

const GRID_EPS: f64 = 1e-9;

/// Broker-reported contract metadata for one symbol.
///
/// Queried every cycle; a spec that fails [`InstrumentSpec::validate`] blocks
/// entries for that cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentSpec {
    pub symbol: String,
    /// Smallest price increment quoted.
    pub point: f64,
    pub digits: u32,
    pub tick_size: f64,
    /// Account-currency value of one tick for one lot.
    pub tick_value: f64,
    pub contract_size: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InstrumentError {
    #[error("{symbol}: {field} must be positive, got {value}")]
    NonPositive {
        symbol: String,
        field: &'static str,
        value: f64,
    },

    #[error("{symbol}: volume_min {min} exceeds volume_max {max}")]
    VolumeRange { symbol: String, min: f64, max: f64 },
}

impl InstrumentSpec {
    /// Standard 5-digit forex major (EURUSD-like).
    pub fn forex_major(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            point: 0.00001,
            digits: 5,
            tick_size: 0.00001,
            tick_value: 1.0,
            contract_size: 100_000.0,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
        }
    }

    /// Pip size: ten points for 3/5-digit quotes, otherwise one point.
    pub fn pip_size(&self) -> f64 {
        match self.digits {
            3 | 5 => self.point * 10.0,
            _ => self.point,
        }
    }

    /// Account-currency value of one pip for one lot.
    pub fn pip_value_per_lot(&self) -> f64 {
        self.tick_value * self.pip_size() / self.tick_size
    }

    pub fn price_to_pips(&self, distance: f64) -> f64 {
        distance / self.pip_size()
    }

    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip_size()
    }

    pub fn round_to_point(&self, price: f64) -> f64 {
        (price / self.point).round() * self.point
    }

    /// Snap a stop level onto the point grid, moving away from `reference`.
    pub fn round_away_from(&self, price: f64, reference: f64) -> f64 {
        let steps = price / self.point;
        // Tolerate representation error so an on-grid price stays put.
        let snapped = if price < reference {
            (steps + GRID_EPS).floor()
        } else {
            (steps - GRID_EPS).ceil()
        };
        snapped * self.point
    }

    /// Snap a level onto the point grid, moving toward `reference`.
    pub fn round_toward(&self, price: f64, reference: f64) -> f64 {
        let steps = price / self.point;
        let snapped = if price < reference {
            (steps - GRID_EPS).ceil()
        } else {
            (steps + GRID_EPS).floor()
        };
        snapped * self.point
    }

    pub fn validate(&self) -> Result<(), InstrumentError> {
        let fields = [
            ("point", self.point),
            ("tick_size", self.tick_size),
            ("tick_value", self.tick_value),
            ("volume_min", self.volume_min),
            ("volume_max", self.volume_max),
            ("volume_step", self.volume_step),
        ];
        for (field, value) in fields {
            // `!(v > 0)` also rejects NaN
            if !(value > 0.0) {
                return Err(InstrumentError::NonPositive {
                    symbol: self.symbol.clone(),
                    field,
                    value,
                });
            }
        }
        if self.volume_min > self.volume_max {
            return Err(InstrumentError::VolumeRange {
                symbol: self.symbol.clone(),
                min: self.volume_min,
                max: self.volume_max,
            });
        }
        Ok(())
    }
}
