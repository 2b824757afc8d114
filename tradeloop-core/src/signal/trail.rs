//! Filter trail: the structured record of why an evaluation did or did not trade.
//!
//! Every evaluated filter appends one [`FilterEvaluation`]. The trail is
//! journaled with each intent so rejected setups can be audited later.

use crate::domain::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a single filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterVerdict {
    Passed,
    /// A required indicator value was missing or NaN.
    Undefined,
    FilteredByTrend,
    FilteredByAdx,
    FilteredByVolatility,
    /// Trigger saw no qualifying setup, or no candidate direction exists.
    NoSetup,
    FalseBreakout,
    StaleBreakout,
    DojiCandle,
    FilteredByRsi,
    FilteredByVolume,
    OutsideSession,
}

impl FilterVerdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Record of one filter's verdict with a snapshot of the values it used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEvaluation {
    pub filter: String,
    pub verdict: FilterVerdict,
    /// Finite values only. Undefined inputs are left out.
    pub state: BTreeMap<String, f64>,
}

impl FilterEvaluation {
    pub fn new(filter: impl Into<String>, verdict: FilterVerdict) -> Self {
        Self {
            filter: filter.into(),
            verdict,
            state: BTreeMap::new(),
        }
    }

    /// Record `value` under `key`. Non-finite values are dropped.
    pub fn with(mut self, key: &str, value: f64) -> Self {
        if value.is_finite() {
            self.state.insert(key.to_string(), value);
        }
        self
    }
}

/// Candidate trade produced by an evaluation that passed every filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub strategy: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub evaluated_at: DateTime<Utc>,
    pub trail: Vec<FilterEvaluation>,
}

/// Result of evaluating one strategy against the current market frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Evaluation {
    Signal(TradeIntent),
    /// Volatility regime outside the tradable band; evaluation stopped early.
    RegimeFiltered { trail: Vec<FilterEvaluation> },
    NoSignal {
        candidate: Option<Direction>,
        trail: Vec<FilterEvaluation>,
    },
}

impl Evaluation {
    pub fn trail(&self) -> &[FilterEvaluation] {
        match self {
            Evaluation::Signal(intent) => &intent.trail,
            Evaluation::RegimeFiltered { trail } | Evaluation::NoSignal { trail, .. } => trail,
        }
    }

    pub fn intent(&self) -> Option<&TradeIntent> {
        match self {
            Evaluation::Signal(intent) => Some(intent),
            _ => None,
        }
    }

    pub fn into_intent(self) -> Option<TradeIntent> {
        match self {
            Evaluation::Signal(intent) => Some(intent),
            _ => None,
        }
    }

    /// First failing filter, if any.
    pub fn rejection(&self) -> Option<&FilterEvaluation> {
        self.trail().iter().find(|e| !e.verdict.is_passed())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Evaluation::Signal(_) => "signal",
            Evaluation::RegimeFiltered { .. } => "regime_filtered",
            Evaluation::NoSignal { .. } => "no_signal",
        }
    }
}
