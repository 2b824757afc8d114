//! Order-side types: direction, quotes, order plans and broker request/response shapes.

use super::ids::{PositionId, StrategyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Price a market order in this direction fills at.
    pub fn entry_price(self, quote: &Quote) -> f64 {
        match self {
            Direction::Long => quote.ask,
            Direction::Short => quote.bid,
        }
    }

    /// Price a position in this direction would close at (bid for long, ask for short).
    pub fn exit_price(self, quote: &Quote) -> f64 {
        match self {
            Direction::Long => quote.bid,
            Direction::Short => quote.ask,
        }
    }

    /// Signed favorable move from `from` to `to`.
    pub fn favorable_move(self, from: f64, to: f64) -> f64 {
        (to - from) * self.sign()
    }

    /// True if `candidate` is strictly tighter (more protective) than `current`.
    pub fn improves_stop(self, candidate: f64, current: f64) -> bool {
        match self {
            Direction::Long => candidate > current,
            Direction::Short => candidate < current,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => f.write_str("BUY"),
            Direction::Short => f.write_str("SELL"),
        }
    }
}

/// Top-of-book quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Broker-server time of the quote.
    pub time: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Fully-sized order ready for submission.
///
/// Stop and target lie on the direction-correct side of `entry_price`, and
/// `stop_distance` is the price distance after every floor and cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlan {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub volume: f64,
    pub stop_distance: f64,
}

/// Market order sent to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub strategy_id: StrategyId,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub comment: String,
}

impl OrderRequest {
    pub fn from_plan(strategy_id: StrategyId, plan: &OrderPlan, comment: impl Into<String>) -> Self {
        Self {
            strategy_id,
            symbol: plan.symbol.clone(),
            direction: plan.direction,
            volume: plan.volume,
            price: plan.entry_price,
            stop_loss: plan.stop_loss,
            take_profit: plan.take_profit,
            comment: comment.into(),
        }
    }
}

/// Broker acknowledgement of a filled market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub position_id: PositionId,
    pub fill_price: f64,
    pub volume: f64,
}

/// Broker refused an order or stop modification.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("broker rejected request (retcode {retcode}): {reason}")]
pub struct BrokerRejection {
    pub retcode: u32,
    pub reason: String,
}

impl BrokerRejection {
    pub fn new(retcode: u32, reason: impl Into<String>) -> Self {
        Self {
            retcode,
            reason: reason.into(),
        }
    }
}

/// Request to move the protective stop of an open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopModification {
    pub position_id: PositionId,
    pub symbol: String,
    pub new_stop: f64,
    /// Target is resent unchanged; terminals replace both levels at once.
    pub take_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub login: u64,
    pub balance: f64,
    pub equity: f64,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quote() -> Quote {
        Quote {
            time: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            bid: 1.1000,
            ask: 1.1002,
        }
    }

    #[test]
    fn entry_and_exit_sides() {
        let q = quote();
        assert_eq!(Direction::Long.entry_price(&q), 1.1002);
        assert_eq!(Direction::Short.entry_price(&q), 1.1000);
        assert_eq!(Direction::Long.exit_price(&q), 1.1000);
        assert_eq!(Direction::Short.exit_price(&q), 1.1002);
    }

    #[test]
    fn favorable_move_signs() {
        assert!(Direction::Long.favorable_move(1.0, 1.5) > 0.0);
        assert!(Direction::Short.favorable_move(1.0, 1.5) < 0.0);
    }

    #[test]
    fn improves_stop_is_strict() {
        assert!(Direction::Long.improves_stop(1.1, 1.0));
        assert!(!Direction::Long.improves_stop(1.0, 1.0));
        assert!(Direction::Short.improves_stop(1.0, 1.1));
        assert!(!Direction::Short.improves_stop(1.1, 1.1));
    }

    #[test]
    fn spread() {
        assert!((quote().spread() - 0.0002).abs() < 1e-12);
    }
}
