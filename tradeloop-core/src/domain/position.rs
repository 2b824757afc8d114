use super::ids::{PositionId, StrategyId};
use super::order::{Direction, OrderPlan, OrderTicket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stop-management phase. Ordered: a position only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StopPhase {
    Initial,
    Breakeven,
    Trailing,
}

/// Position as the broker reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub id: PositionId,
    pub strategy_id: StrategyId,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    /// 0.0 when no stop is attached.
    pub stop_loss: f64,
    pub take_profit: f64,
    pub opened_at: DateTime<Utc>,
}

/// Open position tracked by the position manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedPosition {
    pub id: PositionId,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    pub current_stop: f64,
    pub take_profit: f64,
    pub opened_at: DateTime<Utc>,
    /// Price distance between entry and the stop at open. Frozen for life.
    pub initial_stop_distance: f64,
    pub phase: StopPhase,
}

impl ManagedPosition {
    /// Track a position this process just opened. The initial distance is
    /// measured from the fill, not the quote the plan was sized at.
    pub fn opened(plan: &OrderPlan, ticket: &OrderTicket, opened_at: DateTime<Utc>) -> Self {
        Self {
            id: ticket.position_id,
            symbol: plan.symbol.clone(),
            direction: plan.direction,
            volume: ticket.volume,
            entry_price: ticket.fill_price,
            current_stop: plan.stop_loss,
            take_profit: plan.take_profit,
            opened_at,
            initial_stop_distance: (ticket.fill_price - plan.stop_loss).abs(),
            phase: StopPhase::Initial,
        }
    }

    /// Adopt a position discovered on the account (e.g. after a restart).
    ///
    /// The initial distance is reconstructed from the current stop, which is
    /// 0 when no stop is attached. Only fixed-pip triggers apply then.
    pub fn adopt(broker: &BrokerPosition) -> Self {
        let initial_stop_distance = if broker.stop_loss > 0.0 {
            (broker.entry_price - broker.stop_loss).abs()
        } else {
            0.0
        };
        Self {
            id: broker.id,
            symbol: broker.symbol.clone(),
            direction: broker.direction,
            volume: broker.volume,
            entry_price: broker.entry_price,
            current_stop: broker.stop_loss,
            take_profit: broker.take_profit,
            opened_at: broker.opened_at,
            initial_stop_distance,
            phase: StopPhase::Initial,
        }
    }

    pub fn has_stop(&self) -> bool {
        self.current_stop > 0.0
    }

    /// Move to `phase` if it is ahead of the current one. Never regresses.
    pub fn promote(&mut self, phase: StopPhase) {
        if phase > self.phase {
            self.phase = phase;
        }
    }

    /// Stop sits at or beyond entry on the protective side.
    pub fn stop_at_or_through_entry(&self) -> bool {
        self.has_stop() && self.direction.favorable_move(self.entry_price, self.current_stop) >= 0.0
    }
}

/// Realized outcome of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub position_id: PositionId,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub closed_at: DateTime<Utc>,
    /// Realized profit in account currency (negative for a loss).
    pub profit: f64,
}

impl ClosedTrade {
    pub fn is_loss(&self) -> bool {
        self.profit < 0.0
    }
}
