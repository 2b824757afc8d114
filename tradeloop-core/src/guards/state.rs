//! Per-strategy guard bookkeeping.

use crate::domain::ClosedTrade;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Trade timestamps kept for the cooldown check. Only the newest matters,
/// a short history is kept for diagnostics.
const TIMESTAMP_HISTORY: usize = 16;

/// Mutated only by trade events and day rollover. Owned by one engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardState {
    pub recent_trade_timestamps: Vec<DateTime<Utc>>,
    pub consecutive_losses: u32,
    pub last_loss_at: Option<DateTime<Utc>>,
    pub daily_realized_pnl: f64,
    pub last_reset_date: Option<NaiveDate>,
}

impl GuardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent recorded trade event (open or close).
    pub fn latest_trade(&self) -> Option<DateTime<Utc>> {
        self.recent_trade_timestamps.iter().max().copied()
    }

    pub fn record_open(&mut self, at: DateTime<Utc>) {
        self.push_timestamp(at);
    }

    pub fn record_close(&mut self, trade: &ClosedTrade) {
        self.push_timestamp(trade.closed_at);
        self.daily_realized_pnl += trade.profit;
        if trade.is_loss() {
            self.consecutive_losses += 1;
            self.last_loss_at = Some(trade.closed_at);
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Reset the daily P&L and loss streak when the broker date changes.
    /// Returns true if a rollover happened.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        match self.last_reset_date {
            Some(date) if date == today => false,
            None => {
                self.last_reset_date = Some(today);
                false
            }
            Some(_) => {
                self.last_reset_date = Some(today);
                self.daily_realized_pnl = 0.0;
                self.consecutive_losses = 0;
                true
            }
        }
    }

    fn push_timestamp(&mut self, at: DateTime<Utc>) {
        self.recent_trade_timestamps.push(at);
        if self.recent_trade_timestamps.len() > TIMESTAMP_HISTORY {
            let excess = self.recent_trade_timestamps.len() - TIMESTAMP_HISTORY;
            self.recent_trade_timestamps.drain(..excess);
        }
    }
}
