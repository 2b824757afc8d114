//! Collaborator traits the engine drives: terminal data, broker, journal, notifier.
//!
//! Implementations live outside the core (the paper terminal, the JSONL
//! journal). Tests use in-memory doubles.

use crate::domain::{
    AccountInfo, BrokerPosition, BrokerRejection, Candle, ClosedTrade, Direction, InstrumentSpec, OrderPlan,
    OrderRequest, OrderTicket, PositionId, Quote, StopModification, StrategyId, Timeframe,
};
use crate::signal::FilterEvaluation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market data could not be fetched. The cycle aborts silently and retries next poll.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataUnavailable {
    #[error("no candles for {symbol} {timeframe}")]
    Candles { symbol: String, timeframe: Timeframe },

    #[error("only {got} of {wanted} candles for {symbol} {timeframe}")]
    ShortHistory {
        symbol: String,
        timeframe: Timeframe,
        wanted: usize,
        got: usize,
    },

    #[error("no quote for {symbol}")]
    Quote { symbol: String },

    #[error("no instrument spec for {symbol}")]
    Instrument { symbol: String },

    #[error("account unavailable: {0}")]
    Account(String),
}

pub trait MarketData {
    /// Up to `count` of the newest candles, oldest first. The last one is
    /// still forming. Fewer are returned only when the history is shorter;
    /// a failed fetch is an error, never a partial series.
    fn candles(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>, DataUnavailable>;

    fn quote(&self, symbol: &str) -> Option<Quote>;

    /// Queried every cycle; contract metadata may change between sessions.
    fn instrument(&self, symbol: &str) -> Option<InstrumentSpec>;
}

pub trait Broker {
    fn account(&self) -> Result<AccountInfo, DataUnavailable>;

    /// Open positions on `symbol` tagged with `strategy_id`.
    fn positions(&self, symbol: &str, strategy_id: StrategyId) -> Vec<BrokerPosition>;

    fn submit(&mut self, request: &OrderRequest) -> Result<OrderTicket, BrokerRejection>;

    fn modify_stop(&mut self, modification: &StopModification) -> Result<(), BrokerRejection>;

    /// Realized outcome of a position that is no longer open.
    fn closed_trade(&self, position_id: PositionId) -> Option<ClosedTrade>;
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One evaluated intent: what the pipeline saw and what became of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    pub at: DateTime<Utc>,
    pub strategy: String,
    pub strategy_id: StrategyId,
    pub symbol: String,
    pub account: u64,
    /// `signal`, `regime_filtered` or `no_signal`.
    pub outcome: String,
    pub direction: Option<Direction>,
    pub trail: Vec<FilterEvaluation>,
    /// Guard or sizing reason when a signal did not become an order.
    pub blocked_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderResult {
    Filled {
        position_id: PositionId,
        fill_price: f64,
        volume: f64,
    },
    Rejected {
        retcode: u32,
        reason: String,
    },
}

/// One submitted order plan and the broker's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub at: DateTime<Utc>,
    pub strategy: String,
    pub strategy_id: StrategyId,
    pub symbol: String,
    pub account: u64,
    pub plan: OrderPlan,
    pub result: OrderResult,
}

/// Append-only decision log. Failures are logged by the caller, never propagated.
pub trait Journal {
    fn record_intent(&mut self, record: &IntentRecord) -> Result<(), JournalError>;

    fn record_order(&mut self, record: &OrderRecord) -> Result<(), JournalError>;
}

/// Fire-and-forget operator notifications.
pub trait Notifier {
    fn notify(&self, message: &str);
}

/// Journal that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl Journal for NullJournal {
    fn record_intent(&mut self, _record: &IntentRecord) -> Result<(), JournalError> {
        Ok(())
    }

    fn record_order(&mut self, _record: &OrderRecord) -> Result<(), JournalError> {
        Ok(())
    }
}
