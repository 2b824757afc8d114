//! Live engine: one polling cycle per call, driven by an outer loop.
//!
//! The engine owns the decision state of a single strategy instance (guard
//! counters, managed positions) and talks to the outside world only through
//! the collaborator traits in [`ports`].

pub mod cycle;
pub mod ports;

pub use cycle::{CycleOutcome, CycleReport, StrategyEngine, DEFAULT_HISTORY};
pub use ports::{
    Broker, DataUnavailable, IntentRecord, Journal, JournalError, MarketData, Notifier, NullJournal, OrderRecord,
    OrderResult,
};
