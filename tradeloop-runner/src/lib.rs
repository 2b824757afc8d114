//! Tradeloop Runner: configuration, polling driver and replay.
//!
//! This crate builds on `tradeloop-core` to provide:
//! - TOML bot configuration with validation
//! - The polling driver with order-failure backoff
//! - JSONL journal and tracing notification sinks
//! - A paper terminal replaying M1 history (CSV or synthetic)

pub mod backoff;
pub mod config;
pub mod driver;
pub mod journal;
pub mod notifier;
pub mod paper;
pub mod replay;
pub mod synthetic;

pub use backoff::{BreakerState, FailureBreaker};
pub use config::{BotConfig, ConfigError, JournalConfig, StrategySection, DEFAULT_PRESET};
pub use driver::{DriverConfig, NoSleep, PollingDriver, RunSummary, Sleeper, Terminal, ThreadSleeper};
pub use journal::{read_journal, JournalEntry, JsonlJournal};
pub use notifier::{LogNotifier, SilentNotifier};
pub use paper::{load_m1_csv, PaperConfig, PaperTerminal, ReplayError};
pub use replay::{run_replay, CandleSource, ReplayReport};
pub use synthetic::{generate_m1, SyntheticSpec};
