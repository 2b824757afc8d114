//! Offline replay: one bot over an M1 history on the paper terminal.

use std::path::PathBuf;

use tracing::info;
use tradeloop_core::domain::{Candle, ClosedTrade, InstrumentSpec};
use tradeloop_core::engine::{Journal, NullJournal};

use crate::config::BotConfig;
use crate::driver::{NoSleep, PollingDriver, RunSummary};
use crate::journal::JsonlJournal;
use crate::notifier::LogNotifier;
use crate::paper::{load_m1_csv, PaperTerminal, ReplayError};
use crate::synthetic::{generate_m1, SyntheticSpec};

/// Where replay candles come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CandleSource {
    Csv(PathBuf),
    /// Seeded random walk of this many M1 candles.
    Synthetic(usize),
}

impl CandleSource {
    pub fn load(&self, symbol: &str) -> Result<Vec<Candle>, ReplayError> {
        match self {
            CandleSource::Csv(path) => load_m1_csv(path),
            CandleSource::Synthetic(count) => Ok(generate_m1(symbol, *count, &SyntheticSpec::default())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub summary: RunSummary,
    pub starting_balance: f64,
    pub final_balance: f64,
    /// Closed by the terminal, including trades closed after the last cycle.
    pub trades: Vec<ClosedTrade>,
    pub open_positions: usize,
}

/// Replay `m1` with the bot described by `config`. Journals to the configured
/// JSONL file when the journal is enabled.
pub fn run_replay(config: &BotConfig, m1: Vec<Candle>) -> Result<ReplayReport, ReplayError> {
    config.validate()?;
    let engine = config.build_engine()?;
    let instrument = config
        .paper
        .instrument
        .clone()
        .unwrap_or_else(|| InstrumentSpec::forex_major(config.strategy.symbol.as_str()));
    let mut terminal = PaperTerminal::new(instrument, m1, config.paper.clone())?;
    let mut journal: Box<dyn Journal> = if config.journal.enabled {
        Box::new(JsonlJournal::open(&config.journal.path)?)
    } else {
        Box::new(NullJournal)
    };
    let notifier = LogNotifier::new("replay");

    info!(
        strategy = %engine.name(),
        symbol = %engine.symbol(),
        candles = terminal.remaining() + 1,
        "replay started"
    );
    let mut driver = PollingDriver::new(engine, config.driver.clone(), NoSleep);
    let summary = driver.run(&mut terminal, journal.as_mut(), &notifier);

    Ok(ReplayReport {
        summary,
        starting_balance: config.paper.balance,
        final_balance: terminal.balance(),
        trades: terminal.trade_history().to_vec(),
        open_positions: terminal.open_positions().count(),
    })
}
