//! Polling loop around a [`StrategyEngine`].
//!
//! Each iteration runs one cycle, then sleeps `poll_interval`. Consecutive
//! order rejections feed a [`FailureBreaker`]; once it trips the operator is
//! notified and the loop pauses for `failure_cooldown` before resuming.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tradeloop_core::domain::ClosedTrade;
use tradeloop_core::engine::{Broker, CycleOutcome, CycleReport, Journal, MarketData, Notifier, StrategyEngine};

use crate::backoff::FailureBreaker;

/// A terminal the driver can poll.
///
/// `advance` is called after every sleep with the time slept. Live terminals
/// move with the wall clock and keep the default; a replay terminal steps its
/// clock and returns false once its history is exhausted.
pub trait Terminal: MarketData + Broker {
    fn advance(&mut self, _elapsed: Duration) -> bool {
        true
    }
}

pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Returns immediately. Replay time is driven by [`Terminal::advance`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&mut self, _duration: Duration) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub poll_interval_secs: u64,
    /// Consecutive order rejections before pausing. 0 disables the pause.
    pub failure_threshold: u32,
    pub failure_cooldown_secs: u64,
    /// Stop after this many cycles (unbounded when absent).
    pub max_cycles: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            failure_threshold: 5,
            failure_cooldown_secs: 300,
            max_cycles: None,
        }
    }
}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be >= 1".into());
        }
        if self.failure_threshold > 0 && self.failure_cooldown_secs == 0 {
            return Err("failure_cooldown_secs must be >= 1 when failure_threshold is set".into());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }
}

/// Counters accumulated over a driver run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub data_unavailable: u64,
    pub regime_filtered: u64,
    pub no_signal: u64,
    pub blocked: u64,
    pub sizing_failed: u64,
    pub orders_placed: u64,
    pub orders_rejected: u64,
    pub stops_modified: u64,
    pub stop_rejections: u64,
    pub pauses: u64,
    pub closed: Vec<ClosedTrade>,
}

impl RunSummary {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        match report.outcome {
            CycleOutcome::DataUnavailable(_) | CycleOutcome::InvalidInstrument(_) => self.data_unavailable += 1,
            CycleOutcome::RegimeFiltered => self.regime_filtered += 1,
            CycleOutcome::NoSignal => self.no_signal += 1,
            CycleOutcome::Blocked(_) => self.blocked += 1,
            CycleOutcome::SizingFailed(_) => self.sizing_failed += 1,
            CycleOutcome::OrderPlaced(_) => self.orders_placed += 1,
            CycleOutcome::OrderRejected(_) => self.orders_rejected += 1,
        }
        self.stops_modified += report.stops_modified as u64;
        self.stop_rejections += report.stop_rejections as u64;
        self.closed.extend(report.closed.iter().cloned());
    }

    pub fn realized_pnl(&self) -> f64 {
        self.closed.iter().map(|t| t.profit).sum()
    }

    pub fn wins(&self) -> usize {
        self.closed.iter().filter(|t| t.profit > 0.0).count()
    }
}

pub struct PollingDriver<S: Sleeper> {
    engine: StrategyEngine,
    config: DriverConfig,
    breaker: FailureBreaker,
    sleeper: S,
}

impl<S: Sleeper> PollingDriver<S> {
    pub fn new(engine: StrategyEngine, config: DriverConfig, sleeper: S) -> Self {
        let breaker = FailureBreaker::new(config.failure_threshold, config.failure_cooldown());
        Self {
            engine,
            config,
            breaker,
            sleeper,
        }
    }

    pub fn engine(&self) -> &StrategyEngine {
        &self.engine
    }

    pub fn into_engine(self) -> StrategyEngine {
        self.engine
    }

    /// Poll until `max_cycles` is reached or the terminal stops advancing.
    pub fn run<T>(&mut self, terminal: &mut T, journal: &mut dyn Journal, notifier: &dyn Notifier) -> RunSummary
    where
        T: Terminal + ?Sized,
    {
        let mut summary = RunSummary::default();
        info!(
            strategy = %self.engine.name(),
            symbol = %self.engine.symbol(),
            id = %self.engine.strategy_id(),
            poll_secs = self.config.poll_interval_secs,
            "driver started"
        );

        loop {
            let report = self.engine.run_cycle(terminal, journal, notifier);
            debug!(cycle = summary.cycles + 1, outcome = ?report.outcome, "cycle finished");
            summary.record(&report);

            let mut wait = self.config.poll_interval();
            match &report.outcome {
                CycleOutcome::OrderPlaced(_) => self.breaker.record_success(),
                CycleOutcome::OrderRejected(_) if self.breaker.record_failure() => {
                    let failures = self.breaker.consecutive_failures();
                    let cooldown = self.breaker.cooldown();
                    warn!(
                        strategy = %self.engine.name(),
                        failures,
                        cooldown_secs = cooldown.as_secs(),
                        "repeated order failures, pausing"
                    );
                    notifier.notify(&format!(
                        "{}: {failures} consecutive order failures, pausing for {}s",
                        self.engine.name(),
                        cooldown.as_secs()
                    ));
                    summary.pauses += 1;
                    wait = cooldown;
                    self.breaker.reset();
                }
                _ => {}
            }

            if self.config.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            self.sleeper.sleep(wait);
            if !terminal.advance(wait) {
                debug!("terminal exhausted");
                break;
            }
        }

        info!(
            strategy = %self.engine.name(),
            cycles = summary.cycles,
            orders = summary.orders_placed,
            rejected = summary.orders_rejected,
            closed = summary.closed.len(),
            pnl = summary.realized_pnl(),
            "driver stopped"
        );
        summary
    }
}
