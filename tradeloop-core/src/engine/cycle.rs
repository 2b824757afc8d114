//! One polling cycle of a strategy instance.
//!
//! Steps, in order:
//! 1. Quote, account and instrument metadata (fresh every cycle)
//! 2. Day rollover of the guard state
//! 3. Candles for every timeframe the pipeline reads, recomputed into frames
//! 4. Reconcile tracked positions with the broker (record closes, adopt strays)
//! 5. Manage open positions (breakeven / trailing stops)
//! 6. Evaluate the entry pipeline
//! 7. Guards, sizing, submission, journal and notifications
//!
//! Missing market data aborts the cycle before any decision is made.

use super::ports::{Broker, DataUnavailable, IntentRecord, Journal, MarketData, Notifier, OrderRecord, OrderResult};
use crate::components::{FramePlan, MarketFrames};
use crate::domain::{
    AccountInfo, BrokerRejection, CandleSeries, ClosedTrade, InstrumentError, InstrumentSpec, ManagedPosition,
    OrderPlan, OrderRequest, OrderTicket, PositionId, Quote, StopModification, StrategyId,
};
use crate::guards::{GuardConfig, GuardContext, GuardRejection, GuardSet, GuardState};
use crate::position_management::{PositionManager, StopAction};
use crate::risk::{RiskError, RiskSizer};
use crate::signal::{EvalContext, Evaluation, SignalEvaluator};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Closed candles fetched per timeframe when indicators need less.
/// Recursive indicators (EMA, RSI, ADX) need history well past their lookback.
pub const DEFAULT_HISTORY: usize = 300;

/// What the entry side of a cycle ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    DataUnavailable(DataUnavailable),
    InvalidInstrument(InstrumentError),
    RegimeFiltered,
    NoSignal,
    Blocked(GuardRejection),
    SizingFailed(RiskError),
    OrderPlaced(OrderTicket),
    OrderRejected(BrokerRejection),
}

impl CycleOutcome {
    /// True when an order submission reached the broker and was refused.
    pub fn is_submission_failure(&self) -> bool {
        matches!(self, CycleOutcome::OrderRejected(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Terminal time of the cycle (quote time), if a quote was available.
    pub at: Option<DateTime<Utc>>,
    pub outcome: CycleOutcome,
    pub stops_modified: usize,
    pub stop_rejections: usize,
    pub closed: Vec<ClosedTrade>,
}

impl CycleReport {
    fn new(at: Option<DateTime<Utc>>, outcome: CycleOutcome) -> Self {
        Self {
            at,
            outcome,
            stops_modified: 0,
            stop_rejections: 0,
            closed: Vec::new(),
        }
    }
}

/// A single strategy on a single symbol. Owns its guard state and the
/// positions it manages; shares nothing with other instances.
pub struct StrategyEngine {
    strategy_id: StrategyId,
    evaluator: SignalEvaluator,
    sizer: RiskSizer,
    manager: PositionManager,
    guards: GuardSet,
    plan: FramePlan,
    history: usize,
    state: GuardState,
    positions: BTreeMap<PositionId, ManagedPosition>,
}

impl StrategyEngine {
    pub fn new(evaluator: SignalEvaluator, sizer: RiskSizer, manager: PositionManager, guards: &GuardConfig) -> Self {
        let mut plan = FramePlan::new();
        evaluator.register(&mut plan);
        sizer.register(&mut plan);
        manager.register(&mut plan);
        let config = evaluator.config();
        let strategy_id = StrategyId::derive(&config.name, &config.symbol);
        Self {
            strategy_id,
            evaluator,
            sizer,
            manager,
            guards: GuardSet::from_config(guards),
            plan,
            history: DEFAULT_HISTORY,
            state: GuardState::new(),
            positions: BTreeMap::new(),
        }
    }

    /// Closed candles to request per timeframe (at least what indicators need).
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    pub fn strategy_id(&self) -> StrategyId {
        self.strategy_id
    }

    pub fn name(&self) -> &str {
        &self.evaluator.config().name
    }

    pub fn symbol(&self) -> &str {
        &self.evaluator.config().symbol
    }

    pub fn guard_state(&self) -> &GuardState {
        &self.state
    }

    pub fn positions(&self) -> impl Iterator<Item = &ManagedPosition> {
        self.positions.values()
    }

    pub fn frame_plan(&self) -> &FramePlan {
        &self.plan
    }

    pub fn run_cycle<T>(&mut self, terminal: &mut T, journal: &mut dyn Journal, notifier: &dyn Notifier) -> CycleReport
    where
        T: MarketData + Broker + ?Sized,
    {
        let symbol = self.symbol().to_string();

        let Some(quote) = terminal.quote(&symbol) else {
            return CycleReport::new(None, CycleOutcome::DataUnavailable(DataUnavailable::Quote { symbol }));
        };
        let now = quote.time;
        if self.state.roll_day(now.date_naive()) {
            info!(strategy = %self.name(), symbol = %symbol, date = %now.date_naive(), "day rollover, guard counters reset");
        }

        let account = match terminal.account() {
            Ok(account) => account,
            Err(err) => return CycleReport::new(Some(now), CycleOutcome::DataUnavailable(err)),
        };
        let Some(instrument) = terminal.instrument(&symbol) else {
            return CycleReport::new(
                Some(now),
                CycleOutcome::DataUnavailable(DataUnavailable::Instrument { symbol }),
            );
        };
        if let Err(err) = instrument.validate() {
            warn!(strategy = %self.name(), %err, "instrument metadata invalid, skipping cycle");
            return CycleReport::new(Some(now), CycleOutcome::InvalidInstrument(err));
        }

        let frames = match self.load_frames(terminal, &symbol) {
            Ok(frames) => frames,
            Err(err) => return CycleReport::new(Some(now), CycleOutcome::DataUnavailable(err)),
        };

        let mut report = CycleReport::new(Some(now), CycleOutcome::NoSignal);
        report.closed = self.reconcile(terminal, notifier);
        self.manage(terminal, &quote, &frames, &instrument, &mut report);
        report.outcome = self.enter(terminal, journal, notifier, &quote, &frames, &instrument, &account);
        report
    }

    fn load_frames<T>(&self, terminal: &T, symbol: &str) -> Result<MarketFrames, DataUnavailable>
    where
        T: MarketData + ?Sized,
    {
        let mut frames = MarketFrames::new();
        for timeframe in self.plan.timeframes() {
            let needed = self.plan.min_closed(timeframe);
            // +1 for the forming candle
            let candles = terminal.candles(symbol, timeframe, needed.max(self.history) + 1)?;
            if candles.len() < needed + 1 {
                return Err(DataUnavailable::ShortHistory {
                    symbol: symbol.to_string(),
                    timeframe,
                    wanted: needed + 1,
                    got: candles.len(),
                });
            }
            let series = CandleSeries::new(symbol, timeframe, candles);
            frames.insert(self.plan.build(timeframe, series.closed().to_vec()));
        }
        Ok(frames)
    }

    /// Sync tracked positions with the broker. Returns trades closed since the last cycle.
    fn reconcile<T>(&mut self, terminal: &T, notifier: &dyn Notifier) -> Vec<ClosedTrade>
    where
        T: Broker + ?Sized,
    {
        let symbol = self.symbol().to_string();
        let live: BTreeMap<PositionId, _> = terminal
            .positions(&symbol, self.strategy_id)
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let gone: Vec<PositionId> = self.positions.keys().filter(|id| !live.contains_key(*id)).copied().collect();
        let mut closed = Vec::new();
        for id in gone {
            self.positions.remove(&id);
            match terminal.closed_trade(id) {
                Some(trade) => {
                    self.state.record_close(&trade);
                    info!(
                        strategy = %self.name(),
                        position = %id,
                        profit = trade.profit,
                        streak = self.state.consecutive_losses,
                        "position closed"
                    );
                    notifier.notify(&format!(
                        "{} {} closed {} {} @ {:.5}, P&L {:.2}",
                        self.name(),
                        id,
                        trade.direction,
                        trade.symbol,
                        trade.exit_price,
                        trade.profit
                    ));
                    closed.push(trade);
                }
                None => warn!(strategy = %self.name(), position = %id, "position vanished without a closed-trade record"),
            }
        }

        for (id, broker) in live {
            match self.positions.get_mut(&id) {
                Some(tracked) => {
                    tracked.current_stop = broker.stop_loss;
                    tracked.take_profit = broker.take_profit;
                    tracked.volume = broker.volume;
                }
                None => {
                    info!(strategy = %self.name(), position = %id, stop = broker.stop_loss, "adopting open position");
                    self.positions.insert(id, ManagedPosition::adopt(&broker));
                }
            }
        }
        closed
    }

    fn manage<T>(
        &mut self,
        terminal: &mut T,
        quote: &Quote,
        frames: &MarketFrames,
        instrument: &InstrumentSpec,
        report: &mut CycleReport,
    ) where
        T: Broker + ?Sized,
    {
        for position in self.positions.values_mut() {
            let adjustment = self.manager.decide(position, quote, frames, instrument);
            match adjustment.action {
                StopAction::Hold => position.promote(adjustment.phase),
                StopAction::Modify { new_stop } => {
                    let modification = StopModification {
                        position_id: position.id,
                        symbol: position.symbol.clone(),
                        new_stop,
                        take_profit: position.take_profit,
                    };
                    match terminal.modify_stop(&modification) {
                        Ok(()) => {
                            info!(
                                position = %position.id,
                                from = position.current_stop,
                                to = new_stop,
                                phase = ?adjustment.phase,
                                "stop modified"
                            );
                            position.current_stop = new_stop;
                            position.promote(adjustment.phase);
                            report.stops_modified += 1;
                        }
                        Err(err) => {
                            // Retried on the next poll.
                            warn!(position = %position.id, %err, "stop modification rejected");
                            report.stop_rejections += 1;
                        }
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn enter<T>(
        &mut self,
        terminal: &mut T,
        journal: &mut dyn Journal,
        notifier: &dyn Notifier,
        quote: &Quote,
        frames: &MarketFrames,
        instrument: &InstrumentSpec,
        account: &AccountInfo,
    ) -> CycleOutcome
    where
        T: Broker + ?Sized,
    {
        let evaluation = self.evaluator.evaluate(&EvalContext {
            frames,
            quote,
            instrument,
        });

        let intent = match evaluation {
            Evaluation::Signal(ref intent) => intent.clone(),
            Evaluation::RegimeFiltered { .. } => {
                self.journal_intent(journal, account, quote.time, &evaluation, None);
                return CycleOutcome::RegimeFiltered;
            }
            Evaluation::NoSignal { .. } => {
                self.journal_intent(journal, account, quote.time, &evaluation, None);
                return CycleOutcome::NoSignal;
            }
        };

        let positions: Vec<ManagedPosition> = self.positions.values().cloned().collect();
        let guard_ctx = GuardContext {
            now: quote.time,
            positions: &positions,
            quote,
            instrument,
            state: &self.state,
        };
        if let Err(rejection) = self.guards.check(&guard_ctx) {
            debug!(strategy = %self.name(), %rejection, "entry blocked by guard");
            self.journal_intent(journal, account, quote.time, &evaluation, Some(rejection.to_string()));
            return CycleOutcome::Blocked(rejection);
        }

        let plan = match self.sizer.plan(&intent, frames, instrument, account) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(strategy = %self.name(), %err, "sizing failed, intent discarded");
                self.journal_intent(journal, account, quote.time, &evaluation, Some(err.to_string()));
                return CycleOutcome::SizingFailed(err);
            }
        };
        self.journal_intent(journal, account, quote.time, &evaluation, None);

        let request = OrderRequest::from_plan(self.strategy_id, &plan, self.name());
        match terminal.submit(&request) {
            Ok(ticket) => {
                info!(
                    strategy = %self.name(),
                    position = %ticket.position_id,
                    direction = %plan.direction,
                    volume = ticket.volume,
                    price = ticket.fill_price,
                    sl = plan.stop_loss,
                    tp = plan.take_profit,
                    "order filled"
                );
                self.positions
                    .insert(ticket.position_id, ManagedPosition::opened(&plan, &ticket, quote.time));
                self.state.record_open(quote.time);
                self.journal_order(
                    journal,
                    account,
                    quote.time,
                    &plan,
                    OrderResult::Filled {
                        position_id: ticket.position_id,
                        fill_price: ticket.fill_price,
                        volume: ticket.volume,
                    },
                );
                notifier.notify(&format!(
                    "{} opened {} {} {:.2} lots @ {:.5} (SL {:.5}, TP {:.5})",
                    self.name(),
                    plan.direction,
                    plan.symbol,
                    ticket.volume,
                    ticket.fill_price,
                    plan.stop_loss,
                    plan.take_profit
                ));
                CycleOutcome::OrderPlaced(ticket)
            }
            Err(rejection) => {
                warn!(strategy = %self.name(), retcode = rejection.retcode, reason = %rejection.reason, "order rejected");
                self.journal_order(
                    journal,
                    account,
                    quote.time,
                    &plan,
                    OrderResult::Rejected {
                        retcode: rejection.retcode,
                        reason: rejection.reason.clone(),
                    },
                );
                notifier.notify(&format!("{} order rejected: {rejection}", self.name()));
                CycleOutcome::OrderRejected(rejection)
            }
        }
    }

    fn journal_intent(
        &self,
        journal: &mut dyn Journal,
        account: &AccountInfo,
        at: DateTime<Utc>,
        evaluation: &Evaluation,
        blocked_by: Option<String>,
    ) {
        let direction = match evaluation {
            Evaluation::Signal(intent) => Some(intent.direction),
            Evaluation::NoSignal { candidate, .. } => *candidate,
            Evaluation::RegimeFiltered { .. } => None,
        };
        let record = IntentRecord {
            at,
            strategy: self.name().to_string(),
            strategy_id: self.strategy_id,
            symbol: self.symbol().to_string(),
            account: account.login,
            outcome: evaluation.label().to_string(),
            direction,
            trail: evaluation.trail().to_vec(),
            blocked_by,
        };
        if let Err(err) = journal.record_intent(&record) {
            warn!(strategy = %self.name(), %err, "journal write failed");
        }
    }

    fn journal_order(
        &self,
        journal: &mut dyn Journal,
        account: &AccountInfo,
        at: DateTime<Utc>,
        plan: &OrderPlan,
        result: OrderResult,
    ) {
        let record = OrderRecord {
            at,
            strategy: self.name().to_string(),
            strategy_id: self.strategy_id,
            symbol: self.symbol().to_string(),
            account: account.login,
            plan: plan.clone(),
            result,
        };
        if let Err(err) = journal.record_order(&record) {
            warn!(strategy = %self.name(), %err, "journal write failed");
        }
    }
}
