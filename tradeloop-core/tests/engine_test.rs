//! Strategy engine cycles against an in-memory terminal.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use tradeloop_core::domain::{
    AccountInfo, BrokerPosition, BrokerRejection, Candle, ClosedTrade, Direction, InstrumentSpec, OrderRequest,
    OrderTicket, PositionId, Quote, StopModification, StopPhase, StrategyId, Timeframe,
};
use tradeloop_core::engine::{
    Broker, CycleOutcome, DataUnavailable, IntentRecord, Journal, JournalError, MarketData, Notifier, OrderRecord,
    OrderResult, StrategyEngine,
};
use tradeloop_core::guards::{GuardConfig, RejectionReason};
use tradeloop_core::position_management::{BreakevenConfig, ManagementConfig, PositionManager};
use tradeloop_core::risk::{RiskConfig, RiskSizer};
use tradeloop_core::signal::{FilterSpec, SignalEvaluator, StrategyConfig, TriggerConfig};

// ── Doubles ──────────────────────────────────────────────────────────

struct FakeTerminal {
    candles: Vec<Candle>,
    quote: Quote,
    instrument: InstrumentSpec,
    positions: Vec<BrokerPosition>,
    closed: HashMap<PositionId, ClosedTrade>,
    reject_orders: bool,
    reject_modifies: bool,
    submitted: Vec<OrderRequest>,
    modified: Vec<StopModification>,
    next_id: u64,
}

impl FakeTerminal {
    fn new(candles: Vec<Candle>, quote: Quote) -> Self {
        Self {
            candles,
            quote,
            instrument: InstrumentSpec::forex_major("EURUSD"),
            positions: Vec::new(),
            closed: HashMap::new(),
            reject_orders: false,
            reject_modifies: false,
            submitted: Vec::new(),
            modified: Vec::new(),
            next_id: 100,
        }
    }

    /// Close an open position at `exit` with the given profit.
    fn close(&mut self, id: PositionId, exit: f64, profit: f64) {
        let Some(index) = self.positions.iter().position(|p| p.id == id) else {
            panic!("no open position {id}");
        };
        let p = self.positions.remove(index);
        self.closed.insert(
            id,
            ClosedTrade {
                position_id: id,
                symbol: p.symbol,
                direction: p.direction,
                volume: p.volume,
                entry_price: p.entry_price,
                exit_price: exit,
                closed_at: self.quote.time,
                profit,
            },
        );
    }
}

impl MarketData for FakeTerminal {
    fn candles(&self, _symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>, DataUnavailable> {
        if timeframe != Timeframe::M1 || self.candles.is_empty() {
            return Err(DataUnavailable::Candles {
                symbol: "EURUSD".into(),
                timeframe,
            });
        }
        let start = self.candles.len().saturating_sub(count);
        Ok(self.candles[start..].to_vec())
    }

    fn quote(&self, _symbol: &str) -> Option<Quote> {
        Some(self.quote)
    }

    fn instrument(&self, _symbol: &str) -> Option<InstrumentSpec> {
        Some(self.instrument.clone())
    }
}

impl Broker for FakeTerminal {
    fn account(&self) -> Result<AccountInfo, DataUnavailable> {
        Ok(AccountInfo {
            login: 5001,
            balance: 10_000.0,
            equity: 10_000.0,
            currency: "USD".into(),
        })
    }

    fn positions(&self, symbol: &str, strategy_id: StrategyId) -> Vec<BrokerPosition> {
        self.positions
            .iter()
            .filter(|p| p.symbol == symbol && p.strategy_id == strategy_id)
            .cloned()
            .collect()
    }

    fn submit(&mut self, request: &OrderRequest) -> Result<OrderTicket, BrokerRejection> {
        self.submitted.push(request.clone());
        if self.reject_orders {
            return Err(BrokerRejection::new(10019, "not enough money"));
        }
        self.next_id += 1;
        let id = PositionId(self.next_id);
        let fill_price = request.direction.entry_price(&self.quote);
        self.positions.push(BrokerPosition {
            id,
            strategy_id: request.strategy_id,
            symbol: request.symbol.clone(),
            direction: request.direction,
            volume: request.volume,
            entry_price: fill_price,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            opened_at: self.quote.time,
        });
        Ok(OrderTicket {
            position_id: id,
            fill_price,
            volume: request.volume,
        })
    }

    fn modify_stop(&mut self, modification: &StopModification) -> Result<(), BrokerRejection> {
        self.modified.push(modification.clone());
        if self.reject_modifies {
            return Err(BrokerRejection::new(10016, "invalid stops"));
        }
        if let Some(p) = self.positions.iter_mut().find(|p| p.id == modification.position_id) {
            p.stop_loss = modification.new_stop;
        }
        Ok(())
    }

    fn closed_trade(&self, position_id: PositionId) -> Option<ClosedTrade> {
        self.closed.get(&position_id).cloned()
    }
}

#[derive(Default)]
struct MemoryJournal {
    intents: Vec<IntentRecord>,
    orders: Vec<OrderRecord>,
}

impl Journal for MemoryJournal {
    fn record_intent(&mut self, record: &IntentRecord) -> Result<(), JournalError> {
        self.intents.push(record.clone());
        Ok(())
    }

    fn record_order(&mut self, record: &OrderRecord) -> Result<(), JournalError> {
        self.orders.push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct Collect(RefCell<Vec<String>>);

impl Notifier for Collect {
    fn notify(&self, message: &str) {
        self.0.borrow_mut().push(message.to_string());
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 5, 0, 0).unwrap()
}

/// Ranging candles ending in a clean upside breakout, plus a forming candle.
fn breakout_candles() -> Vec<Candle> {
    let mut candles: Vec<Candle> = (0..299)
        .map(|i| {
            let close = 1.1 + 0.0010 * (2.0 * std::f64::consts::PI * i as f64 / 10.0).sin();
            Candle {
                open_time: start() + Duration::minutes(i as i64),
                open: close,
                high: close + 0.0003,
                low: close - 0.0003,
                close,
                tick_volume: 120,
            }
        })
        .collect();
    candles[298] = Candle {
        open: 1.1,
        high: 1.1003,
        low: 1.0997,
        close: 1.1,
        ..candles[298]
    };
    for (minute, close) in [(299, 1.1030), (300, 1.1031)] {
        candles.push(Candle {
            open_time: start() + Duration::minutes(minute),
            open: 1.1,
            high: close + 0.0002,
            low: 1.0999,
            close,
            tick_volume: 200,
        });
    }
    candles
}

fn quote(minutes_after_last: i64) -> Quote {
    Quote {
        time: start() + Duration::minutes(300 + minutes_after_last),
        bid: 1.10300,
        ask: 1.10310,
    }
}

fn engine(guards: GuardConfig, management: ManagementConfig) -> StrategyEngine {
    let evaluator = SignalEvaluator::new(StrategyConfig {
        name: "donchian_breakout".into(),
        symbol: "EURUSD".into(),
        filters: vec![
            FilterSpec::Volatility {
                timeframe: Timeframe::M1,
                atr_period: 14,
                min_pips: 3.0,
                max_pips: 30.0,
            },
            FilterSpec::Trigger(TriggerConfig::Donchian {
                timeframe: Timeframe::M1,
                period: 20,
                buffer_pips: 0.5,
            }),
        ],
    })
    .unwrap();
    let sizer = RiskSizer::new(RiskConfig::default()).unwrap();
    StrategyEngine::new(evaluator, sizer, PositionManager::new(management), &guards)
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn missing_candles_abort_silently() {
    let mut terminal = FakeTerminal::new(Vec::new(), quote(0));
    let mut journal = MemoryJournal::default();
    let notifier = Collect::default();
    let mut engine = engine(GuardConfig::default(), ManagementConfig::default());

    let report = engine.run_cycle(&mut terminal, &mut journal, &notifier);
    assert!(matches!(report.outcome, CycleOutcome::DataUnavailable(_)));
    assert!(journal.intents.is_empty());
    assert!(terminal.submitted.is_empty());
    assert!(notifier.0.borrow().is_empty());
}

#[test]
fn signal_places_one_order_then_concurrency_blocks() {
    let mut terminal = FakeTerminal::new(breakout_candles(), quote(0));
    let mut journal = MemoryJournal::default();
    let notifier = Collect::default();
    let mut engine = engine(GuardConfig::default(), ManagementConfig::default());

    let report = engine.run_cycle(&mut terminal, &mut journal, &notifier);
    let CycleOutcome::OrderPlaced(ticket) = report.outcome else {
        panic!("expected an order, got {:?}", report.outcome);
    };
    assert_eq!(terminal.submitted.len(), 1);
    let request = &terminal.submitted[0];
    assert_eq!(request.direction, Direction::Long);
    assert_eq!(request.strategy_id, engine.strategy_id());
    assert!((request.stop_loss - 1.10110).abs() < 1e-9);

    assert_eq!(journal.intents.len(), 1);
    assert_eq!(journal.intents[0].outcome, "signal");
    assert_eq!(journal.intents[0].account, 5001);
    assert_eq!(journal.orders.len(), 1);
    assert!(matches!(journal.orders[0].result, OrderResult::Filled { position_id, .. } if position_id == ticket.position_id));
    assert_eq!(notifier.0.borrow().len(), 1);
    assert_eq!(engine.positions().count(), 1);

    terminal.quote = quote(1);
    let report = engine.run_cycle(&mut terminal, &mut journal, &notifier);
    match report.outcome {
        CycleOutcome::Blocked(rejection) => assert_eq!(rejection.reason, RejectionReason::MaxPositions),
        other => panic!("expected a guard block, got {other:?}"),
    }
    assert_eq!(terminal.submitted.len(), 1);
    assert_eq!(journal.intents.last().and_then(|r| r.blocked_by.as_deref()).map(|s| s.starts_with("max_positions")), Some(true));
}

#[test]
fn loss_lockout_blocks_orders_after_a_losing_close() {
    let mut terminal = FakeTerminal::new(breakout_candles(), quote(0));
    let mut journal = MemoryJournal::default();
    let notifier = Collect::default();
    let guards = GuardConfig {
        max_consecutive_losses: 1,
        loss_lockout_secs: 3600,
        ..GuardConfig::default()
    };
    let mut engine = engine(guards, ManagementConfig::default());

    let report = engine.run_cycle(&mut terminal, &mut journal, &notifier);
    let CycleOutcome::OrderPlaced(ticket) = report.outcome else {
        panic!("expected an order, got {:?}", report.outcome);
    };

    terminal.quote = quote(2);
    terminal.close(ticket.position_id, 1.10110, -100.0);
    let report = engine.run_cycle(&mut terminal, &mut journal, &notifier);

    assert_eq!(report.closed.len(), 1);
    assert_eq!(engine.guard_state().consecutive_losses, 1);
    assert_eq!(engine.guard_state().daily_realized_pnl, -100.0);
    match report.outcome {
        CycleOutcome::Blocked(rejection) => assert_eq!(rejection.reason, RejectionReason::LossLockout),
        other => panic!("expected loss lockout, got {other:?}"),
    }
    assert_eq!(terminal.submitted.len(), 1);
}

#[test]
fn rejected_order_is_reported_and_notified() {
    let mut terminal = FakeTerminal::new(breakout_candles(), quote(0));
    terminal.reject_orders = true;
    let mut journal = MemoryJournal::default();
    let notifier = Collect::default();
    let mut engine = engine(GuardConfig::default(), ManagementConfig::default());

    let report = engine.run_cycle(&mut terminal, &mut journal, &notifier);
    assert!(report.outcome.is_submission_failure());
    assert!(matches!(journal.orders[0].result, OrderResult::Rejected { retcode: 10019, .. }));
    assert!(notifier.0.borrow()[0].contains("rejected"));
    assert_eq!(engine.positions().count(), 0);
}

#[test]
fn adopted_position_is_moved_to_breakeven_once_accepted() {
    let mut terminal = FakeTerminal::new(breakout_candles(), quote(0));
    let mut journal = MemoryJournal::default();
    let notifier = Collect::default();
    let management = ManagementConfig {
        breakeven: Some(BreakevenConfig {
            trigger_pips: 10.0,
            trigger_fraction: 0.0,
        }),
        trailing: None,
    };
    let mut engine = engine(GuardConfig::default(), management);
    terminal.positions.push(BrokerPosition {
        id: PositionId(7),
        strategy_id: engine.strategy_id(),
        symbol: "EURUSD".into(),
        direction: Direction::Long,
        volume: 0.1,
        entry_price: 1.10100,
        stop_loss: 1.09900,
        take_profit: 1.10500,
        opened_at: start(),
    });

    // first modify is rejected: stop and phase unchanged, retried next poll
    terminal.reject_modifies = true;
    let report = engine.run_cycle(&mut terminal, &mut journal, &notifier);
    assert_eq!(report.stop_rejections, 1);
    let tracked = engine.positions().next().unwrap();
    assert_eq!(tracked.phase, StopPhase::Initial);
    assert_eq!(tracked.current_stop, 1.09900);

    terminal.reject_modifies = false;
    terminal.quote = quote(1);
    let report = engine.run_cycle(&mut terminal, &mut journal, &notifier);
    assert_eq!(report.stops_modified, 1);
    let tracked = engine.positions().next().unwrap();
    assert_eq!(tracked.phase, StopPhase::Breakeven);
    assert_eq!(tracked.current_stop, 1.10100);

    // already at entry: nothing more is sent
    terminal.quote = quote(2);
    engine.run_cycle(&mut terminal, &mut journal, &notifier);
    assert_eq!(terminal.modified.len(), 2);
}
