//! Paper terminal: replays an M1 history as if it were a live broker.
//!
//! The candle under the cursor is the forming candle and its close is the
//! current bid (ask = bid + spread). Higher timeframes are resampled from M1.
//! Market orders fill at the ask (long) or bid (short). Each step forward
//! checks stops and targets against the new candle's range; when both are
//! inside one candle the stop is assumed to fill first.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use tradeloop_core::domain::{
    resample, AccountInfo, BrokerPosition, BrokerRejection, Candle, ClosedTrade, Direction, InstrumentSpec,
    OrderRequest, OrderTicket, PositionId, Quote, StopModification, StrategyId, Timeframe,
};
use tradeloop_core::engine::{Broker, DataUnavailable, MarketData};

use crate::driver::Terminal;

/// Retcodes used by the paper broker (terminal numbering).
pub mod retcode {
    pub const INVALID_VOLUME: u32 = 10014;
    pub const INVALID_STOPS: u32 = 10016;
    pub const MARKET_CLOSED: u32 = 10018;
    pub const POSITION_NOT_FOUND: u32 = 10036;
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("candle history is empty")]
    Empty,

    #[error("need at least {needed} M1 candles of warm-up, have {available}")]
    NotEnoughHistory { needed: usize, available: usize },

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// Simulated account and execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub login: u64,
    pub balance: f64,
    pub currency: String,
    /// Fixed spread in points.
    pub spread_points: f64,
    /// M1 candles exposed before the first cycle.
    pub warmup_candles: usize,
    /// Contract metadata. Defaults to a 5-digit forex major.
    pub instrument: Option<InstrumentSpec>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            login: 1,
            balance: 10_000.0,
            currency: "USD".into(),
            spread_points: 10.0,
            warmup_candles: 3_000,
            instrument: None,
        }
    }
}

pub struct PaperTerminal {
    instrument: InstrumentSpec,
    config: PaperConfig,
    m1: Vec<Candle>,
    cursor: usize,
    balance: f64,
    open: Vec<BrokerPosition>,
    closed: HashMap<PositionId, ClosedTrade>,
    history: Vec<ClosedTrade>,
    next_ticket: u64,
}

impl PaperTerminal {
    pub fn new(instrument: InstrumentSpec, m1: Vec<Candle>, config: PaperConfig) -> Result<Self, ReplayError> {
        if m1.is_empty() {
            return Err(ReplayError::Empty);
        }
        if m1.len() <= config.warmup_candles {
            return Err(ReplayError::NotEnoughHistory {
                needed: config.warmup_candles + 1,
                available: m1.len(),
            });
        }
        Ok(Self {
            instrument,
            balance: config.balance,
            cursor: config.warmup_candles,
            config,
            m1,
            open: Vec::new(),
            closed: HashMap::new(),
            history: Vec::new(),
            next_ticket: 1,
        })
    }

    /// Current terminal time: the last second of the forming candle.
    pub fn now(&self) -> DateTime<Utc> {
        self.m1[self.cursor].open_time + chrono::Duration::seconds(59)
    }

    pub fn instrument_spec(&self) -> &InstrumentSpec {
        &self.instrument
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn remaining(&self) -> usize {
        self.m1.len() - 1 - self.cursor
    }

    /// Every trade closed so far, in closing order.
    pub fn trade_history(&self) -> &[ClosedTrade] {
        &self.history
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &BrokerPosition> {
        self.open.iter()
    }

    fn spread(&self) -> f64 {
        self.config.spread_points * self.instrument.point
    }

    fn current_quote(&self) -> Quote {
        let bid = self.m1[self.cursor].close;
        Quote {
            time: self.now(),
            bid,
            ask: bid + self.spread(),
        }
    }

    fn profit(&self, direction: Direction, volume: f64, entry: f64, exit: f64) -> f64 {
        direction.favorable_move(entry, exit) / self.instrument.tick_size * self.instrument.tick_value * volume
    }

    fn close_position(&mut self, index: usize, exit_price: f64, closed_at: DateTime<Utc>, reason: &str) {
        let p = self.open.remove(index);
        let profit = self.profit(p.direction, p.volume, p.entry_price, exit_price);
        self.balance += profit;
        info!(position = %p.id, %reason, exit = exit_price, profit, balance = self.balance, "paper position closed");
        let trade = ClosedTrade {
            position_id: p.id,
            symbol: p.symbol,
            direction: p.direction,
            volume: p.volume,
            entry_price: p.entry_price,
            exit_price,
            closed_at,
            profit,
        };
        self.closed.insert(trade.position_id, trade.clone());
        self.history.push(trade);
    }

    /// Apply stop and target hits inside the candle at the cursor.
    fn settle(&mut self) {
        let candle = self.m1[self.cursor];
        let spread = self.spread();
        let closed_at = self.now();
        let mut index = 0;
        while index < self.open.len() {
            let p = &self.open[index];
            // longs close on the bid, shorts on the ask
            let (low, high) = match p.direction {
                Direction::Long => (candle.low, candle.high),
                Direction::Short => (candle.low + spread, candle.high + spread),
            };
            let stop_hit = p.stop_loss > 0.0
                && match p.direction {
                    Direction::Long => low <= p.stop_loss,
                    Direction::Short => high >= p.stop_loss,
                };
            let target_hit = p.take_profit > 0.0
                && match p.direction {
                    Direction::Long => high >= p.take_profit,
                    Direction::Short => low <= p.take_profit,
                };
            if stop_hit {
                let exit = p.stop_loss;
                self.close_position(index, exit, closed_at, "stop");
            } else if target_hit {
                let exit = p.take_profit;
                self.close_position(index, exit, closed_at, "target");
            } else {
                index += 1;
            }
        }
    }

    /// Stops must sit on the losing side of the current exit price, targets on the winning side.
    fn check_levels(direction: Direction, exit_price: f64, stop: f64, target: f64) -> Result<(), BrokerRejection> {
        if stop > 0.0 && direction.favorable_move(stop, exit_price) <= 0.0 {
            return Err(BrokerRejection::new(
                retcode::INVALID_STOPS,
                format!("stop {stop} is not below/above price {exit_price}"),
            ));
        }
        if target > 0.0 && direction.favorable_move(exit_price, target) <= 0.0 {
            return Err(BrokerRejection::new(
                retcode::INVALID_STOPS,
                format!("target {target} is not beyond price {exit_price}"),
            ));
        }
        Ok(())
    }

    fn knows(&self, symbol: &str) -> bool {
        symbol == self.instrument.symbol
    }
}

impl MarketData for PaperTerminal {
    fn candles(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>, DataUnavailable> {
        if !self.knows(symbol) || count == 0 {
            return Err(DataUnavailable::Candles {
                symbol: symbol.to_string(),
                timeframe,
            });
        }
        let visible = &self.m1[..=self.cursor];
        if timeframe == Timeframe::M1 {
            let start = visible.len().saturating_sub(count);
            return Ok(visible[start..].to_vec());
        }

        // Only the tail that can contribute to the last `count` buckets.
        let span = (count + 1).saturating_mul(timeframe.minutes() as usize);
        let start = visible.len().saturating_sub(span);
        let mut resampled = resample(&visible[start..], timeframe);
        // A bucket cut by the window start is incomplete.
        if start > 0 && !resampled.is_empty() && timeframe.floor(visible[start - 1].open_time) == resampled[0].open_time
        {
            resampled.remove(0);
        }
        let skip = resampled.len().saturating_sub(count);
        Ok(resampled.split_off(skip))
    }

    fn quote(&self, symbol: &str) -> Option<Quote> {
        self.knows(symbol).then(|| self.current_quote())
    }

    fn instrument(&self, symbol: &str) -> Option<InstrumentSpec> {
        self.knows(symbol).then(|| self.instrument.clone())
    }
}

impl Broker for PaperTerminal {
    fn account(&self) -> Result<AccountInfo, DataUnavailable> {
        let quote = self.current_quote();
        let floating: f64 = self
            .open
            .iter()
            .map(|p| {
                self.profit(p.direction, p.volume, p.entry_price, p.direction.exit_price(&quote))
            })
            .sum();
        Ok(AccountInfo {
            login: self.config.login,
            balance: self.balance,
            equity: self.balance + floating,
            currency: self.config.currency.clone(),
        })
    }

    fn positions(&self, symbol: &str, strategy_id: StrategyId) -> Vec<BrokerPosition> {
        self.open
            .iter()
            .filter(|p| p.symbol == symbol && p.strategy_id == strategy_id)
            .cloned()
            .collect()
    }

    fn submit(&mut self, request: &OrderRequest) -> Result<OrderTicket, BrokerRejection> {
        if !self.knows(&request.symbol) {
            return Err(BrokerRejection::new(
                retcode::MARKET_CLOSED,
                format!("unknown symbol {}", request.symbol),
            ));
        }
        let spec = &self.instrument;
        if !(request.volume >= spec.volume_min && request.volume <= spec.volume_max) {
            return Err(BrokerRejection::new(
                retcode::INVALID_VOLUME,
                format!("volume {} outside [{}, {}]", request.volume, spec.volume_min, spec.volume_max),
            ));
        }
        let quote = self.current_quote();
        Self::check_levels(
            request.direction,
            request.direction.exit_price(&quote),
            request.stop_loss,
            request.take_profit,
        )?;

        let id = PositionId(self.next_ticket);
        self.next_ticket += 1;
        let fill_price = request.direction.entry_price(&quote);
        debug!(position = %id, direction = %request.direction, fill_price, "paper fill");
        self.open.push(BrokerPosition {
            id,
            strategy_id: request.strategy_id,
            symbol: request.symbol.clone(),
            direction: request.direction,
            volume: request.volume,
            entry_price: fill_price,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            opened_at: quote.time,
        });
        Ok(OrderTicket {
            position_id: id,
            fill_price,
            volume: request.volume,
        })
    }

    fn modify_stop(&mut self, modification: &StopModification) -> Result<(), BrokerRejection> {
        let quote = self.current_quote();
        let Some(p) = self.open.iter_mut().find(|p| p.id == modification.position_id) else {
            return Err(BrokerRejection::new(
                retcode::POSITION_NOT_FOUND,
                format!("position {} not found", modification.position_id),
            ));
        };
        Self::check_levels(p.direction, p.direction.exit_price(&quote), modification.new_stop, modification.take_profit)?;
        p.stop_loss = modification.new_stop;
        p.take_profit = modification.take_profit;
        Ok(())
    }

    fn closed_trade(&self, position_id: PositionId) -> Option<ClosedTrade> {
        self.closed.get(&position_id).cloned()
    }
}

impl Terminal for PaperTerminal {
    /// Step forward one M1 candle per elapsed minute (at least one),
    /// settling stops and targets on every candle passed.
    fn advance(&mut self, elapsed: Duration) -> bool {
        let steps = (elapsed.as_secs() / 60).max(1);
        for _ in 0..steps {
            if self.cursor + 1 >= self.m1.len() {
                return false;
            }
            self.cursor += 1;
            self.settle();
        }
        true
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default, alias = "tick_volume")]
    volume: u64,
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y.%m.%d %H:%M:%S", "%Y.%m.%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Load M1 candles from CSV with a `time,open,high,low,close[,volume]` header.
///
/// Times are RFC 3339 or `YYYY-MM-DD HH:MM[:SS]` (dots accepted as date separators)
/// in broker-server time. Rows must be strictly ascending and OHLC-sane.
pub fn load_m1_csv(path: &Path) -> Result<Vec<Candle>, ReplayError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut candles: Vec<Candle> = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = i + 2;
        let row = row?;
        let open_time = parse_time(&row.time).ok_or_else(|| ReplayError::InvalidRow {
            line,
            reason: format!("unparseable time '{}'", row.time),
        })?;
        let candle = Candle {
            open_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            tick_volume: row.volume,
        };
        if !candle.is_sane() {
            return Err(ReplayError::InvalidRow {
                line,
                reason: "OHLC values are inconsistent".into(),
            });
        }
        if candles.last().is_some_and(|prev| prev.open_time >= open_time) {
            return Err(ReplayError::InvalidRow {
                line,
                reason: format!("time {open_time} is not after the previous row"),
            });
        }
        candles.push(candle);
    }
    if candles.is_empty() {
        return Err(ReplayError::Empty);
    }
    Ok(candles)
}
