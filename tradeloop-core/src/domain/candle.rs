//! Candles, timeframes and per-timeframe candle series.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle for a single symbol on a single timeframe.
///
/// `open_time` is broker-server time. A candle is immutable once closed; the
/// newest candle a terminal returns is usually still forming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: u64,
}

impl Candle {
    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

/// Chart timeframe. Serialized with the terminal's names (`M1`, `H1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    /// Start of the candle of this timeframe containing `time`.
    pub fn floor(self, time: DateTime<Utc>) -> DateTime<Utc> {
        let width = self.minutes() * 60;
        let secs = time.timestamp().div_euclid(width) * width;
        Utc.timestamp_opt(secs, 0).single().unwrap_or(time)
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown timeframe '{s}'"))
    }
}

/// Time-ascending candles for one (symbol, timeframe) pair.
///
/// The last candle is treated as still forming: every backward-looking
/// calculation that feeds a decision works on [`CandleSeries::closed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            candles,
        }
    }

    /// All candles except the newest (forming) one.
    pub fn closed(&self) -> &[Candle] {
        match self.candles.len() {
            0 => &[],
            n => &self.candles[..n - 1],
        }
    }

    /// The most recently closed candle.
    pub fn last_closed(&self) -> Option<&Candle> {
        self.closed().last()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// Aggregate time-ascending candles into a coarser timeframe.
///
/// Buckets are aligned with [`Timeframe::floor`]. The last bucket is emitted
/// even if incomplete, which keeps it in the "forming" position.
pub fn resample(candles: &[Candle], timeframe: Timeframe) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::new();
    for c in candles {
        let bucket = timeframe.floor(c.open_time);
        match out.last_mut() {
            Some(last) if last.open_time == bucket => {
                last.high = last.high.max(c.high);
                last.low = last.low.min(c.low);
                last.close = c.close;
                last.tick_volume += c.tick_volume;
            }
            _ => out.push(Candle {
                open_time: bucket,
                ..*c
            }),
        }
    }
    out
}
