//! ADX (Average Directional Index), with +DI / −DI.
//!
//! Steps:
//! 1. TR, +DM and −DM from consecutive candles (index 1 onward)
//! 2. Rolling sums of TR, +DM and −DM over `period`
//! 3. +DI = 100 * sum(+DM) / sum(TR), −DI likewise (0 when sum(TR) is 0)
//! 4. DX = 100 * |+DI − −DI| / (+DI + −DI) (0 when both DI are 0)
//! 5. ADX = rolling mean of DX over `period`
//!
//! Produces three series, exposed as separate Indicator instances.
//! Lookback: period for the DI lines, 2 * period − 1 for ADX.

use crate::components::indicator::Indicator;
use crate::domain::Candle;
use crate::indicators::sma::rolling_mean;

/// Which ADX output line to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdxLine {
    Adx,
    PlusDi,
    MinusDi,
}

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    line: AdxLine,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self::line(period, AdxLine::Adx)
    }

    pub fn plus_di(period: usize) -> Self {
        Self::line(period, AdxLine::PlusDi)
    }

    pub fn minus_di(period: usize) -> Self {
        Self::line(period, AdxLine::MinusDi)
    }

    fn line(period: usize, line: AdxLine) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        let name = match line {
            AdxLine::Adx => format!("adx_{period}"),
            AdxLine::PlusDi => format!("plus_di_{period}"),
            AdxLine::MinusDi => format!("minus_di_{period}"),
        };
        Self { period, line, name }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            AdxLine::Adx => 2 * self.period - 1,
            AdxLine::PlusDi | AdxLine::MinusDi => self.period,
        }
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let lines = directional_lines(candles, self.period);
        match self.line {
            AdxLine::Adx => lines.adx,
            AdxLine::PlusDi => lines.plus_di,
            AdxLine::MinusDi => lines.minus_di,
        }
    }
}

struct DirectionalLines {
    plus_di: Vec<f64>,
    minus_di: Vec<f64>,
    adx: Vec<f64>,
}

fn directional_lines(candles: &[Candle], period: usize) -> DirectionalLines {
    let n = candles.len();
    let mut tr = vec![f64::NAN; n];
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let (cur, prev) = (&candles[i], &candles[i - 1]);
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        tr[i] = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
        if cur.is_void() || prev.is_void() {
            tr[i] = f64::NAN;
            plus_dm[i] = f64::NAN;
            minus_dm[i] = f64::NAN;
        }
    }

    // Ratios of rolling means equal ratios of rolling sums.
    let tr_avg = rolling_mean(&tr, period);
    let plus_avg = rolling_mean(&plus_dm, period);
    let minus_avg = rolling_mean(&minus_dm, period);

    let mut plus_di = vec![f64::NAN; n];
    let mut minus_di = vec![f64::NAN; n];
    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if tr_avg[i].is_nan() || plus_avg[i].is_nan() || minus_avg[i].is_nan() {
            continue;
        }
        let (p, m) = if tr_avg[i] == 0.0 {
            (0.0, 0.0)
        } else {
            (100.0 * plus_avg[i] / tr_avg[i], 100.0 * minus_avg[i] / tr_avg[i])
        };
        plus_di[i] = p;
        minus_di[i] = m;
        dx[i] = if p + m == 0.0 { 0.0 } else { 100.0 * (p - m).abs() / (p + m) };
    }

    let adx = rolling_mean(&dx, period);
    DirectionalLines {
        plus_di,
        minus_di,
        adx,
    }
}
