//! UT-Bot: ATR trailing stop with a position flag.
//!
//! n_loss = sensitivity * ATR(period), src = close (or Heiken-Ashi close).
//! With `ps` the previous stop and `pv` the previous source value:
//! - src > ps and pv > ps: stop = max(ps, src - n_loss)
//! - src < ps and pv < ps: stop = min(ps, src + n_loss)
//! - src > ps:             stop = src - n_loss
//! - otherwise:            stop = src + n_loss
//!
//! Position flag: +1 when src crosses up through ps, -1 when it crosses down,
//! otherwise carried. A neutral carried flag is set from src vs the new stop.
//! Before the first defined ATR the previous stop is 0.0 and the flag neutral.
//!
//! Two series (Stop, Position). Lookback: period - 1.

use crate::components::indicator::Indicator;
use crate::domain::Candle;
use crate::indicators::atr::Atr;
use crate::indicators::heiken_ashi::heiken_ashi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtBotLine {
    Stop,
    Position,
}

#[derive(Debug, Clone)]
pub struct UtBot {
    sensitivity: f64,
    atr_period: usize,
    heiken_ashi: bool,
    line: UtBotLine,
    name: String,
}

impl UtBot {
    pub fn stop(sensitivity: f64, atr_period: usize, heiken_ashi: bool) -> Self {
        Self::line(sensitivity, atr_period, heiken_ashi, UtBotLine::Stop)
    }

    pub fn position(sensitivity: f64, atr_period: usize, heiken_ashi: bool) -> Self {
        Self::line(sensitivity, atr_period, heiken_ashi, UtBotLine::Position)
    }

    fn line(sensitivity: f64, atr_period: usize, heiken_ashi: bool, line: UtBotLine) -> Self {
        assert!(atr_period >= 1, "UT-Bot ATR period must be >= 1");
        let kind = match line {
            UtBotLine::Stop => "stop",
            UtBotLine::Position => "pos",
        };
        let suffix = if heiken_ashi { "_ha" } else { "" };
        Self {
            sensitivity,
            atr_period,
            heiken_ashi,
            line,
            name: format!("ut_{kind}_{sensitivity}_{atr_period}{suffix}"),
        }
    }
}

impl Indicator for UtBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.atr_period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let src: Vec<f64> = if self.heiken_ashi {
            heiken_ashi(candles).iter().map(|c| c.close).collect()
        } else {
            candles.iter().map(|c| c.close).collect()
        };
        let atr = Atr::new(self.atr_period).compute(candles);
        let (stops, flags) = trailing_stop(&src, &atr, self.sensitivity);
        match self.line {
            UtBotLine::Stop => stops,
            UtBotLine::Position => flags,
        }
    }
}

/// Run the UT-Bot fold. Returns (stop, position flag); both NaN while ATR is undefined.
pub fn trailing_stop(src: &[f64], atr: &[f64], sensitivity: f64) -> (Vec<f64>, Vec<f64>) {
    let n = src.len();
    let mut stops = vec![f64::NAN; n];
    let mut flags = vec![f64::NAN; n];

    let mut prev_stop = 0.0;
    let mut prev_flag = 0.0;
    for i in 0..n {
        if atr[i].is_nan() || src[i].is_nan() {
            continue;
        }
        let s = src[i];
        let pv = if i == 0 { s } else { src[i - 1] };
        let n_loss = sensitivity * atr[i];

        let stop = if s > prev_stop && pv > prev_stop {
            prev_stop.max(s - n_loss)
        } else if s < prev_stop && pv < prev_stop {
            prev_stop.min(s + n_loss)
        } else if s > prev_stop {
            s - n_loss
        } else {
            s + n_loss
        };

        let mut flag = if pv < prev_stop && s > prev_stop {
            1.0
        } else if pv > prev_stop && s < prev_stop {
            -1.0
        } else {
            prev_flag
        };
        if flag == 0.0 {
            flag = if s > stop {
                1.0
            } else if s < stop {
                -1.0
            } else {
                0.0
            };
        }

        stops[i] = stop;
        flags[i] = flag;
        prev_stop = stop;
        prev_flag = flag;
    }

    (stops, flags)
}
