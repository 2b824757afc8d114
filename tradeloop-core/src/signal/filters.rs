//! Non-trigger filters.
//!
//! Each filter reads the latest closed candle of its timeframe and compares it
//! against the candidate direction. Undefined inputs fail closed. Directional
//! filters without a candidate direction record `NoSetup`.

use super::config::FilterSpec;
use super::evaluator::EvalContext;
use super::trail::{FilterEvaluation, FilterVerdict};
use crate::components::Indicator;
use crate::domain::{Direction, Timeframe};
use crate::indicators::{Adx, Atr, PriceSource, Rsi, Sma};
use chrono::Timelike;

pub fn evaluate(spec: &FilterSpec, ctx: &EvalContext<'_>, candidate: Option<Direction>) -> FilterEvaluation {
    let name = spec.name();
    match *spec {
        FilterSpec::Trend { timeframe, kind, period } => {
            let key = kind.key(period);
            let Some((close, ma)) = latest(ctx, timeframe, |frame, i| {
                Some((frame.candle(i)?.close, frame.value(&key, i)?))
            }) else {
                return FilterEvaluation::new(name, FilterVerdict::Undefined);
            };
            let verdict = match candidate {
                None => FilterVerdict::NoSetup,
                Some(Direction::Long) if close > ma => FilterVerdict::Passed,
                Some(Direction::Short) if close < ma => FilterVerdict::Passed,
                Some(_) => FilterVerdict::FilteredByTrend,
            };
            FilterEvaluation::new(name, verdict).with("close", close).with("ma", ma)
        }
        FilterSpec::Adx {
            timeframe,
            period,
            min,
            require_di_alignment,
        } => {
            let (adx_key, plus_key, minus_key) = (Adx::new(period), Adx::plus_di(period), Adx::minus_di(period));
            let Some((adx, plus, minus)) = latest(ctx, timeframe, |frame, i| {
                Some((
                    frame.value(adx_key.name(), i)?,
                    frame.value(plus_key.name(), i)?,
                    frame.value(minus_key.name(), i)?,
                ))
            }) else {
                return FilterEvaluation::new(name, FilterVerdict::Undefined);
            };
            let aligned = match candidate {
                Some(Direction::Long) => plus > minus,
                Some(Direction::Short) => minus > plus,
                None => false,
            };
            let verdict = if adx < min {
                FilterVerdict::FilteredByAdx
            } else if !require_di_alignment {
                FilterVerdict::Passed
            } else if candidate.is_none() {
                FilterVerdict::NoSetup
            } else if aligned {
                FilterVerdict::Passed
            } else {
                FilterVerdict::FilteredByAdx
            };
            FilterEvaluation::new(name, verdict)
                .with("adx", adx)
                .with("min", min)
                .with("plus_di", plus)
                .with("minus_di", minus)
        }
        FilterSpec::Volatility {
            timeframe,
            atr_period,
            min_pips,
            max_pips,
        } => {
            let key = Atr::new(atr_period);
            let Some(atr) = latest(ctx, timeframe, |frame, i| frame.value(key.name(), i)) else {
                return FilterEvaluation::new(name, FilterVerdict::Undefined);
            };
            let atr_pips = ctx.instrument.price_to_pips(atr);
            let verdict = if (min_pips..=max_pips).contains(&atr_pips) {
                FilterVerdict::Passed
            } else {
                FilterVerdict::FilteredByVolatility
            };
            FilterEvaluation::new(name, verdict)
                .with("atr_pips", atr_pips)
                .with("min_pips", min_pips)
                .with("max_pips", max_pips)
        }
        FilterSpec::Rsi {
            timeframe,
            period,
            buy_above,
            sell_below,
            require_slope,
        } => {
            let key = Rsi::new(period);
            let Some((rsi, prev)) = latest(ctx, timeframe, |frame, i| {
                Some((frame.value(key.name(), i)?, frame.value(key.name(), i.checked_sub(1)?)?))
            }) else {
                return FilterEvaluation::new(name, FilterVerdict::Undefined);
            };
            let verdict = match candidate {
                None => FilterVerdict::NoSetup,
                Some(Direction::Long) if rsi > buy_above && (!require_slope || rsi > prev) => FilterVerdict::Passed,
                Some(Direction::Short) if rsi < sell_below && (!require_slope || rsi < prev) => {
                    FilterVerdict::Passed
                }
                Some(_) => FilterVerdict::FilteredByRsi,
            };
            FilterEvaluation::new(name, verdict)
                .with("rsi", rsi)
                .with("prev_rsi", prev)
                .with("buy_above", buy_above)
                .with("sell_below", sell_below)
        }
        FilterSpec::Volume {
            timeframe,
            period,
            multiplier,
        } => {
            let key = Sma::of(PriceSource::Volume, period);
            let Some((volume, average)) = latest(ctx, timeframe, |frame, i| {
                Some((frame.candle(i)?.tick_volume as f64, frame.value(key.name(), i)?))
            }) else {
                return FilterEvaluation::new(name, FilterVerdict::Undefined);
            };
            let verdict = if volume > multiplier * average {
                FilterVerdict::Passed
            } else {
                FilterVerdict::FilteredByVolume
            };
            FilterEvaluation::new(name, verdict)
                .with("volume", volume)
                .with("average", average)
                .with("multiplier", multiplier)
        }
        FilterSpec::Session { start_hour, end_hour } => {
            let hour = ctx.quote.time.hour();
            let verdict = if in_session(hour, start_hour, end_hour) {
                FilterVerdict::Passed
            } else {
                FilterVerdict::OutsideSession
            };
            FilterEvaluation::new(name, verdict)
                .with("hour", hour as f64)
                .with("start_hour", start_hour as f64)
                .with("end_hour", end_hour as f64)
        }
        FilterSpec::Trigger(ref trigger) => super::triggers::evaluate(trigger, ctx, candidate),
    }
}

/// Read values at the latest closed candle of `timeframe`.
fn latest<T>(
    ctx: &EvalContext<'_>,
    timeframe: Timeframe,
    read: impl FnOnce(&crate::components::IndicatorFrame, usize) -> Option<T>,
) -> Option<T> {
    let frame = ctx.frames.get(timeframe)?;
    read(frame, frame.last_index()?)
}

/// Hour in [start, end), wrapping past midnight when start > end.
/// start == end means the whole day.
pub fn in_session(hour: u32, start: u32, end: u32) -> bool {
    if start == end {
        true
    } else if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}
