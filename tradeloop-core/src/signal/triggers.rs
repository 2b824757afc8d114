//! Entry triggers.
//!
//! Each trigger has two halves. [`candidate`] is the raw market read (which
//! side price broke, which way the EMAs point, the UT-Bot flag) and fixes the
//! direction every directional filter is judged against. [`evaluate`] then
//! applies the trigger's own rules (freshness, vetoes, confirmation) and
//! produces its trail entry.

use super::config::TriggerConfig;
use super::evaluator::EvalContext;
use super::trail::{FilterEvaluation, FilterVerdict};
use crate::components::{Indicator, IndicatorFrame};
use crate::domain::{Candle, Direction};
use crate::indicators::{is_doji, Donchian, Ema, HaChannel, HeikenAshi, UtBot};

/// Direction implied by the trigger's raw read of the latest closed candle.
pub fn candidate(trigger: &TriggerConfig, ctx: &EvalContext<'_>) -> Option<Direction> {
    let frame = ctx.frames.get(trigger.timeframe())?;
    let i = frame.last_index()?;
    match *trigger {
        TriggerConfig::Donchian { period, buffer_pips, .. } => {
            let buffer = ctx.instrument.pips_to_price(buffer_pips);
            let close = frame.candle(i)?.close;
            let upper = frame.value(Donchian::upper(period).name(), i.checked_sub(1)?)?;
            let lower = frame.value(Donchian::lower(period).name(), i.checked_sub(1)?)?;
            side_of_band(close, upper + buffer, lower - buffer)
        }
        TriggerConfig::HeikenAshiChannel { period, buffer_pips, .. } => {
            let buffer = ctx.instrument.pips_to_price(buffer_pips);
            let ha_close = frame.value(HeikenAshi::close().name(), i)?;
            let upper = frame.value(HaChannel::upper(period).name(), i)?;
            let lower = frame.value(HaChannel::lower(period).name(), i)?;
            side_of_band(ha_close, upper + buffer, lower - buffer)
        }
        TriggerConfig::EmaCross { fast, slow, .. } => {
            let diff = frame.value(Ema::new(fast).name(), i)? - frame.value(Ema::new(slow).name(), i)?;
            direction_of(diff)
        }
        TriggerConfig::UtBot {
            sensitivity,
            atr_period,
            heiken_ashi,
            ..
        } => {
            let flag = frame.value(UtBot::position(sensitivity, atr_period, heiken_ashi).name(), i)?;
            direction_of(flag)
        }
    }
}

fn side_of_band(price: f64, upper: f64, lower: f64) -> Option<Direction> {
    if price > upper {
        Some(Direction::Long)
    } else if price < lower {
        Some(Direction::Short)
    } else {
        None
    }
}

fn direction_of(value: f64) -> Option<Direction> {
    if value > 0.0 {
        Some(Direction::Long)
    } else if value < 0.0 {
        Some(Direction::Short)
    } else {
        None
    }
}

/// Apply the trigger's rules for `candidate` and record the verdict.
pub fn evaluate(trigger: &TriggerConfig, ctx: &EvalContext<'_>, candidate: Option<Direction>) -> FilterEvaluation {
    let name = trigger.name();
    let Some(frame) = ctx.frames.get(trigger.timeframe()) else {
        return FilterEvaluation::new(name, FilterVerdict::Undefined);
    };
    let (verdict, state) = match *trigger {
        TriggerConfig::Donchian { period, buffer_pips, .. } => {
            donchian(frame, period, ctx.instrument.pips_to_price(buffer_pips), candidate)
        }
        TriggerConfig::HeikenAshiChannel {
            period,
            buffer_pips,
            doji_threshold,
            ..
        } => heiken_ashi_channel(
            frame,
            period,
            ctx.instrument.pips_to_price(buffer_pips),
            doji_threshold,
            candidate,
        ),
        TriggerConfig::EmaCross {
            fast,
            slow,
            confirmation_candles,
            require_momentum,
            ..
        } => ema_cross(frame, fast, slow, confirmation_candles, require_momentum, candidate),
        TriggerConfig::UtBot {
            sensitivity,
            atr_period,
            confirmation_candles,
            require_momentum,
            heiken_ashi,
            ..
        } => {
            let flag_key = UtBot::position(sensitivity, atr_period, heiken_ashi);
            let stop_key = UtBot::stop(sensitivity, atr_period, heiken_ashi);
            ut_bot(
                frame,
                flag_key.name(),
                stop_key.name(),
                confirmation_candles,
                require_momentum,
                candidate,
            )
        }
    };
    FilterEvaluation {
        filter: name.to_string(),
        verdict,
        state,
    }
}

type Outcome = (FilterVerdict, std::collections::BTreeMap<String, f64>);

/// Build a verdict with its state, leaving out non-finite values.
fn outcome(verdict: FilterVerdict, state: &[(&str, f64)]) -> Outcome {
    (
        verdict,
        state
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
    )
}

fn undefined() -> Outcome {
    outcome(FilterVerdict::Undefined, &[])
}

/// Breakout of the channel of the previous `period` candles.
///
/// Long: the previous candle must not already have closed above the channel
/// before it (stale), nor wicked above it and closed back inside (false).
fn donchian(frame: &IndicatorFrame, period: usize, buffer: f64, candidate: Option<Direction>) -> Outcome {
    let upper_key = Donchian::upper(period);
    let lower_key = Donchian::lower(period);
    let values = (|| {
        let i = frame.last_index()?;
        let candle = frame.candle(i)?;
        let prev = frame.candle(i.checked_sub(1)?)?;
        let upper = frame.value(upper_key.name(), i - 1)?;
        let lower = frame.value(lower_key.name(), i - 1)?;
        let upper_pp = frame.value(upper_key.name(), i.checked_sub(2)?)?;
        let lower_pp = frame.value(lower_key.name(), i - 2)?;
        Some((*candle, *prev, upper, lower, upper_pp, lower_pp))
    })();
    let Some((candle, prev, upper, lower, upper_pp, lower_pp)) = values else {
        return undefined();
    };
    let state = [
        ("close", candle.close),
        ("upper", upper),
        ("lower", lower),
        ("buffer", buffer),
        ("prev_close", prev.close),
    ];

    let verdict = match candidate {
        None => FilterVerdict::NoSetup,
        Some(Direction::Long) => {
            if prev.close > upper_pp {
                FilterVerdict::StaleBreakout
            } else if prev.high > upper_pp {
                FilterVerdict::FalseBreakout
            } else if candle.close > upper + buffer {
                FilterVerdict::Passed
            } else {
                FilterVerdict::NoSetup
            }
        }
        Some(Direction::Short) => {
            if prev.close < lower_pp {
                FilterVerdict::StaleBreakout
            } else if prev.low < lower_pp {
                FilterVerdict::FalseBreakout
            } else if candle.close < lower - buffer {
                FilterVerdict::Passed
            } else {
                FilterVerdict::NoSetup
            }
        }
    };
    outcome(verdict, &state)
}

fn heiken_ashi_channel(
    frame: &IndicatorFrame,
    period: usize,
    buffer: f64,
    doji_threshold: f64,
    candidate: Option<Direction>,
) -> Outcome {
    let upper_key = HaChannel::upper(period);
    let lower_key = HaChannel::lower(period);
    let values = (|| {
        let i = frame.last_index()?;
        let p = i.checked_sub(1)?;
        let ha = Candle {
            open_time: frame.candle(i)?.open_time,
            open: frame.value(HeikenAshi::open().name(), i)?,
            high: frame.value(HeikenAshi::high().name(), i)?,
            low: frame.value(HeikenAshi::low().name(), i)?,
            close: frame.value(HeikenAshi::close().name(), i)?,
            tick_volume: 0,
        };
        Some((
            ha,
            frame.value(upper_key.name(), i)?,
            frame.value(lower_key.name(), i)?,
            frame.value(HeikenAshi::close().name(), p)?,
            frame.value(upper_key.name(), p)?,
            frame.value(lower_key.name(), p)?,
        ))
    })();
    let Some((ha, upper, lower, prev_close, prev_upper, prev_lower)) = values else {
        return undefined();
    };
    let state = [
        ("ha_close", ha.close),
        ("upper", upper),
        ("lower", lower),
        ("prev_ha_close", prev_close),
    ];

    let verdict = match candidate {
        None => FilterVerdict::NoSetup,
        Some(direction) => {
            let fresh = match direction {
                Direction::Long => prev_close <= prev_upper + buffer,
                Direction::Short => prev_close >= prev_lower - buffer,
            };
            if !fresh {
                FilterVerdict::StaleBreakout
            } else if is_doji(&ha, doji_threshold) {
                FilterVerdict::DojiCandle
            } else {
                FilterVerdict::Passed
            }
        }
    };
    outcome(verdict, &state)
}

/// Candles since the latest flip into alignment, 0 meaning the flip is at the
/// last element. `None` when the window holds no flip.
fn flip_age(aligned: &[bool]) -> Option<usize> {
    let run = aligned.iter().rev().take_while(|a| **a).count();
    (run > 0 && run < aligned.len()).then(|| run - 1)
}

/// Last step is positive in `direction` and larger than the step before it.
fn accelerating(series: [f64; 3], direction: Direction) -> bool {
    let step = direction.sign() * (series[2] - series[1]);
    let prior = direction.sign() * (series[1] - series[0]);
    step > 0.0 && step > prior
}

/// Shared confirmation rule for crossover-style triggers.
///
/// Passes when the flip happened 1..=`confirmation` candles ago and has held
/// since, or happened on the latest candle (accelerating, if required).
fn confirm(age: Option<usize>, confirmation: usize, momentum: Option<bool>) -> FilterVerdict {
    match age {
        Some(0) if momentum.unwrap_or(true) => FilterVerdict::Passed,
        Some(a) if a >= 1 && a <= confirmation => FilterVerdict::Passed,
        _ => FilterVerdict::NoSetup,
    }
}

fn ema_cross(
    frame: &IndicatorFrame,
    fast: usize,
    slow: usize,
    confirmation: usize,
    require_momentum: bool,
    candidate: Option<Direction>,
) -> Outcome {
    let fast_key = Ema::new(fast);
    let slow_key = Ema::new(slow);
    let Some(direction) = candidate else {
        return outcome(FilterVerdict::NoSetup, &[]);
    };
    let window = (|| {
        let i = frame.last_index()?;
        let start = i.checked_sub(confirmation + 1)?;
        let aligned = (start..=i)
            .map(|k| {
                let diff = frame.value(fast_key.name(), k)? - frame.value(slow_key.name(), k)?;
                Some(direction.sign() * diff > 0.0)
            })
            .collect::<Option<Vec<bool>>>()?;
        let fast_tail = [
            frame.value(fast_key.name(), i.checked_sub(2)?)?,
            frame.value(fast_key.name(), i - 1)?,
            frame.value(fast_key.name(), i)?,
        ];
        Some((aligned, fast_tail))
    })();
    let Some((aligned, fast_tail)) = window else {
        return undefined();
    };

    let age = flip_age(&aligned);
    let momentum = require_momentum.then(|| accelerating(fast_tail, direction));
    let verdict = confirm(age, confirmation, momentum);
    let mut state = vec![("fast", fast_tail[2])];
    if let Some(age) = age {
        state.push(("cross_age", age as f64));
    }
    if let Some(momentum) = momentum {
        state.push(("accelerating", if momentum { 1.0 } else { 0.0 }));
    }
    outcome(verdict, &state)
}

fn ut_bot(
    frame: &IndicatorFrame,
    flag_key: &str,
    stop_key: &str,
    confirmation: usize,
    require_momentum: bool,
    candidate: Option<Direction>,
) -> Outcome {
    let Some(direction) = candidate else {
        return outcome(FilterVerdict::NoSetup, &[]);
    };
    let window = (|| {
        let i = frame.last_index()?;
        let start = i.checked_sub(confirmation + 1)?;
        let aligned = (start..=i)
            .map(|k| Some(frame.value(flag_key, k)? == direction.sign()))
            .collect::<Option<Vec<bool>>>()?;
        let closes = [
            frame.candle(i.checked_sub(2)?)?.close,
            frame.candle(i - 1)?.close,
            frame.candle(i)?.close,
        ];
        Some((aligned, closes, frame.value(stop_key, i)?))
    })();
    let Some((aligned, closes, stop)) = window else {
        return undefined();
    };

    let age = flip_age(&aligned);
    let momentum = require_momentum.then(|| accelerating(closes, direction));
    let verdict = confirm(age, confirmation, momentum);
    let mut state = vec![("close", closes[2]), ("stop", stop)];
    if let Some(age) = age {
        state.push(("flip_age", age as f64));
    }
    if let Some(momentum) = momentum {
        state.push(("accelerating", if momentum { 1.0 } else { 0.0 }));
    }
    outcome(verdict, &state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::MarketFrames;
    use crate::domain::Timeframe;
    use crate::signal::fixtures::{eurusd, frame, quote};

    fn run(trigger: &TriggerConfig, frames: &MarketFrames) -> (Option<Direction>, FilterEvaluation) {
        let (quote, instrument) = (quote(), eurusd());
        let ctx = EvalContext {
            frames,
            quote: &quote,
            instrument: &instrument,
        };
        let side = candidate(trigger, &ctx);
        (side, evaluate(trigger, &ctx, side))
    }

    const HA: TriggerConfig = TriggerConfig::HeikenAshiChannel {
        timeframe: Timeframe::M1,
        period: 3,
        buffer_pips: 0.0,
        doji_threshold: 0.1,
    };

    fn ha_frames(open: [f64; 2], high: [f64; 2], low: [f64; 2], close: [f64; 2]) -> MarketFrames {
        frame(
            &[1.1000, 1.1020],
            &[],
            &[
                (HeikenAshi::open().name(), open.to_vec()),
                (HeikenAshi::high().name(), high.to_vec()),
                (HeikenAshi::low().name(), low.to_vec()),
                (HeikenAshi::close().name(), close.to_vec()),
                (HaChannel::upper(3).name(), vec![1.1010, 1.1012]),
                (HaChannel::lower(3).name(), vec![1.0990, 1.0992]),
            ],
        )
    }

    #[test]
    fn ha_channel_fresh_breakout_passes() {
        let frames = ha_frames([1.1000, 1.1005], [1.1002, 1.1022], [1.0998, 1.1003], [1.1000, 1.1020]);
        let (side, eval) = run(&HA, &frames);
        assert_eq!(side, Some(Direction::Long));
        assert_eq!(eval.filter, "heiken_ashi_channel");
        assert_eq!(eval.verdict, FilterVerdict::Passed);
        assert_eq!(eval.state["prev_ha_close"], 1.1000);
    }

    #[test]
    fn ha_channel_close_already_outside_is_stale() {
        let frames = ha_frames([1.1000, 1.1005], [1.1016, 1.1022], [1.0998, 1.1003], [1.1015, 1.1020]);
        let (side, eval) = run(&HA, &frames);
        assert_eq!(side, Some(Direction::Long));
        assert_eq!(eval.verdict, FilterVerdict::StaleBreakout);
    }

    #[test]
    fn ha_channel_doji_breakout_is_vetoed() {
        let frames = ha_frames([1.1000, 1.1019], [1.1002, 1.1030], [1.0998, 1.1005], [1.1000, 1.1020]);
        let (side, eval) = run(&HA, &frames);
        assert_eq!(side, Some(Direction::Long));
        assert_eq!(eval.verdict, FilterVerdict::DojiCandle);
    }

    #[test]
    fn ha_channel_inside_has_no_setup() {
        let frames = ha_frames([1.1000, 1.1005], [1.1002, 1.1012], [1.0998, 1.1003], [1.1000, 1.1011]);
        let (side, eval) = run(&HA, &frames);
        assert_eq!(side, None);
        assert_eq!(eval.verdict, FilterVerdict::NoSetup);
    }

    fn ut_bot_config(require_momentum: bool) -> TriggerConfig {
        TriggerConfig::UtBot {
            timeframe: Timeframe::M1,
            sensitivity: 2.0,
            atr_period: 10,
            confirmation_candles: 2,
            require_momentum,
            heiken_ashi: false,
        }
    }

    fn ut_frames(flags: [f64; 4], closes: [f64; 4]) -> MarketFrames {
        frame(
            &closes,
            &[],
            &[
                (UtBot::position(2.0, 10, false).name(), flags.to_vec()),
                (UtBot::stop(2.0, 10, false).name(), vec![1.0990; 4]),
            ],
        )
    }

    #[test]
    fn ut_bot_flip_inside_confirmation_window_passes() {
        let frames = ut_frames([-1.0, -1.0, 1.0, 1.0], [1.1000; 4]);
        let (side, eval) = run(&ut_bot_config(false), &frames);
        assert_eq!(side, Some(Direction::Long));
        assert_eq!(eval.verdict, FilterVerdict::Passed);
        assert_eq!(eval.state["flip_age"], 1.0);
        assert!(!eval.state.contains_key("accelerating"));
    }

    #[test]
    fn ut_bot_fresh_flip_needs_momentum_when_required() {
        let frames = ut_frames([-1.0, -1.0, -1.0, 1.0], [1.0999, 1.1000, 1.1002, 1.1010]);
        let (_, eval) = run(&ut_bot_config(true), &frames);
        assert_eq!(eval.verdict, FilterVerdict::Passed);
        assert_eq!(eval.state["flip_age"], 0.0);
        assert_eq!(eval.state["accelerating"], 1.0);

        let frames = ut_frames([-1.0, -1.0, -1.0, 1.0], [1.0999, 1.1000, 1.1008, 1.1010]);
        let (_, eval) = run(&ut_bot_config(true), &frames);
        assert_eq!(eval.verdict, FilterVerdict::NoSetup);
        assert_eq!(eval.state["accelerating"], 0.0);
    }

    #[test]
    fn ut_bot_without_flip_in_window_has_no_setup() {
        let frames = ut_frames([1.0; 4], [1.1000; 4]);
        let (side, eval) = run(&ut_bot_config(false), &frames);
        assert_eq!(side, Some(Direction::Long));
        assert_eq!(eval.verdict, FilterVerdict::NoSetup);
        assert!(!eval.state.contains_key("flip_age"));
    }

    #[test]
    fn ut_bot_short_flip_at_window_edge_passes() {
        let frames = ut_frames([1.0, -1.0, -1.0, -1.0], [1.1000; 4]);
        let (side, eval) = run(&ut_bot_config(false), &frames);
        assert_eq!(side, Some(Direction::Short));
        assert_eq!(eval.verdict, FilterVerdict::Passed);
        assert_eq!(eval.state["flip_age"], 2.0);
    }

    #[test]
    fn ema_cross_on_latest_candle_without_momentum_check() {
        let trigger = TriggerConfig::EmaCross {
            timeframe: Timeframe::M1,
            fast: 2,
            slow: 5,
            confirmation_candles: 1,
            require_momentum: false,
        };
        let frames = frame(
            &[1.0995, 1.0996, 1.1008],
            &[],
            &[
                (Ema::new(2).name(), vec![1.0995, 1.0996, 1.1008]),
                (Ema::new(5).name(), vec![1.1000, 1.1000, 1.1002]),
            ],
        );
        let (side, eval) = run(&trigger, &frames);
        assert_eq!(side, Some(Direction::Long));
        assert_eq!(eval.verdict, FilterVerdict::Passed);
        assert_eq!(eval.state["cross_age"], 0.0);
        assert!(!eval.state.contains_key("accelerating"));
    }

    #[test]
    fn missing_frame_is_undefined() {
        let (side, eval) = run(&ut_bot_config(false), &MarketFrames::new());
        assert_eq!(side, None);
        assert_eq!(eval.verdict, FilterVerdict::Undefined);
    }

    #[test]
    fn flip_age_detects_latest_flip() {
        assert_eq!(flip_age(&[false, true]), Some(0));
        assert_eq!(flip_age(&[false, true, true]), Some(1));
        assert_eq!(flip_age(&[true, true, true]), None);
        assert_eq!(flip_age(&[true, true, false]), None);
        assert_eq!(flip_age(&[true, false, true]), Some(0));
    }

    #[test]
    fn accelerating_long_and_short() {
        assert!(accelerating([1.0, 1.1, 1.3], Direction::Long));
        assert!(!accelerating([1.0, 1.2, 1.3], Direction::Long));
        assert!(accelerating([1.3, 1.2, 1.0], Direction::Short));
        assert!(!accelerating([1.0, 1.1, 1.3], Direction::Short));
    }

    #[test]
    fn confirm_rules() {
        assert_eq!(confirm(Some(0), 0, None), FilterVerdict::Passed);
        assert_eq!(confirm(Some(0), 3, Some(false)), FilterVerdict::NoSetup);
        assert_eq!(confirm(Some(0), 3, Some(true)), FilterVerdict::Passed);
        assert_eq!(confirm(Some(2), 3, Some(false)), FilterVerdict::Passed);
        assert_eq!(confirm(Some(3), 2, None), FilterVerdict::NoSetup);
        assert_eq!(confirm(None, 3, None), FilterVerdict::NoSetup);
    }
}
