//! Built-in strategy presets.
//!
//! Each preset is just a `StrategyConfig`; the same evaluator runs all of them.

use super::config::{FilterSpec, MovingAverageKind, StrategyConfig, TriggerConfig};
use crate::domain::Timeframe;

/// Names accepted by [`preset`], with a one-line description.
pub const PRESETS: &[(&str, &str)] = &[
    (
        "donchian_breakout",
        "M5 Donchian(20) breakout with H1 EMA trend, ADX, RSI and London/NY session",
    ),
    (
        "heiken_ashi_channel",
        "M5 Heiken-Ashi channel breakout with M15 trend and DI-aligned ADX",
    ),
    (
        "ema_crossover",
        "M5 EMA 9/21 crossover, confirmed or accelerating, with volume and RSI slope",
    ),
    ("ut_bot", "M5 UT-Bot flag flip with H1 trend and session window"),
];

/// Build a preset for `symbol`. Returns `None` for an unknown name.
pub fn preset(name: &str, symbol: &str) -> Option<StrategyConfig> {
    let filters = match name {
        "donchian_breakout" => donchian_breakout(),
        "heiken_ashi_channel" => heiken_ashi_channel(),
        "ema_crossover" => ema_crossover(),
        "ut_bot" => ut_bot(),
        _ => return None,
    };
    Some(StrategyConfig {
        name: name.to_string(),
        symbol: symbol.to_string(),
        filters,
    })
}

fn donchian_breakout() -> Vec<FilterSpec> {
    vec![
        // Regime first: a dead or wild market ends the evaluation immediately.
        FilterSpec::Volatility {
            timeframe: Timeframe::M5,
            atr_period: 14,
            min_pips: 3.0,
            max_pips: 30.0,
        },
        FilterSpec::Trend {
            timeframe: Timeframe::H1,
            kind: MovingAverageKind::Ema,
            period: 50,
        },
        FilterSpec::Adx {
            timeframe: Timeframe::M5,
            period: 14,
            min: 20.0,
            require_di_alignment: false,
        },
        FilterSpec::Trigger(TriggerConfig::Donchian {
            timeframe: Timeframe::M5,
            period: 20,
            buffer_pips: 0.5,
        }),
        FilterSpec::Rsi {
            timeframe: Timeframe::M5,
            period: 14,
            buy_above: 50.0,
            sell_below: 50.0,
            require_slope: false,
        },
        FilterSpec::Session {
            start_hour: 7,
            end_hour: 20,
        },
    ]
}

fn heiken_ashi_channel() -> Vec<FilterSpec> {
    vec![
        FilterSpec::Trend {
            timeframe: Timeframe::M15,
            kind: MovingAverageKind::Ema,
            period: 100,
        },
        FilterSpec::Adx {
            timeframe: Timeframe::M5,
            period: 14,
            min: 20.0,
            require_di_alignment: true,
        },
        FilterSpec::Trigger(TriggerConfig::HeikenAshiChannel {
            timeframe: Timeframe::M5,
            period: 20,
            buffer_pips: 0.0,
            doji_threshold: 0.1,
        }),
        FilterSpec::Session {
            start_hour: 7,
            end_hour: 20,
        },
    ]
}

fn ema_crossover() -> Vec<FilterSpec> {
    vec![
        FilterSpec::Trend {
            timeframe: Timeframe::H1,
            kind: MovingAverageKind::Ema,
            period: 50,
        },
        FilterSpec::Adx {
            timeframe: Timeframe::M5,
            period: 14,
            min: 20.0,
            require_di_alignment: true,
        },
        FilterSpec::Trigger(TriggerConfig::EmaCross {
            timeframe: Timeframe::M5,
            fast: 9,
            slow: 21,
            confirmation_candles: 3,
            require_momentum: true,
        }),
        FilterSpec::Rsi {
            timeframe: Timeframe::M5,
            period: 14,
            buy_above: 50.0,
            sell_below: 50.0,
            require_slope: true,
        },
        FilterSpec::Volume {
            timeframe: Timeframe::M5,
            period: 20,
            multiplier: 1.0,
        },
    ]
}

fn ut_bot() -> Vec<FilterSpec> {
    vec![
        FilterSpec::Trend {
            timeframe: Timeframe::H1,
            kind: MovingAverageKind::Ema,
            period: 50,
        },
        FilterSpec::Trigger(TriggerConfig::UtBot {
            timeframe: Timeframe::M5,
            sensitivity: 1.0,
            atr_period: 10,
            confirmation_candles: 2,
            require_momentum: true,
            heiken_ashi: false,
        }),
        FilterSpec::Adx {
            timeframe: Timeframe::M5,
            period: 14,
            min: 18.0,
            require_di_alignment: false,
        },
        FilterSpec::Session {
            start_hour: 6,
            end_hour: 21,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_is_valid() {
        for (name, _) in PRESETS {
            let cfg = preset(name, "EURUSD").unwrap();
            assert_eq!(cfg.name, *name);
            cfg.validate().unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!(cfg.trigger().unwrap().name(), *name);
        }
    }

    #[test]
    fn unknown_preset() {
        assert!(preset("martingale", "EURUSD").is_none());
    }

    #[test]
    fn donchian_checks_volatility_first() {
        let cfg = preset("donchian_breakout", "EURUSD").unwrap();
        assert_eq!(cfg.filters[0].name(), "volatility");
    }
}
