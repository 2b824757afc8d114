//! Bot configuration loaded from TOML.
//!
//! ```toml
//! [strategy]
//! symbol = "EURUSD"
//! preset = "donchian_breakout"   # or an explicit [[strategy.filters]] array
//!
//! [risk]
//! min_stop_pips = 5.0
//! stop = { policy = "fixed", sl_pips = 20.0, tp_pips = 40.0 }
//! volume = { mode = "risk_percent", percent = 1.0 }
//!
//! [guards]
//! max_positions = 1
//! cooldown_secs = 900
//!
//! [driver]
//! poll_interval_secs = 10
//! ```
//!
//! Every section has defaults, so an empty file is a valid bot running the
//! default preset.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradeloop_core::engine::{StrategyEngine, DEFAULT_HISTORY};
use tradeloop_core::guards::GuardConfig;
use tradeloop_core::position_management::{ManagementConfig, PositionManager};
use tradeloop_core::risk::{RiskConfig, RiskError, RiskSizer};
use tradeloop_core::signal::{preset, FilterSpec, SignalEvaluator, StrategyConfig, StrategyConfigError};

use crate::driver::DriverConfig;
use crate::paper::PaperConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("strategy sets both a preset and explicit filters")]
    PresetAndFilters,

    #[error("strategy: {0}")]
    Strategy(#[from] StrategyConfigError),

    #[error("risk: {0}")]
    Risk(#[from] RiskError),

    #[error("[{section}] {message}")]
    Invalid { section: &'static str, message: String },
}

/// Preset used when the strategy names neither a preset nor filters.
pub const DEFAULT_PRESET: &str = "donchian_breakout";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    /// Defaults to the preset name (`custom` for explicit filters).
    pub name: Option<String>,
    pub symbol: String,
    pub preset: Option<String>,
    pub filters: Vec<FilterSpec>,
    /// Closed candles requested per timeframe.
    pub history: usize,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            name: None,
            symbol: "EURUSD".into(),
            preset: None,
            filters: Vec::new(),
            history: DEFAULT_HISTORY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("journal/tradeloop.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub strategy: StrategySection,
    pub risk: RiskConfig,
    pub guards: GuardConfig,
    pub management: ManagementConfig,
    pub driver: DriverConfig,
    pub journal: JournalConfig,
    pub paper: PaperConfig,
}

impl BotConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the preset or explicit filter list into a strategy.
    pub fn strategy_config(&self) -> Result<StrategyConfig, ConfigError> {
        let section = &self.strategy;
        let mut config = match (&section.preset, section.filters.is_empty()) {
            (Some(_), false) => return Err(ConfigError::PresetAndFilters),
            (Some(name), true) => {
                preset(name, &section.symbol).ok_or_else(|| ConfigError::UnknownPreset(name.clone()))?
            }
            (None, false) => StrategyConfig {
                name: "custom".into(),
                symbol: section.symbol.clone(),
                filters: section.filters.clone(),
            },
            (None, true) => preset(DEFAULT_PRESET, &section.symbol)
                .ok_or_else(|| ConfigError::UnknownPreset(DEFAULT_PRESET.into()))?,
        };
        if let Some(name) = &section.name {
            config.name = name.clone();
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy.symbol.trim().is_empty() {
            return Err(invalid("strategy", "symbol must not be empty"));
        }
        if self.strategy.history == 0 {
            return Err(invalid("strategy", "history must be >= 1"));
        }
        self.strategy_config()?.validate()?;
        self.risk.validate()?;
        self.guards.validate().map_err(|m| invalid("guards", m))?;
        self.management.validate().map_err(|m| invalid("management", m))?;
        self.driver.validate().map_err(|m| invalid("driver", m))?;
        if !(self.paper.balance > 0.0) || !(self.paper.spread_points >= 0.0) {
            return Err(invalid("paper", "balance must be positive and spread_points non-negative"));
        }
        Ok(())
    }

    pub fn build_engine(&self) -> Result<StrategyEngine, ConfigError> {
        let evaluator = SignalEvaluator::new(self.strategy_config()?)?;
        let sizer = RiskSizer::new(self.risk.clone())?;
        let manager = PositionManager::new(self.management.clone());
        Ok(StrategyEngine::new(evaluator, sizer, manager, &self.guards).with_history(self.strategy.history))
    }
}

fn invalid(section: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        section,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeloop_core::domain::Timeframe;
    use tradeloop_core::position_management::TrailDistance;
    use tradeloop_core::risk::{StopPolicy, VolumePolicy};
    use tradeloop_core::signal::TriggerConfig;

    #[test]
    fn empty_file_is_the_default_preset() {
        let config = BotConfig::from_toml("").unwrap();
        assert_eq!(config, BotConfig::default());
        let strategy = config.strategy_config().unwrap();
        assert_eq!(strategy.name, "donchian_breakout");
        assert_eq!(strategy.symbol, "EURUSD");
    }

    #[test]
    fn full_file_parses_every_section() {
        let text = r#"
            [strategy]
            name = "london_breakout"
            symbol = "GBPUSD"
            preset = "donchian_breakout"
            history = 500

            [risk]
            min_stop_pips = 8.0
            max_risk_pips = 40.0
            stop = { policy = "atr_multiple", timeframe = "M5", period = 14, sl_multiplier = 1.5, target = { reward_ratio = 2.0 } }
            volume = { mode = "fixed_lots", lots = 0.2 }

            [guards]
            max_positions = 2
            cooldown_secs = 900
            max_consecutive_losses = 3
            loss_lockout_secs = 3600
            max_daily_loss = 250.0
            max_spread_points = 25.0

            [management.breakeven]
            trigger_pips = 10.0
            trigger_fraction = 0.5

            [management.trailing]
            trigger_pips = 20.0
            min_pips = 8.0
            max_pips = 40.0
            distance = { mode = "atr", timeframe = "M5", period = 14, multiplier = 2.0 }

            [driver]
            poll_interval_secs = 5
            failure_threshold = 3
            failure_cooldown_secs = 600

            [journal]
            path = "out/gbpusd.jsonl"

            [paper]
            spread_points = 15.0
        "#;
        let config = BotConfig::from_toml(text).unwrap();
        assert_eq!(config.strategy.history, 500);
        assert_eq!(config.strategy_config().unwrap().name, "london_breakout");
        assert!(matches!(config.risk.stop, StopPolicy::AtrMultiple { period: 14, .. }));
        assert_eq!(config.risk.volume, VolumePolicy::FixedLots { lots: 0.2 });
        assert_eq!(config.guards.max_daily_loss, Some(250.0));
        let trailing = config.management.trailing.as_ref().unwrap();
        assert!(matches!(trailing.distance, TrailDistance::Atr { timeframe: Timeframe::M5, .. }));
        assert_eq!(config.driver.failure_threshold, 3);
        assert_eq!(config.journal.path, PathBuf::from("out/gbpusd.jsonl"));
        assert_eq!(config.paper.spread_points, 15.0);
        assert_eq!(config.paper.balance, 10_000.0);

        let engine = config.build_engine().unwrap();
        assert_eq!(engine.name(), "london_breakout");
        assert_eq!(engine.symbol(), "GBPUSD");
    }

    #[test]
    fn explicit_filters_build_a_custom_strategy() {
        let text = r#"
            [strategy]
            symbol = "EURUSD"
            preset = ""
        "#;
        // an empty preset name is not a preset
        assert!(matches!(BotConfig::from_toml(text), Err(ConfigError::UnknownPreset(_))));

        let text = r#"
            [strategy]
            name = "m15_donchian"

            [[strategy.filters]]
            filter = "volatility"
            timeframe = "M15"
            atr_period = 14
            min_pips = 4.0
            max_pips = 40.0

            [[strategy.filters]]
            filter = "trigger"
            trigger = "donchian"
            timeframe = "M15"
            period = 20
            buffer_pips = 1.0
        "#;
        let config = BotConfig::from_toml(text).unwrap();
        let strategy = config.strategy_config().unwrap();
        assert_eq!(strategy.name, "m15_donchian");
        assert_eq!(strategy.filters.len(), 2);
        assert_eq!(
            strategy.trigger(),
            Some(&TriggerConfig::Donchian {
                timeframe: Timeframe::M15,
                period: 20,
                buffer_pips: 1.0
            })
        );

        let both = text.replace("name = \"m15_donchian\"", "preset = \"ut_bot\"");
        assert!(matches!(BotConfig::from_toml(&both), Err(ConfigError::PresetAndFilters)));
    }

    #[test]
    fn invalid_values_are_rejected_with_their_section() {
        let bad_driver = "[driver]\npoll_interval_secs = 0\n";
        match BotConfig::from_toml(bad_driver) {
            Err(ConfigError::Invalid { section, .. }) => assert_eq!(section, "driver"),
            other => panic!("expected invalid driver, got {other:?}"),
        }

        let bad_risk = "[risk]\nstop = { policy = \"fixed\", sl_pips = 0.0, tp_pips = 40.0 }\nvolume = { mode = \"risk_percent\", percent = 1.0 }\n";
        assert!(matches!(BotConfig::from_toml(bad_risk), Err(ConfigError::Risk(_))));

        let unknown = "[strategy]\npreset = \"martingale\"\n";
        assert!(matches!(BotConfig::from_toml(unknown), Err(ConfigError::UnknownPreset(name)) if name == "martingale"));

        let no_trigger = "[strategy]\n[[strategy.filters]]\nfilter = \"session\"\nstart_hour = 7\nend_hour = 20\n";
        assert!(matches!(
            BotConfig::from_toml(no_trigger),
            Err(ConfigError::Strategy(StrategyConfigError::MissingTrigger(_)))
        ));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = BotConfig::from_file(Path::new("/nonexistent/bot.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/bot.toml"));
    }
}
