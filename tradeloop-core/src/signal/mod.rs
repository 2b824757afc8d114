//! Signal evaluator: one parameterised rule engine for every strategy variant.

pub mod config;
pub mod evaluator;
pub mod filters;
pub mod presets;
pub mod trail;
pub mod triggers;

pub use config::{FilterSpec, MovingAverageKind, StrategyConfig, StrategyConfigError, TriggerConfig};
pub use evaluator::{EvalContext, SignalEvaluator};
pub use presets::{preset, PRESETS};
pub use trail::{Evaluation, FilterEvaluation, FilterVerdict, TradeIntent};
