//! Runs a strategy's filter pipeline against the current market frames.
//!
//! Order of work:
//! 1. The trigger's raw read fixes the candidate direction.
//! 2. Filters run in configured order, each appending to the trail.
//! 3. A failing volatility filter stops evaluation with `RegimeFiltered`.
//! 4. The evaluation is a signal only if every filter passed.

use super::config::{FilterSpec, StrategyConfig, StrategyConfigError};
use super::filters;
use super::trail::{Evaluation, FilterVerdict, TradeIntent};
use super::triggers;
use crate::components::{FramePlan, MarketFrames};
use crate::domain::{InstrumentSpec, Quote};
use tracing::debug;

/// Everything a filter may look at for one evaluation.
pub struct EvalContext<'a> {
    pub frames: &'a MarketFrames,
    pub quote: &'a Quote,
    pub instrument: &'a InstrumentSpec,
}

#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    config: StrategyConfig,
}

impl SignalEvaluator {
    pub fn new(config: StrategyConfig) -> Result<Self, StrategyConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Register every indicator the pipeline reads.
    pub fn register(&self, plan: &mut FramePlan) {
        self.config.register(plan);
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Evaluation {
        let candidate = self
            .config
            .trigger()
            .and_then(|trigger| triggers::candidate(trigger, ctx));

        let mut trail = Vec::with_capacity(self.config.filters.len());
        for spec in &self.config.filters {
            let evaluation = filters::evaluate(spec, ctx, candidate);
            let regime_failed =
                matches!(spec, FilterSpec::Volatility { .. }) && !evaluation.verdict.is_passed();
            trail.push(evaluation);
            if regime_failed {
                debug!(strategy = %self.config.name, "volatility regime outside band");
                return Evaluation::RegimeFiltered { trail };
            }
        }

        let all_passed = trail.iter().all(|e| e.verdict == FilterVerdict::Passed);
        match candidate {
            Some(direction) if all_passed => Evaluation::Signal(TradeIntent {
                strategy: self.config.name.clone(),
                symbol: self.config.symbol.clone(),
                direction,
                entry_price: direction.entry_price(ctx.quote),
                evaluated_at: ctx.quote.time,
                trail,
            }),
            _ => Evaluation::NoSignal { candidate, trail },
        }
    }
}
