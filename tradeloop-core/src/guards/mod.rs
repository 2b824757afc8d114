//! Entry guards: account-level vetoes checked after a signal and before sizing.
//!
//! Guards run in a fixed order and the first failure rejects the entry:
//! - [`ConcurrencyGuard`]: too many positions open for this strategy
//! - [`CooldownGuard`]: the latest trade is too recent
//! - [`LossLockoutGuard`]: a losing streak is still locked out
//! - [`DailyLossGuard`]: the day's realized loss reached the limit
//! - [`SpreadGuard`]: the spread is too wide
//!
//! Existing positions keep being managed while entries are blocked.

pub mod state;

pub use state::GuardState;

use crate::domain::{InstrumentSpec, ManagedPosition, Quote};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Why an entry was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    MaxPositions,
    Cooldown,
    LossLockout,
    DailyLossLimit,
    SpreadTooWide,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::MaxPositions => write!(f, "max_positions"),
            RejectionReason::Cooldown => write!(f, "cooldown"),
            RejectionReason::LossLockout => write!(f, "loss_lockout"),
            RejectionReason::DailyLossLimit => write!(f, "daily_loss_limit"),
            RejectionReason::SpreadTooWide => write!(f, "spread_too_wide"),
        }
    }
}

/// A blocked entry and the numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardRejection {
    pub reason: RejectionReason,
    pub context: String,
}

impl std::fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.reason, self.context)
    }
}

/// Everything a guard may look at.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub now: DateTime<Utc>,
    pub positions: &'a [ManagedPosition],
    pub quote: &'a Quote,
    pub instrument: &'a InstrumentSpec,
    pub state: &'a GuardState,
}

/// Longest cooldown or loss lockout accepted: 30 days.
pub const MAX_WINDOW_SECS: u64 = 30 * 24 * 3600;

/// Guard limits. Zero (or `None`) disables the corresponding check,
/// except `max_positions`, which is always enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub max_positions: usize,
    pub cooldown_secs: u64,
    pub max_consecutive_losses: u32,
    pub loss_lockout_secs: u64,
    /// Account currency. Entries stop once realized P&L ≤ -limit.
    pub max_daily_loss: Option<f64>,
    pub max_spread_points: Option<f64>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_positions: 1,
            cooldown_secs: 0,
            max_consecutive_losses: 0,
            loss_lockout_secs: 0,
            max_daily_loss: None,
            max_spread_points: None,
        }
    }
}

impl GuardConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (field, secs) in [("cooldown_secs", self.cooldown_secs), ("loss_lockout_secs", self.loss_lockout_secs)] {
            if secs > MAX_WINDOW_SECS {
                return Err(format!("{field} {secs} exceeds {MAX_WINDOW_SECS}"));
            }
        }
        if let Some(limit) = self.max_daily_loss {
            if !(limit > 0.0) {
                return Err(format!("max_daily_loss {limit} must be positive"));
            }
        }
        if let Some(points) = self.max_spread_points {
            if !(points >= 0.0) {
                return Err(format!("max_spread_points {points} must be non-negative"));
            }
        }
        Ok(())
    }
}

pub trait Guard: Send + Sync {
    /// `Some` if the entry must be blocked.
    fn evaluate(&self, ctx: &GuardContext<'_>) -> Option<GuardRejection>;

    /// Guard name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug)]
pub struct ConcurrencyGuard {
    pub max_positions: usize,
}

impl Guard for ConcurrencyGuard {
    fn evaluate(&self, ctx: &GuardContext<'_>) -> Option<GuardRejection> {
        let open = ctx.positions.len();
        (open >= self.max_positions).then(|| GuardRejection {
            reason: RejectionReason::MaxPositions,
            context: format!("open={open}, max={}", self.max_positions),
        })
    }

    fn name(&self) -> &str {
        "ConcurrencyGuard"
    }
}

/// Blocks entries until `cooldown` has passed since the latest trade, taken
/// as the newest of any open position's open time and any recorded event.
#[derive(Debug)]
pub struct CooldownGuard {
    pub cooldown: Duration,
}

impl Guard for CooldownGuard {
    fn evaluate(&self, ctx: &GuardContext<'_>) -> Option<GuardRejection> {
        let latest_open = ctx.positions.iter().map(|p| p.opened_at).max();
        let latest = latest_open.max(ctx.state.latest_trade())?;
        let elapsed = ctx.now - latest;
        (elapsed < self.cooldown).then(|| GuardRejection {
            reason: RejectionReason::Cooldown,
            context: format!(
                "elapsed={}s, cooldown={}s",
                elapsed.num_seconds(),
                self.cooldown.num_seconds()
            ),
        })
    }

    fn name(&self) -> &str {
        "CooldownGuard"
    }
}

#[derive(Debug)]
pub struct LossLockoutGuard {
    pub max_consecutive_losses: u32,
    pub lockout: Duration,
}

impl Guard for LossLockoutGuard {
    fn evaluate(&self, ctx: &GuardContext<'_>) -> Option<GuardRejection> {
        let streak = ctx.state.consecutive_losses;
        if streak < self.max_consecutive_losses {
            return None;
        }
        let since = ctx.now - ctx.state.last_loss_at?;
        (since < self.lockout).then(|| GuardRejection {
            reason: RejectionReason::LossLockout,
            context: format!(
                "streak={streak}, since_last_loss={}s, lockout={}s",
                since.num_seconds(),
                self.lockout.num_seconds()
            ),
        })
    }

    fn name(&self) -> &str {
        "LossLockoutGuard"
    }
}

#[derive(Debug)]
pub struct DailyLossGuard {
    pub max_daily_loss: f64,
}

impl Guard for DailyLossGuard {
    fn evaluate(&self, ctx: &GuardContext<'_>) -> Option<GuardRejection> {
        let pnl = ctx.state.daily_realized_pnl;
        (pnl <= -self.max_daily_loss).then(|| GuardRejection {
            reason: RejectionReason::DailyLossLimit,
            context: format!("realized={pnl:.2}, limit={:.2}", self.max_daily_loss),
        })
    }

    fn name(&self) -> &str {
        "DailyLossGuard"
    }
}

#[derive(Debug)]
pub struct SpreadGuard {
    pub max_points: f64,
}

impl Guard for SpreadGuard {
    fn evaluate(&self, ctx: &GuardContext<'_>) -> Option<GuardRejection> {
        let points = ctx.quote.spread() / ctx.instrument.point;
        (points > self.max_points).then(|| GuardRejection {
            reason: RejectionReason::SpreadTooWide,
            context: format!("spread={points:.1}pt, max={:.1}pt", self.max_points),
        })
    }

    fn name(&self) -> &str {
        "SpreadGuard"
    }
}

/// Configured seconds as a duration, capped at [`MAX_WINDOW_SECS`].
fn window(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
}

/// The configured guards in evaluation order.
pub struct GuardSet {
    guards: Vec<Box<dyn Guard>>,
}

impl GuardSet {
    pub fn from_config(config: &GuardConfig) -> Self {
        let mut guards: Vec<Box<dyn Guard>> = vec![Box::new(ConcurrencyGuard {
            max_positions: config.max_positions,
        })];
        if config.cooldown_secs > 0 {
            guards.push(Box::new(CooldownGuard {
                cooldown: window(config.cooldown_secs),
            }));
        }
        if config.max_consecutive_losses > 0 && config.loss_lockout_secs > 0 {
            guards.push(Box::new(LossLockoutGuard {
                max_consecutive_losses: config.max_consecutive_losses,
                lockout: window(config.loss_lockout_secs),
            }));
        }
        if let Some(max_daily_loss) = config.max_daily_loss {
            guards.push(Box::new(DailyLossGuard { max_daily_loss }));
        }
        if let Some(max_points) = config.max_spread_points {
            guards.push(Box::new(SpreadGuard { max_points }));
        }
        Self { guards }
    }

    /// First rejection in order, if any.
    pub fn check(&self, ctx: &GuardContext<'_>) -> Result<(), GuardRejection> {
        match self.guards.iter().find_map(|guard| guard.evaluate(ctx)) {
            Some(rejection) => Err(rejection),
            None => Ok(()),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.guards.iter().map(|g| g.name()).collect()
    }
}

impl std::fmt::Debug for GuardSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardSet").field("guards", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClosedTrade, Direction, PositionId, StopPhase};
    use chrono::TimeZone;

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, minute, 0).unwrap()
    }

    fn quote(spread_points: f64) -> Quote {
        Quote {
            time: t(12, 0),
            bid: 1.10000,
            ask: 1.10000 + spread_points * 0.00001,
        }
    }

    fn position(opened_at: DateTime<Utc>) -> ManagedPosition {
        ManagedPosition {
            id: PositionId(1),
            symbol: "EURUSD".into(),
            direction: Direction::Long,
            volume: 0.1,
            entry_price: 1.1,
            current_stop: 1.098,
            take_profit: 1.104,
            opened_at,
            initial_stop_distance: 0.002,
            phase: StopPhase::Initial,
        }
    }

    fn loss(at: DateTime<Utc>) -> ClosedTrade {
        ClosedTrade {
            position_id: PositionId(1),
            symbol: "EURUSD".into(),
            direction: Direction::Long,
            volume: 0.1,
            entry_price: 1.1,
            exit_price: 1.098,
            closed_at: at,
            profit: -20.0,
        }
    }

    fn check(config: &GuardConfig, positions: &[ManagedPosition], state: &GuardState, spread: f64) -> Result<(), GuardRejection> {
        let instrument = InstrumentSpec::forex_major("EURUSD");
        let quote = quote(spread);
        GuardSet::from_config(config).check(&GuardContext {
            now: t(12, 0),
            positions,
            quote: &quote,
            instrument: &instrument,
            state,
        })
    }

    #[test]
    fn default_allows_first_entry() {
        assert!(check(&GuardConfig::default(), &[], &GuardState::new(), 10.0).is_ok());
    }

    #[test]
    fn concurrency_cap() {
        let err = check(&GuardConfig::default(), &[position(t(8, 0))], &GuardState::new(), 10.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::MaxPositions);
    }

    #[test]
    fn cooldown_uses_latest_trade() {
        let config = GuardConfig {
            max_positions: 5,
            cooldown_secs: 3600,
            ..GuardConfig::default()
        };
        let mut state = GuardState::new();
        state.record_open(t(11, 30));
        let err = check(&config, &[], &state, 10.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::Cooldown);

        let old = GuardState {
            recent_trade_timestamps: vec![t(10, 0)],
            ..GuardState::default()
        };
        assert!(check(&config, &[], &old, 10.0).is_ok());
        // an open position counts as the latest trade too
        let err = check(&config, &[position(t(11, 45))], &old, 10.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::Cooldown);
    }

    #[test]
    fn loss_lockout_blocks_until_expiry() {
        let config = GuardConfig {
            max_consecutive_losses: 2,
            loss_lockout_secs: 2 * 3600,
            ..GuardConfig::default()
        };
        let mut state = GuardState::new();
        state.record_close(&loss(t(9, 0)));
        assert!(check(&config, &[], &state, 10.0).is_ok());
        state.record_close(&loss(t(11, 0)));
        let err = check(&config, &[], &state, 10.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::LossLockout);

        let expired = GuardState {
            last_loss_at: Some(t(9, 59)),
            ..state
        };
        assert!(check(&config, &[], &expired, 10.0).is_ok());
    }

    #[test]
    fn daily_loss_limit_is_inclusive() {
        let config = GuardConfig {
            max_daily_loss: Some(100.0),
            ..GuardConfig::default()
        };
        let state = GuardState {
            daily_realized_pnl: -100.0,
            ..GuardState::default()
        };
        let err = check(&config, &[], &state, 10.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::DailyLossLimit);
    }

    #[test]
    fn spread_ceiling() {
        let config = GuardConfig {
            max_spread_points: Some(20.0),
            ..GuardConfig::default()
        };
        assert!(check(&config, &[], &GuardState::new(), 15.0).is_ok());
        let err = check(&config, &[], &GuardState::new(), 25.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::SpreadTooWide);
    }

    #[test]
    fn oversized_windows_are_rejected_and_capped() {
        let config = GuardConfig {
            max_positions: 5,
            cooldown_secs: u64::MAX,
            max_consecutive_losses: 1,
            loss_lockout_secs: MAX_WINDOW_SECS + 1,
            ..GuardConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.starts_with("cooldown_secs"), "{err}");
        let lockout_only = GuardConfig {
            cooldown_secs: MAX_WINDOW_SECS,
            ..config.clone()
        };
        assert!(lockout_only.validate().unwrap_err().starts_with("loss_lockout_secs"));

        // building the guards never overflows; the cap still blocks
        let mut state = GuardState::new();
        state.record_open(t(1, 0));
        let err = check(&config, &[], &state, 10.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::Cooldown);
    }

    #[test]
    fn first_failure_wins() {
        let config = GuardConfig {
            max_daily_loss: Some(50.0),
            max_spread_points: Some(5.0),
            ..GuardConfig::default()
        };
        let state = GuardState {
            daily_realized_pnl: -80.0,
            ..GuardState::default()
        };
        let err = check(&config, &[position(t(8, 0))], &state, 30.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::MaxPositions);
        let err = check(&config, &[], &state, 30.0).unwrap_err();
        assert_eq!(err.reason, RejectionReason::DailyLossLimit);
    }
}
