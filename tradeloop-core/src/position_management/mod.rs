/// Position management: breakeven and trailing stops with a ratchet invariant
///
/// **Key Design Principles:**
/// 1. Decisions are pure [`StopAdjustment`]s; the engine applies them only after the broker accepts
/// 2. **Ratchet invariant**: stops may tighten, never loosen (even if ATR expands)
/// 3. Phases only move forward: Initial → Breakeven → Trailing
pub mod manager;
pub mod ratchet;

pub use manager::{
    BreakevenConfig, ManagementConfig, PositionManager, StopAction, StopAdjustment, TrailDistance, TrailingConfig,
};
pub use ratchet::RatchetState;
