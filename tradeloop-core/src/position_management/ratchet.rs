/// Ratchet invariant enforcement
///
/// **Core Rule:** Stops may tighten, never loosen (even if ATR expands).
use crate::domain::Direction;

/// Stop level that can only move in the protective direction:
/// - Long positions: stop can only rise
/// - Short positions: stop can only fall
#[derive(Debug, Clone, PartialEq)]
pub struct RatchetState {
    /// High-water mark for longs, low-water mark for shorts.
    current_level: Option<f64>,
    direction: Direction,
}

impl RatchetState {
    pub fn new(direction: Direction) -> Self {
        Self {
            current_level: None,
            direction,
        }
    }

    pub fn with_initial_level(direction: Direction, initial_level: f64) -> Self {
        Self {
            current_level: Some(initial_level),
            direction,
        }
    }

    /// Apply the ratchet to a proposed stop level and return the resulting level.
    ///
    /// # Example
    /// ```
    /// use tradeloop_core::domain::Direction;
    /// use tradeloop_core::position_management::RatchetState;
    ///
    /// let mut ratchet = RatchetState::with_initial_level(Direction::Long, 1.0950);
    /// assert_eq!(ratchet.apply(1.0980), 1.0980);
    /// // loosening is blocked
    /// assert_eq!(ratchet.apply(1.0900), 1.0980);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        let level = match self.current_level {
            None => proposed,
            Some(current) if self.direction.improves_stop(proposed, current) => proposed,
            Some(current) => current,
        };
        self.current_level = Some(level);
        level
    }

    /// True if `proposed` would strictly tighten the current level.
    pub fn would_tighten(&self, proposed: f64) -> bool {
        match self.current_level {
            None => proposed.is_finite(),
            Some(current) => self.direction.improves_stop(proposed, current),
        }
    }

    pub fn current_level(&self) -> Option<f64> {
        self.current_level
    }
}
