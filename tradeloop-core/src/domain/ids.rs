use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic strategy "magic" number (hash of strategy name + symbol).
///
/// Orders submitted by an engine carry this tag, and positions are filtered by
/// it, so several instances can share one account without touching each
/// other's positions. Uses BLAKE3 for a hash that is stable across builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrategyId(pub u64);

impl StrategyId {
    pub fn derive(strategy_name: &str, symbol: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(strategy_name.as_bytes());
        hasher.update(b"\0");
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        Self(u64::from_le_bytes(bytes))
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Broker-assigned position ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl From<u64> for PositionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
