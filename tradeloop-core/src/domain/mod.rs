//! Domain types for tradeloop

pub mod candle;
pub mod ids;
pub mod instrument;
pub mod order;
pub mod position;

pub use candle::{resample, Candle, CandleSeries, Timeframe};
pub use ids::{PositionId, StrategyId};
pub use instrument::{InstrumentError, InstrumentSpec};
pub use order::{
    AccountInfo, BrokerRejection, Direction, OrderPlan, OrderRequest, OrderTicket, Quote,
    StopModification,
};
pub use position::{BrokerPosition, ClosedTrade, ManagedPosition, StopPhase};

/// Symbol type alias
pub type Symbol = String;
