//! Domain types for FXLab

pub mod bar;
pub mod equity;
pub mod ids;
pub mod instrument;
pub mod position;
pub mod trade;

pub use bar::{Bar, BarError, CandleDirection};
pub use equity::EquityPoint;
pub use ids::{IdGen, PositionId};
pub use instrument::{InstrumentError, Pair, QuoteConversion, Timeframe, STANDARD_LOT};
pub use position::{Direction, Position, PositionStatus};
pub use trade::Trade;
