pub mod config;
pub mod error;
pub mod observability;
pub mod query;
pub mod rows;
pub mod types;

pub use error::{DataContractError, SourceError};
pub use rows::{Row, Table};
pub use types::{EntityKind, Granularity, SwapPolicy, TradeRecord, Volume};
