//! Market data access port.

use crate::domain::error::SimError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// All bars for `symbol`, sorted by timestamp with no duplicates.
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, SimError>;

    fn list_symbols(&self) -> Result<Vec<String>, SimError>;
}
