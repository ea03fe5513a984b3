//! Report output port.

use std::path::Path;

use crate::domain::error::SimError;
use crate::domain::position::ClosedTrade;
use crate::domain::simulation::EquityPoint;

/// Port for persisting the trade ledger and the equity curve.
pub trait ReportPort {
    fn write_trades(&self, trades: &[ClosedTrade], path: &Path) -> Result<(), SimError>;

    fn write_equity(&self, equity_curve: &[EquityPoint], path: &Path) -> Result<(), SimError>;
}
