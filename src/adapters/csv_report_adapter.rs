//! CSV report adapter: trade ledger and equity curve as flat files.

use std::path::Path;

use crate::domain::error::SimError;
use crate::domain::position::ClosedTrade;
use crate::domain::simulation::EquityPoint;
use crate::ports::report_port::ReportPort;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TRADE_HEADER: [&str; 14] = [
    "symbol",
    "side",
    "entry_time",
    "exit_time",
    "entry_price",
    "exit_price",
    "quantity",
    "pnl",
    "pnl_percent",
    "commission",
    "reason",
    "is_partial",
    "trailing_used",
    "peak_profit_percent",
];

const EQUITY_HEADER: [&str; 5] = ["timestamp", "equity", "cash", "price", "quantity"];

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn csv_error(path: &Path, e: csv::Error) -> SimError {
    SimError::Data {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_trades(&self, trades: &[ClosedTrade], path: &Path) -> Result<(), SimError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
        wtr.write_record(TRADE_HEADER)
            .map_err(|e| csv_error(path, e))?;

        for t in trades {
            wtr.write_record([
                t.symbol.clone(),
                t.side.to_string(),
                t.entry_time.format(TIMESTAMP_FORMAT).to_string(),
                t.exit_time.format(TIMESTAMP_FORMAT).to_string(),
                t.entry_price.to_string(),
                t.exit_price.to_string(),
                t.quantity.to_string(),
                t.pnl.to_string(),
                t.pnl_percent.to_string(),
                t.commission.to_string(),
                t.reason.to_string(),
                t.is_partial.to_string(),
                t.trailing_used.to_string(),
                t.peak_profit_percent.to_string(),
            ])
            .map_err(|e| csv_error(path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_equity(&self, equity_curve: &[EquityPoint], path: &Path) -> Result<(), SimError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
        wtr.write_record(EQUITY_HEADER)
            .map_err(|e| csv_error(path, e))?;

        for p in equity_curve {
            wtr.write_record([
                p.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                p.equity.to_string(),
                p.cash.to_string(),
                p.price.to_string(),
                p.quantity.to_string(),
            ])
            .map_err(|e| csv_error(path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }
}
