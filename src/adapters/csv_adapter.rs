//! CSV file data adapter.
//!
//! One file per symbol: `<base_path>/<SYMBOL>.csv` with the header
//! `timestamp,open,high,low,close,volume`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::error::SimError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`, RFC 3339, or Unix
/// seconds (milliseconds when the value has 13 or more digits).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();

    if let Ok(n) = s.parse::<i64>() {
        let dt = if s.trim_start_matches('-').len() >= 13 {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        };
        return dt.map(|d| d.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn field(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<f64, SimError> {
    let raw = record.get(index).ok_or_else(|| SimError::Data {
        reason: format!("line {line}: missing {name} column"),
    })?;
    let value: f64 = raw.trim().parse().map_err(|e| SimError::Data {
        reason: format!("line {line}: invalid {name} value '{raw}': {e}"),
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(SimError::Data {
            reason: format!("line {line}: {name} must be a non-negative number, got {value}"),
        });
    }
    Ok(value)
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, SimError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| SimError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| SimError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let ts_raw = record.get(0).ok_or_else(|| SimError::Data {
                reason: format!("line {line}: missing timestamp column"),
            })?;
            let timestamp = parse_timestamp(ts_raw).ok_or_else(|| SimError::Data {
                reason: format!("line {line}: unrecognised timestamp '{ts_raw}'"),
            })?;

            let bar = Bar {
                timestamp,
                open: field(&record, 1, "open", line)?,
                high: field(&record, 2, "high", line)?,
                low: field(&record, 3, "low", line)?,
                close: field(&record, 4, "close", line)?,
                volume: field(&record, 5, "volume", line)?,
            };
            if bar.high < bar.low {
                return Err(SimError::Data {
                    reason: format!("line {line}: high {} below low {}", bar.high, bar.low),
                });
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.timestamp);
        if let Some(dup) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(SimError::Data {
                reason: format!("duplicate timestamp {} in {}", dup[0].timestamp, path.display()),
            });
        }

        debug!(symbol, bars = bars.len(), path = %path.display(), "bars loaded");
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SimError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SimError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15 02:00:00,105.0,115.0,100.0,110.0,60000\n\
            2024-01-15 01:00:00,100.0,110.0,90.0,105.0,50000\n\
            2024-01-15 03:00:00,110.0,120.0,105.0,115.0,55000.5\n";

        fs::write(path.join("BTCUSDT.csv"), csv_content).unwrap();
        fs::write(
            path.join("ETHUSDT.csv"),
            "timestamp,open,high,low,close,volume\n",
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "ignore me").unwrap();

        (dir, path)
    }

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn fetch_bars_sorts_by_timestamp() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_bars("BTCUSDT").unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, ts(1));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.0);
        assert_eq!(bars[2].volume, 55000.5);
    }

    #[test]
    fn fetch_bars_errors_for_missing_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_bars("XYZ"),
            Err(SimError::Data { .. })
        ));
    }

    #[test]
    fn empty_file_yields_no_bars() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(adapter.fetch_bars("ETHUSDT").unwrap().is_empty());
    }

    #[test]
    fn duplicate_timestamps_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("DUP.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-15,1,2,1,2,10\n\
             2024-01-15,1,2,1,2,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let err = adapter.fetch_bars("DUP").unwrap_err();
        assert!(err.to_string().contains("duplicate timestamp"));
    }

    #[test]
    fn malformed_rows_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("BAD.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-15,1,abc,1,2,10\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("INV.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-15,1,1,2,2,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert!(adapter.fetch_bars("BAD").unwrap_err().to_string().contains("high"));
        assert!(adapter.fetch_bars("INV").unwrap_err().to_string().contains("below low"));
    }

    #[test]
    fn list_symbols_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_symbols().unwrap(), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn parse_timestamp_formats() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-01-15"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-15 01:00:00"), Some(ts(1)));
        assert_eq!(parse_timestamp("2024-01-15T01:00:00"), Some(ts(1)));
        assert_eq!(parse_timestamp("2024-01-15T03:00:00+02:00"), Some(ts(1)));
        assert_eq!(parse_timestamp("1705280400"), Some(ts(1)));
        assert_eq!(parse_timestamp("1705280400000"), Some(ts(1)));
        assert_eq!(parse_timestamp("15/01/2024"), None);
    }
}
