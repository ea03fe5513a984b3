//! Technical indicators used by the bundled strategies.
//!
//! - `IndicatorPoint`: a single point in an indicator time series
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a time series of indicator values aligned with the input bars

pub mod atr;
pub mod ema;
pub mod rsi;

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub(crate) fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Value at `index` if that point is past warm-up.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }

    /// Most recent value, if the last point is valid.
    pub fn last(&self) -> Option<f64> {
        self.values.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// The two most recent values `(previous, latest)`, both valid.
    pub fn last_two(&self) -> Option<(f64, f64)> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        Some((self.get(n - 2)?, self.get(n - 1)?))
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(day: u32, valid: bool, value: f64) -> IndicatorPoint {
        IndicatorPoint {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            valid,
            value,
        }
    }

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Ema(20).to_string(), "EMA(20)");
        assert_eq!(IndicatorType::Rsi(14).to_string(), "RSI(14)");
        assert_eq!(IndicatorType::Atr(14).to_string(), "ATR(14)");
    }

    #[test]
    fn series_accessors_skip_warmup() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Ema(2),
            values: vec![point(1, false, 0.0), point(2, true, 10.0), point(3, true, 11.0)],
        };
        assert_eq!(series.get(0), None);
        assert_eq!(series.get(1), Some(10.0));
        assert_eq!(series.get(9), None);
        assert_eq!(series.last(), Some(11.0));
        assert_eq!(series.last_two(), Some((10.0, 11.0)));
    }

    #[test]
    fn last_two_requires_both_valid() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Ema(2),
            values: vec![point(1, false, 0.0), point(2, true, 10.0)],
        };
        assert_eq!(series.last_two(), None);
        assert_eq!(IndicatorSeries::empty(IndicatorType::Atr(3)).last(), None);
    }
}
