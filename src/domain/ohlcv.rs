//! OHLCV bar representation.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Median spacing between consecutive timestamps, in seconds.
///
/// Returns `None` for fewer than two timestamps or when every delta is non-positive.
pub fn median_interval_secs<I>(timestamps: I) -> Option<f64>
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    let timestamps: Vec<NaiveDateTime> = timestamps.into_iter().collect();
    let mut deltas: Vec<i64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .filter(|&d| d > 0)
        .collect();
    if deltas.is_empty() {
        return None;
    }
    deltas.sort_unstable();
    let mid = deltas.len() / 2;
    let median = if deltas.len() % 2 == 0 {
        (deltas[mid - 1] + deltas[mid]) as f64 / 2.0
    } else {
        deltas[mid] as f64
    };
    Some(median)
}
