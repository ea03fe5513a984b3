//! Average True Range with Wilder's smoothing.
//!
//! TR[0] = high - low; TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! First ATR is the mean of the first n TRs, then
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut atr = 0.0;
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };

        let valid = if i + 1 < period {
            sum += tr;
            false
        } else if i + 1 == period {
            sum += tr;
            atr = sum / period as f64;
            true
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
            true
        };

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: if valid { atr } else { 0.0 },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
