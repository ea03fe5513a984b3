//! Signal providers.
//!
//! A [`Strategy`] looks at a bounded window of bars ending at the current
//! bar and returns a [`Signal`], or `None` while its indicators warm up.

use std::fmt;

use super::indicator::atr::calculate_atr;
use super::indicator::ema::calculate_ema;
use super::indicator::rsi::calculate_rsi;
use super::ohlcv::Bar;
use super::signal::{RiskParams, Signal};

pub trait Strategy: Send + Sync + fmt::Debug {
    /// Short human-readable identifier, e.g. `EMA(9/21)`.
    fn name(&self) -> String;

    /// Number of trailing bars handed to [`Strategy::evaluate`].
    fn window_size(&self) -> usize;

    /// Signal for the last bar of `window`; `None` during warm-up.
    fn evaluate(&self, window: &[Bar]) -> Option<Signal>;
}

/// Evaluates `strategy` once per bar over a sliding window.
///
/// The output is aligned with `bars`.
pub fn generate_signals(bars: &[Bar], strategy: &dyn Strategy) -> Vec<Option<Signal>> {
    let size = strategy.window_size().max(1);
    (0..bars.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(size);
            strategy.evaluate(&bars[start..=i])
        })
        .collect()
}

/// ATR-derived stop/target levels shared by the bundled strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct AtrRisk {
    pub atr_period: usize,
    /// Stop distance in ATRs.
    pub stop_atr_multiple: f64,
    /// Take-profit distance as a multiple of the stop distance.
    pub reward_ratio: f64,
    pub trailing_multiplier: f64,
    /// Desired ATR in percent of price; higher volatility shrinks the size.
    pub target_volatility_pct: f64,
}

impl Default for AtrRisk {
    fn default() -> Self {
        AtrRisk {
            atr_period: 14,
            stop_atr_multiple: 2.0,
            reward_ratio: 2.0,
            trailing_multiplier: 2.0,
            target_volatility_pct: 2.0,
        }
    }
}

impl AtrRisk {
    /// Risk for a long (`long == true`) or short entry at `close`.
    ///
    /// With a zero or missing ATR the levels are left to the configured
    /// percentage defaults.
    fn params(&self, close: f64, atr: Option<f64>, long: bool) -> RiskParams {
        let atr = match atr.filter(|a| a.is_finite() && *a > 0.0) {
            Some(a) => a,
            None => {
                return RiskParams {
                    trailing_stop_multiplier: self.trailing_multiplier,
                    ..RiskParams::default()
                };
            }
        };

        let sign = if long { 1.0 } else { -1.0 };
        let stop_distance = atr * self.stop_atr_multiple;
        let atr_pct = atr / close * 100.0;
        let position_size_multiplier = if self.target_volatility_pct > 0.0 {
            (self.target_volatility_pct / atr_pct).min(1.0)
        } else {
            1.0
        };

        RiskParams {
            stop_loss_price: Some(close - sign * stop_distance),
            take_profit_price: Some(close + sign * stop_distance * self.reward_ratio),
            position_size_multiplier,
            atr_value: Some(atr),
            trailing_stop_multiplier: self.trailing_multiplier,
        }
    }
}

/// Fast/slow EMA crossover.
///
/// BUY when the fast EMA crosses above the slow one, SELL on the cross
/// under, HOLD otherwise. Confidence grows with the gap between the EMAs.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaCrossover {
    pub fast: usize,
    pub slow: usize,
    pub risk: AtrRisk,
}

impl EmaCrossover {
    pub fn new(fast: usize, slow: usize) -> Self {
        EmaCrossover {
            fast,
            slow,
            risk: AtrRisk::default(),
        }
    }

    fn min_bars(&self) -> usize {
        (self.slow + 1).max(self.risk.atr_period)
    }
}

impl Strategy for EmaCrossover {
    fn name(&self) -> String {
        format!("EMA({}/{})", self.fast, self.slow)
    }

    fn window_size(&self) -> usize {
        self.min_bars() * 3
    }

    fn evaluate(&self, window: &[Bar]) -> Option<Signal> {
        if self.fast == 0 || self.slow == 0 || window.len() < self.min_bars() {
            return None;
        }
        let close = window.last()?.close;
        let (prev_fast, fast) = calculate_ema(window, self.fast).last_two()?;
        let (prev_slow, slow) = calculate_ema(window, self.slow).last_two()?;
        let atr = calculate_atr(window, self.risk.atr_period).last();

        let gap_pct = if slow != 0.0 {
            (fast - slow).abs() / slow * 100.0
        } else {
            0.0
        };
        let confidence = 60.0 + gap_pct * 20.0;

        if prev_fast <= prev_slow && fast > slow {
            Some(Signal::buy(confidence, self.risk.params(close, atr, true)))
        } else if prev_fast >= prev_slow && fast < slow {
            Some(Signal::sell(confidence, self.risk.params(close, atr, false)))
        } else {
            Some(Signal::hold())
        }
    }
}

/// RSI mean reversion: BUY below `oversold`, SELL above `overbought`.
#[derive(Debug, Clone, PartialEq)]
pub struct RsiReversion {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub risk: AtrRisk,
}

impl RsiReversion {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        RsiReversion {
            period,
            oversold,
            overbought,
            risk: AtrRisk::default(),
        }
    }

    fn min_bars(&self) -> usize {
        (self.period + 1).max(self.risk.atr_period)
    }
}

impl Strategy for RsiReversion {
    fn name(&self) -> String {
        format!("RSI({}, {}/{})", self.period, self.oversold, self.overbought)
    }

    fn window_size(&self) -> usize {
        self.min_bars() * 3
    }

    fn evaluate(&self, window: &[Bar]) -> Option<Signal> {
        if self.period == 0 || window.len() < self.min_bars() {
            return None;
        }
        let close = window.last()?.close;
        let rsi = calculate_rsi(window, self.period).last()?;
        let atr = calculate_atr(window, self.risk.atr_period).last();

        if rsi < self.oversold {
            let depth = (self.oversold - rsi) / self.oversold.max(f64::MIN_POSITIVE);
            Some(Signal::buy(
                50.0 + depth * 50.0,
                self.risk.params(close, atr, true),
            ))
        } else if rsi > self.overbought {
            let depth = (rsi - self.overbought) / (100.0 - self.overbought).max(f64::MIN_POSITIVE);
            Some(Signal::sell(
                50.0 + depth * 50.0,
                self.risk.params(close, atr, false),
            ))
        } else {
            Some(Signal::hold())
        }
    }
}
