#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;
use stoptrail::domain::error::SimError;
pub use stoptrail::domain::ohlcv::Bar;
use stoptrail::domain::position_manager::RiskConfig;
use stoptrail::domain::signal::{RiskParams, Signal};
use stoptrail::domain::simulation::SimulationConfig;
use stoptrail::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, SimError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SimError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Hourly bars with open == high == low == close.
pub fn flat_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: start_time() + Duration::hours(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        })
        .collect()
}

/// Hourly bars tracing a drifting sine wave, enough crosses for EMA strategies.
pub fn wave_bars(count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 8.0 * (x / 9.0).sin() + 0.05 * x;
            Bar {
                timestamp: start_time() + Duration::hours(i as i64),
                open: close - 0.2,
                high: close + 0.8,
                low: close - 0.8,
                close,
                volume: 1_000.0 + x,
            }
        })
        .collect()
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}

pub fn write_symbol_csv(dir: &Path, symbol: &str, bars: &[Bar]) {
    std::fs::write(dir.join(format!("{symbol}.csv")), bars_to_csv(bars)).unwrap();
}

/// Zero-commission, all-in sizing, partial exits off.
pub fn plain_config() -> SimulationConfig {
    SimulationConfig {
        symbol: "TEST".into(),
        initial_capital: 1000.0,
        commission_rate: 0.0,
        base_position_fraction: 1.0,
        confidence_threshold: 50.0,
        min_bars: 1,
        allow_shorting: false,
        risk: RiskConfig {
            partial_exits_enabled: false,
            ..RiskConfig::default()
        },
    }
}

pub fn buy_signal(stop: f64, take: f64, atr: Option<f64>) -> Signal {
    Signal::buy(
        80.0,
        RiskParams {
            stop_loss_price: Some(stop),
            take_profit_price: Some(take),
            position_size_multiplier: 1.0,
            atr_value: atr,
            trailing_stop_multiplier: 2.0,
        },
    )
}

/// One entry signal followed by holds.
pub fn entry_then_hold(entry: Signal, total: usize) -> Vec<Signal> {
    let mut signals = vec![entry];
    signals.extend(std::iter::repeat_n(Signal::hold(), total.saturating_sub(1)));
    signals
}

pub fn is_success(code: ExitCode) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
}

pub fn same_code(a: ExitCode, b: u8) -> bool {
    format!("{a:?}") == format!("{:?}", ExitCode::from(b))
}
