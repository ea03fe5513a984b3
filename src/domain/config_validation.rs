//! Configuration validation.
//!
//! Validates every section before a run so that the builders can read
//! values with plain defaults.

use crate::domain::error::SimError;
use crate::ports::config_port::ConfigPort;

pub const STRATEGY_EMA_CROSSOVER: &str = "ema_crossover";
pub const STRATEGY_RSI_REVERSION: &str = "rsi_reversion";

/// Runs every section validator, stopping at the first failure.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    validate_simulation_config(config)?;
    validate_risk_config(config)?;
    validate_strategy_config(config)?;
    validate_data_config(config)?;
    validate_optimizer_config(config)?;
    Ok(())
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    require_string(config, "simulation", "symbol")?;

    let capital = number(config, "simulation", "initial_capital", 10_000.0)?;
    if capital <= 0.0 {
        return Err(invalid("simulation", "initial_capital", "initial_capital must be positive"));
    }
    let rate = number(config, "simulation", "commission_rate", 0.001)?;
    if !(0.0..1.0).contains(&rate) {
        return Err(invalid(
            "simulation",
            "commission_rate",
            "commission_rate must be in [0, 1)",
        ));
    }
    let fraction = number(config, "simulation", "base_position_fraction", 0.95)?;
    if fraction <= 0.0 || fraction > 1.0 {
        return Err(invalid(
            "simulation",
            "base_position_fraction",
            "base_position_fraction must be in (0, 1]",
        ));
    }
    let threshold = number(config, "simulation", "confidence_threshold", 60.0)?;
    if !(0.0..=100.0).contains(&threshold) {
        return Err(invalid(
            "simulation",
            "confidence_threshold",
            "confidence_threshold must be between 0 and 100",
        ));
    }
    let min_bars = integer(config, "simulation", "min_bars", 100)?;
    if min_bars < 1 {
        return Err(invalid("simulation", "min_bars", "min_bars must be at least 1"));
    }
    boolean(config, "simulation", "allow_shorting")?;
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    for (key, default) in [("default_stop_loss_pct", 3.0), ("default_take_profit_pct", 6.0)] {
        if number(config, "risk", key, default)? <= 0.0 {
            return Err(invalid("risk", key, &format!("{key} must be positive")));
        }
    }
    if number(config, "risk", "trailing_activation_pct", 1.0)? < 0.0 {
        return Err(invalid(
            "risk",
            "trailing_activation_pct",
            "trailing_activation_pct must be non-negative",
        ));
    }
    let fallback = number(config, "risk", "trailing_fallback_pct", 2.0)?;
    if fallback <= 0.0 || fallback >= 100.0 {
        return Err(invalid(
            "risk",
            "trailing_fallback_pct",
            "trailing_fallback_pct must be in (0, 100)",
        ));
    }

    boolean(config, "risk", "partial_exits")?;
    let target_1 = number(config, "risk", "profit_target_1_pct", 2.0)?;
    let target_2 = number(config, "risk", "profit_target_2_pct", 4.0)?;
    let fraction_1 = number(config, "risk", "profit_target_1_fraction", 0.5)?;
    let fraction_2 = number(config, "risk", "profit_target_2_fraction", 0.25)?;
    if target_1 <= 0.0 {
        return Err(invalid("risk", "profit_target_1_pct", "profit_target_1_pct must be positive"));
    }
    if target_2 <= target_1 {
        return Err(invalid(
            "risk",
            "profit_target_2_pct",
            "profit_target_2_pct must exceed profit_target_1_pct",
        ));
    }
    for (key, value) in [
        ("profit_target_1_fraction", fraction_1),
        ("profit_target_2_fraction", fraction_2),
    ] {
        if value <= 0.0 || value >= 1.0 {
            return Err(invalid("risk", key, &format!("{key} must be in (0, 1)")));
        }
    }
    if fraction_1 + fraction_2 >= 1.0 {
        return Err(invalid(
            "risk",
            "profit_target_2_fraction",
            "profit target fractions must leave part of the position open",
        ));
    }

    let peak = number(config, "risk", "protection_peak_pct", 5.0)?;
    let floor = number(config, "risk", "protection_floor_pct", 2.0)?;
    if floor < 0.0 {
        return Err(invalid(
            "risk",
            "protection_floor_pct",
            "protection_floor_pct must be non-negative",
        ));
    }
    if peak <= floor {
        return Err(invalid(
            "risk",
            "protection_peak_pct",
            "protection_peak_pct must exceed protection_floor_pct",
        ));
    }
    if integer(config, "risk", "max_holding_bars", 0)? < 0 {
        return Err(invalid(
            "risk",
            "max_holding_bars",
            "max_holding_bars must be non-negative (0 disables)",
        ));
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    let kind = config
        .get_string("strategy", "type")
        .unwrap_or_else(|| STRATEGY_EMA_CROSSOVER.to_string());

    match kind.trim() {
        STRATEGY_EMA_CROSSOVER => {
            let fast = integer(config, "strategy", "fast_period", 9)?;
            let slow = integer(config, "strategy", "slow_period", 21)?;
            if fast < 1 {
                return Err(invalid("strategy", "fast_period", "fast_period must be at least 1"));
            }
            if slow <= fast {
                return Err(invalid(
                    "strategy",
                    "slow_period",
                    "slow_period must exceed fast_period",
                ));
            }
        }
        STRATEGY_RSI_REVERSION => {
            if integer(config, "strategy", "rsi_period", 14)? < 1 {
                return Err(invalid("strategy", "rsi_period", "rsi_period must be at least 1"));
            }
            let oversold = number(config, "strategy", "oversold", 30.0)?;
            let overbought = number(config, "strategy", "overbought", 70.0)?;
            if !(oversold > 0.0 && oversold < overbought && overbought < 100.0) {
                return Err(invalid(
                    "strategy",
                    "oversold",
                    "expected 0 < oversold < overbought < 100",
                ));
            }
        }
        other => {
            return Err(invalid(
                "strategy",
                "type",
                &format!(
                    "unknown strategy '{other}' (expected {STRATEGY_EMA_CROSSOVER} or {STRATEGY_RSI_REVERSION})"
                ),
            ));
        }
    }

    if integer(config, "strategy", "atr_period", 14)? < 1 {
        return Err(invalid("strategy", "atr_period", "atr_period must be at least 1"));
    }
    for (key, default) in [
        ("stop_atr_multiple", 2.0),
        ("reward_ratio", 2.0),
        ("trailing_multiplier", 2.0),
    ] {
        if number(config, "strategy", key, default)? <= 0.0 {
            return Err(invalid("strategy", key, &format!("{key} must be positive")));
        }
    }
    if number(config, "strategy", "target_volatility_pct", 2.0)? < 0.0 {
        return Err(invalid(
            "strategy",
            "target_volatility_pct",
            "target_volatility_pct must be non-negative (0 disables)",
        ));
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    require_string(config, "data", "directory")?;
    Ok(())
}

pub fn validate_optimizer_config(config: &dyn ConfigPort) -> Result<(), SimError> {
    for key in ["fast_periods", "slow_periods"] {
        if let Some(values) = list::<usize>(config, "optimizer", key)? {
            if values.is_empty() || values.contains(&0) {
                return Err(invalid(
                    "optimizer",
                    key,
                    &format!("{key} must list positive periods"),
                ));
            }
        }
    }
    for key in ["trailing_activation_pcts", "protection_peak_pcts"] {
        if let Some(values) = list::<f64>(config, "optimizer", key)? {
            if values.is_empty() || values.iter().any(|v| *v < 0.0) {
                return Err(invalid(
                    "optimizer",
                    key,
                    &format!("{key} must list non-negative percentages"),
                ));
            }
        }
    }
    let floor = number(config, "risk", "protection_floor_pct", 2.0)?;
    if let Some(peaks) = list::<f64>(config, "optimizer", "protection_peak_pcts")? {
        if peaks.iter().any(|peak| *peak <= floor) {
            return Err(invalid(
                "optimizer",
                "protection_peak_pcts",
                "protection_peak_pcts must exceed protection_floor_pct",
            ));
        }
    }
    if integer(config, "optimizer", "top", 10)? < 1 {
        return Err(invalid("optimizer", "top", "top must be at least 1"));
    }
    Ok(())
}

/// Parses a comma-separated list. `Ok(None)` when the key is absent.
pub fn list<T: std::str::FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Vec<T>>, SimError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| invalid(section, key, &format!("'{s}' is not a valid value")))
        })
        .collect::<Result<Vec<T>, SimError>>()
        .map(Some)
}

fn require_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SimError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn number(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, SimError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, &format!("'{s}' is not a number"))),
    }
}

fn integer(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<i64, SimError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(section, key, &format!("'{s}' is not an integer"))),
    }
}

fn boolean(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SimError> {
    match config.get_string(section, key) {
        None => Ok(()),
        Some(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "false" | "no" | "0" => Ok(()),
            _ => Err(invalid(section, key, &format!("'{s}' is not a boolean"))),
        },
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SimError {
    SimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
