//! Performance metrics over a finished simulation.
//!
//! Pure: the same ledger and equity curve always produce the same
//! [`Metrics`], bit for bit. Degenerate inputs yield 0 (or infinity for
//! a loss-free profit factor), never NaN.

use std::collections::BTreeMap;

use super::ohlcv::median_interval_secs;
use super::position::{ClosedTrade, ExitReason};
use super::simulation::{EquityPoint, SimulationResult};

pub const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Periods per year assumed when the curve is too short to infer a bar interval.
const FALLBACK_PERIODS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Every ledger entry, partial slices included.
    pub total_trades: usize,
    pub full_trades: usize,
    pub partial_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winning full trades over full trades.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub partial_pnl: f64,
    /// Realized P&L over initial capital.
    pub total_return: f64,
    pub annualized_return: f64,
    pub profit_factor: f64,
    /// Largest peak-to-trough fall of the equity curve, as a fraction.
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior equity peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub periods_per_year: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_secs: f64,
    /// Full trades that closed with the trailing stop active.
    pub trailing_stop_trades: usize,
    pub total_commission: f64,
    /// Share of ledger entries per exit reason.
    pub exit_reasons: BTreeMap<ExitReason, f64>,
}

impl Metrics {
    pub fn from_result(result: &SimulationResult) -> Self {
        Self::compute(
            &result.closed_trades,
            &result.equity_curve,
            result.initial_capital,
        )
    }

    pub fn compute(
        trades: &[ClosedTrade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
    ) -> Self {
        let periods_per_year = median_interval_secs(equity_curve.iter().map(|p| p.timestamp))
            .map(|secs| SECONDS_PER_YEAR / secs)
            .unwrap_or(FALLBACK_PERIODS_PER_YEAR);

        let full: Vec<&ClosedTrade> = trades.iter().filter(|t| !t.is_partial).collect();
        let partial_trades = trades.len() - full.len();

        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let partial_pnl: f64 = trades.iter().filter(|t| t.is_partial).map(|t| t.pnl).sum();
        let total_commission: f64 = trades.iter().map(|t| t.commission).sum();

        let total_return = if initial_capital > 0.0 {
            total_pnl / initial_capital
        } else {
            0.0
        };
        let annualized_return = annualize(total_return, equity_curve);

        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        for trade in trades {
            if trade.pnl > 0.0 {
                gross_profit += trade.pnl;
            } else if trade.pnl < 0.0 {
                gross_loss += trade.pnl.abs();
            }
        }
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_holding_secs = 0i64;
        let mut trailing_stop_trades = 0usize;

        for trade in &full {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                winning_trades += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                losing_trades += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
            total_holding_secs += trade.holding_secs();
            if trade.trailing_used {
                trailing_stop_trades += 1;
            }
        }

        let win_rate = ratio(winning_trades as f64, full.len() as f64);
        let avg_win = ratio(total_wins, winning_trades as f64);
        let avg_loss = ratio(total_losses, losing_trades as f64);
        let avg_holding_secs = ratio(total_holding_secs as f64, full.len() as f64);

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let full_returns: Vec<f64> = full.iter().map(|t| t.pnl_percent).collect();
        let sharpe_ratio = sharpe(&full_returns, periods_per_year);
        let sortino_ratio = sortino(&equity_returns(equity_curve), periods_per_year);

        let mut counts: BTreeMap<ExitReason, usize> = BTreeMap::new();
        for trade in trades {
            *counts.entry(trade.reason).or_insert(0) += 1;
        }
        let exit_reasons = counts
            .into_iter()
            .map(|(reason, n)| (reason, n as f64 / trades.len() as f64))
            .collect();

        Metrics {
            total_trades: trades.len(),
            full_trades: full.len(),
            partial_trades,
            winning_trades,
            losing_trades,
            win_rate,
            total_pnl,
            partial_pnl,
            total_return,
            annualized_return,
            profit_factor,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
            periods_per_year,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_holding_secs,
            trailing_stop_trades,
            total_commission,
            exit_reasons,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn annualize(total_return: f64, equity_curve: &[EquityPoint]) -> f64 {
    let (first, last) = match (equity_curve.first(), equity_curve.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return 0.0,
    };
    let years = (last.timestamp - first.timestamp).num_seconds() as f64 / SECONDS_PER_YEAR;
    let growth = 1.0 + total_return;
    if years > 0.0 && growth > 0.0 && total_return.is_finite() {
        growth.powf(1.0 / years) - 1.0
    } else {
        0.0
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let mut points = equity_curve.iter();
    let mut peak = match points.next() {
        Some(p) => p.equity,
        None => return (0.0, 0),
    };

    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for point in points {
        if point.equity >= peak {
            peak = point.equity;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}

fn equity_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean over population standard deviation, annualized.
fn sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let m = mean(returns);
    let variance = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / returns.len() as f64;
    let stddev = variance.sqrt();
    if stddev > 0.0 {
        m / stddev * periods_per_year.sqrt()
    } else {
        0.0
    }
}

/// Mean over downside deviation, annualized.
fn sortino(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let m = mean(returns);
    let downside =
        returns.iter().filter(|&&r| r < 0.0).map(|r| r.powi(2)).sum::<f64>() / returns.len() as f64;
    let downside_dev = downside.sqrt();
    if downside_dev > 0.0 {
        m / downside_dev * periods_per_year.sqrt()
    } else {
        0.0
    }
}
