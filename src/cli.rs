//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{self, validate_config, STRATEGY_RSI_REVERSION};
use crate::domain::error::SimError;
use crate::domain::metrics::Metrics;
use crate::domain::optimizer::{OptimizationReport, Optimizer, ParamGrid};
use crate::domain::position_manager::RiskConfig;
use crate::domain::simulation::{SimulationConfig, SimulationEngine};
use crate::domain::strategy::{AtrRisk, EmaCrossover, RsiReversion, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "stoptrail",
    about = "Single-position backtester with trailing stops and partial exits"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the trade ledger as CSV
        #[arg(long)]
        trades_out: Option<PathBuf>,
        /// Write the equity curve as CSV
        #[arg(long)]
        equity_out: Option<PathBuf>,
    },
    /// Grid-search EMA periods and trailing/protection thresholds
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        /// Number of best runs to print
        #[arg(long)]
        top: Option<usize>,
        /// Run candidates one at a time
        #[arg(long)]
        sequential: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            trades_out,
            equity_out,
        } => run_backtest(&config, trades_out.as_deref(), equity_out.as_deref()),
        Command::Optimize {
            config,
            top,
            sequential,
        } => run_optimize(&config, top, !sequential),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: SimError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

/// Loads and validates the INI file at `path`.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    let adapter = FileConfigAdapter::from_file(path).map_err(fail)?;
    validate_config(&adapter).map_err(fail)?;
    Ok(adapter)
}

fn data_adapter(adapter: &dyn ConfigPort) -> CsvAdapter {
    let dir = adapter
        .get_string("data", "directory")
        .unwrap_or_else(|| ".".to_string());
    CsvAdapter::new(PathBuf::from(dir))
}

fn run_backtest(config_path: &Path, trades_out: Option<&Path>, equity_out: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let sim_config = build_simulation_config(&adapter);
    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    run_backtest_pipeline(
        &data_adapter(&adapter),
        &CsvReportAdapter::new(),
        sim_config,
        strategy.as_ref(),
        trades_out,
        equity_out,
    )
}

pub fn build_simulation_config(adapter: &dyn ConfigPort) -> SimulationConfig {
    let defaults = SimulationConfig::default();
    SimulationConfig {
        symbol: adapter
            .get_string("simulation", "symbol")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.symbol),
        initial_capital: adapter.get_double("simulation", "initial_capital", defaults.initial_capital),
        commission_rate: adapter.get_double("simulation", "commission_rate", defaults.commission_rate),
        base_position_fraction: adapter.get_double(
            "simulation",
            "base_position_fraction",
            defaults.base_position_fraction,
        ),
        confidence_threshold: adapter.get_double(
            "simulation",
            "confidence_threshold",
            defaults.confidence_threshold,
        ),
        min_bars: adapter
            .get_usize("simulation", "min_bars", defaults.min_bars)
            .max(1),
        allow_shorting: adapter.get_bool("simulation", "allow_shorting", defaults.allow_shorting),
        risk: build_risk_config(adapter),
    }
}

pub fn build_risk_config(adapter: &dyn ConfigPort) -> RiskConfig {
    let d = RiskConfig::default();
    let max_holding = adapter.get_usize("risk", "max_holding_bars", 0);
    RiskConfig {
        default_stop_loss_pct: adapter.get_double("risk", "default_stop_loss_pct", d.default_stop_loss_pct),
        default_take_profit_pct: adapter.get_double(
            "risk",
            "default_take_profit_pct",
            d.default_take_profit_pct,
        ),
        trailing_activation_pct: adapter.get_double(
            "risk",
            "trailing_activation_pct",
            d.trailing_activation_pct,
        ),
        trailing_fallback_pct: adapter.get_double("risk", "trailing_fallback_pct", d.trailing_fallback_pct),
        partial_exits_enabled: adapter.get_bool("risk", "partial_exits", d.partial_exits_enabled),
        profit_target_1_pct: adapter.get_double("risk", "profit_target_1_pct", d.profit_target_1_pct),
        profit_target_1_fraction: adapter.get_double(
            "risk",
            "profit_target_1_fraction",
            d.profit_target_1_fraction,
        ),
        profit_target_2_pct: adapter.get_double("risk", "profit_target_2_pct", d.profit_target_2_pct),
        profit_target_2_fraction: adapter.get_double(
            "risk",
            "profit_target_2_fraction",
            d.profit_target_2_fraction,
        ),
        protection_peak_pct: adapter.get_double("risk", "protection_peak_pct", d.protection_peak_pct),
        protection_floor_pct: adapter.get_double("risk", "protection_floor_pct", d.protection_floor_pct),
        max_holding_bars: (max_holding > 0).then_some(max_holding),
    }
}

fn build_atr_risk(adapter: &dyn ConfigPort) -> AtrRisk {
    let d = AtrRisk::default();
    AtrRisk {
        atr_period: adapter.get_usize("strategy", "atr_period", d.atr_period).max(1),
        stop_atr_multiple: adapter.get_double("strategy", "stop_atr_multiple", d.stop_atr_multiple),
        reward_ratio: adapter.get_double("strategy", "reward_ratio", d.reward_ratio),
        trailing_multiplier: adapter.get_double("strategy", "trailing_multiplier", d.trailing_multiplier),
        target_volatility_pct: adapter.get_double(
            "strategy",
            "target_volatility_pct",
            d.target_volatility_pct,
        ),
    }
}

pub fn build_ema_crossover(adapter: &dyn ConfigPort) -> EmaCrossover {
    EmaCrossover {
        fast: adapter.get_usize("strategy", "fast_period", 9).max(1),
        slow: adapter.get_usize("strategy", "slow_period", 21).max(1),
        risk: build_atr_risk(adapter),
    }
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Box<dyn Strategy>, SimError> {
    config_validation::validate_strategy_config(adapter)?;
    let kind = adapter.get_string("strategy", "type").unwrap_or_default();

    if kind.trim() == STRATEGY_RSI_REVERSION {
        Ok(Box::new(RsiReversion {
            period: adapter.get_usize("strategy", "rsi_period", 14).max(1),
            oversold: adapter.get_double("strategy", "oversold", 30.0),
            overbought: adapter.get_double("strategy", "overbought", 70.0),
            risk: build_atr_risk(adapter),
        }))
    } else {
        Ok(Box::new(build_ema_crossover(adapter)))
    }
}

pub fn build_param_grid(adapter: &dyn ConfigPort) -> Result<ParamGrid, SimError> {
    let d = ParamGrid::default();
    let list_or = |key: &str, default: Vec<f64>| -> Result<Vec<f64>, SimError> {
        Ok(config_validation::list::<f64>(adapter, "optimizer", key)?.unwrap_or(default))
    };
    Ok(ParamGrid {
        fast_periods: config_validation::list::<usize>(adapter, "optimizer", "fast_periods")?
            .unwrap_or(d.fast_periods),
        slow_periods: config_validation::list::<usize>(adapter, "optimizer", "slow_periods")?
            .unwrap_or(d.slow_periods),
        trailing_activation_pcts: list_or("trailing_activation_pcts", d.trailing_activation_pcts)?,
        protection_peak_pcts: list_or("protection_peak_pcts", d.protection_peak_pcts)?,
    })
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    sim_config: SimulationConfig,
    strategy: &dyn Strategy,
    trades_out: Option<&Path>,
    equity_out: Option<&Path>,
) -> ExitCode {
    let symbol = sim_config.symbol.clone();
    let bars = match data_port.fetch_bars(&symbol) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Running backtest: {} ({} bars) with {}",
        symbol,
        bars.len(),
        strategy.name()
    );

    let result = match SimulationEngine::new(sim_config).run(&bars, strategy) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let metrics = Metrics::from_result(&result);

    eprintln!("\n=== Results: {} ===", result.symbol);
    eprintln!("Initial Capital:  {:.2}", result.initial_capital);
    eprintln!("Final Cash:       {:.2}", result.final_cash);
    print_metrics(&metrics);

    if let Some(path) = trades_out {
        if let Err(e) = report_port.write_trades(&result.closed_trades, path) {
            return fail(e);
        }
        eprintln!("\nTrades written to: {}", path.display());
    }
    if let Some(path) = equity_out {
        if let Err(e) = report_port.write_equity(&result.equity_curve, path) {
            return fail(e);
        }
        eprintln!("Equity curve written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

fn print_metrics(metrics: &Metrics) {
    eprintln!("Total P&L:        {:.2}", metrics.total_pnl);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!(
        "Annualized:       {:.2}%",
        metrics.annualized_return * 100.0
    );
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!(
        "Max Drawdown:     -{:.1}% ({} bars)",
        metrics.max_drawdown * 100.0,
        metrics.max_drawdown_duration
    );
    eprintln!(
        "Trades:           {} full, {} partial",
        metrics.full_trades, metrics.partial_trades
    );
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Avg Win / Loss:   {:.2} / {:.2}", metrics.avg_win, metrics.avg_loss);
    eprintln!("Trailing Exits:   {}", metrics.trailing_stop_trades);
    eprintln!("Commission:       {:.2}", metrics.total_commission);

    if !metrics.exit_reasons.is_empty() {
        eprintln!("\n=== Exit Reasons ===");
        for (reason, share) in &metrics.exit_reasons {
            eprintln!("  {:<20} {:.1}%", reason.label(), share * 100.0);
        }
    }
}

fn run_optimize(config_path: &Path, top: Option<usize>, parallel: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let grid = match build_param_grid(&adapter) {
        Ok(g) => g,
        Err(e) => return fail(e),
    };
    if adapter.get_string("strategy", "type").as_deref().map(str::trim)
        == Some(STRATEGY_RSI_REVERSION)
    {
        eprintln!("note: the optimizer searches EMA crossover parameters");
    }
    let top = top.unwrap_or_else(|| adapter.get_usize("optimizer", "top", 10).max(1));

    run_optimize_pipeline(
        &data_adapter(&adapter),
        build_simulation_config(&adapter),
        build_ema_crossover(&adapter),
        &grid,
        top,
        parallel,
    )
}

pub fn run_optimize_pipeline(
    data_port: &dyn DataPort,
    sim_config: SimulationConfig,
    base_strategy: EmaCrossover,
    grid: &ParamGrid,
    top: usize,
    parallel: bool,
) -> ExitCode {
    let bars = match data_port.fetch_bars(&sim_config.symbol) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Optimizing {} over {} bars: {} candidates",
        sim_config.symbol,
        bars.len(),
        grid.candidates().len()
    );

    let report = match Optimizer::new(sim_config, base_strategy)
        .with_parallelism(parallel)
        .optimize(&bars, grid)
    {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    if report.runs.is_empty() {
        eprintln!(
            "error: no candidate produced a result ({} skipped for insufficient data)",
            report.skipped
        );
        return ExitCode::from(5);
    }
    print_optimization(&report, top);
    ExitCode::SUCCESS
}

fn print_optimization(report: &OptimizationReport, top: usize) {
    eprintln!(
        "\n=== Top {} of {} runs ({} skipped) ===",
        top.min(report.runs.len()),
        report.runs.len(),
        report.skipped
    );
    eprintln!(
        "  {:>4} {:>4} {:>8} {:>8} {:>8} {:>9} {:>7}",
        "fast", "slow", "trail%", "peak%", "sharpe", "return%", "trades"
    );
    for run in report.top(top) {
        let p = &run.params;
        let m = &run.metrics;
        eprintln!(
            "  {:>4} {:>4} {:>8.2} {:>8.2} {:>8.2} {:>9.2} {:>7}",
            p.fast,
            p.slow,
            p.trailing_activation_pct,
            p.protection_peak_pct,
            m.sharpe_ratio,
            m.total_return * 100.0,
            m.full_trades
        );
    }
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let sim_config = build_simulation_config(&adapter);
    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!("\nSimulation:");
    eprintln!("  symbol:          {}", sim_config.symbol);
    eprintln!("  initial capital: {:.2}", sim_config.initial_capital);
    eprintln!("  commission rate: {}", sim_config.commission_rate);
    eprintln!("  min bars:        {}", sim_config.min_bars);
    eprintln!("  allow shorting:  {}", sim_config.allow_shorting);
    eprintln!("\nStrategy: {}", strategy.name());

    match data_adapter(&adapter).list_symbols() {
        Ok(symbols) if symbols.contains(&sim_config.symbol) => {
            eprintln!("\nData: found {}.csv", sim_config.symbol);
        }
        Ok(_) => eprintln!("\nwarning: no data file for {}", sim_config.symbol),
        Err(e) => eprintln!("\nwarning: {e}"),
    }

    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}
