//! Bar-by-bar replay of signals against a single position.
//!
//! Per bar: mark equity at the close, then either manage the open position
//! (trail, scale out, exit) or act on an entry signal. Whatever is still
//! open after the last bar is closed with [`ExitReason::EndOfBacktest`].

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::error::SimError;
use super::execution::{exit_proceeds, size_entry, EntryResult};
use super::ohlcv::Bar;
use super::position::{ClosedTrade, ExitReason, Side};
use super::position_manager::{OpenRequest, PositionManager, RiskConfig};
use super::signal::{Signal, SignalKind};
use super::strategy::{generate_signals, Strategy};

pub const DEFAULT_MIN_BARS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub symbol: String,
    pub initial_capital: f64,
    /// Fraction of traded notional, e.g. 0.001 == 0.1%.
    pub commission_rate: f64,
    /// Fraction of cash committed per entry before the signal's size multiplier.
    pub base_position_fraction: f64,
    /// Minimum signal confidence (0..=100) to act on.
    pub confidence_threshold: f64,
    pub min_bars: usize,
    pub allow_shorting: bool,
    pub risk: RiskConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            symbol: "BTCUSDT".into(),
            initial_capital: 10_000.0,
            commission_rate: 0.001,
            base_position_fraction: 0.95,
            confidence_threshold: 60.0,
            min_bars: DEFAULT_MIN_BARS,
            allow_shorting: false,
            risk: RiskConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    pub cash: f64,
    pub price: f64,
    /// Open quantity at the mark, negative when short and 0 when flat.
    pub quantity: f64,
    /// Entry price of the open position, 0 when flat.
    pub entry_price: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub symbol: String,
    pub initial_capital: f64,
    pub final_cash: f64,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl SimulationResult {
    pub fn total_pnl(&self) -> f64 {
        self.closed_trades.iter().map(|t| t.pnl).sum()
    }

    pub fn full_trades(&self) -> impl Iterator<Item = &ClosedTrade> {
        self.closed_trades.iter().filter(|t| !t.is_partial)
    }

    pub fn partial_trades(&self) -> impl Iterator<Item = &ClosedTrade> {
        self.closed_trades.iter().filter(|t| t.is_partial)
    }
}

/// Single-use engine: build one per run.
#[derive(Debug)]
pub struct SimulationEngine {
    config: SimulationConfig,
    manager: PositionManager,
    cash: f64,
    closed_trades: Vec<ClosedTrade>,
    equity_curve: Vec<EquityPoint>,
}

impl SimulationEngine {
    pub fn new(config: SimulationConfig) -> Self {
        let manager = PositionManager::new(config.risk.clone(), config.commission_rate);
        SimulationEngine {
            cash: config.initial_capital,
            config,
            manager,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Generates signals with `strategy` and replays them.
    ///
    /// Bars with no signal (indicator warm-up) are treated as HOLD; if the
    /// strategy never produces a signal the run fails with
    /// [`SimError::NoUsableSignals`].
    pub fn run(self, bars: &[Bar], strategy: &dyn Strategy) -> Result<SimulationResult, SimError> {
        self.check_inputs(bars)?;

        let signals = generate_signals(bars, strategy);
        if signals.iter().all(Option::is_none) {
            return Err(SimError::NoUsableSignals {
                symbol: self.config.symbol.clone(),
                bars: bars.len(),
            });
        }
        let signals: Vec<Signal> = signals
            .into_iter()
            .map(|s| s.unwrap_or_else(Signal::hold))
            .collect();

        debug!(strategy = %strategy.name(), "signals generated");
        self.replay(bars, &signals)
    }

    /// Replays precomputed signals, one per bar.
    pub fn run_with_signals(
        self,
        bars: &[Bar],
        signals: &[Signal],
    ) -> Result<SimulationResult, SimError> {
        self.check_inputs(bars)?;
        if bars.len() != signals.len() {
            return Err(SimError::SignalCountMismatch {
                bars: bars.len(),
                signals: signals.len(),
            });
        }
        self.replay(bars, signals)
    }

    fn check_inputs(&self, bars: &[Bar]) -> Result<(), SimError> {
        self.config.risk.validate()?;
        let minimum = self.config.min_bars.max(1);
        if bars.len() < minimum {
            return Err(SimError::InsufficientData {
                symbol: self.config.symbol.clone(),
                bars: bars.len(),
                minimum,
            });
        }
        Ok(())
    }

    fn replay(mut self, bars: &[Bar], signals: &[Signal]) -> Result<SimulationResult, SimError> {
        info!(
            symbol = %self.config.symbol,
            bars = bars.len(),
            initial_capital = self.config.initial_capital,
            "simulation started"
        );

        for (bar, signal) in bars.iter().zip(signals) {
            self.step(bar, signal)?;
        }

        if let Some(last) = bars.last() {
            if self.manager.is_open() {
                let trade = self
                    .manager
                    .close(last.close, last.timestamp, ExitReason::EndOfBacktest)?;
                self.record_close(trade);
            }
        }

        info!(
            symbol = %self.config.symbol,
            trades = self.closed_trades.len(),
            final_cash = self.cash,
            "simulation finished"
        );

        Ok(SimulationResult {
            symbol: self.config.symbol,
            initial_capital: self.config.initial_capital,
            final_cash: self.cash,
            closed_trades: self.closed_trades,
            equity_curve: self.equity_curve,
        })
    }

    fn step(&mut self, bar: &Bar, signal: &Signal) -> Result<(), SimError> {
        let price = bar.close;
        let (market_value, quantity, entry_price) =
            self.manager.position().map_or((0.0, 0.0, 0.0), |pos| {
                let signed = match pos.side {
                    Side::Long => pos.quantity,
                    Side::Short => -pos.quantity,
                };
                (pos.market_value(price), signed, pos.entry_price)
            });
        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.cash + market_value,
            cash: self.cash,
            price,
            quantity,
            entry_price,
        });

        if self.manager.is_open() {
            self.manage_position(bar, signal)
        } else {
            self.try_enter(bar, signal);
            Ok(())
        }
    }

    fn manage_position(&mut self, bar: &Bar, signal: &Signal) -> Result<(), SimError> {
        let price = bar.close;
        self.manager.on_bar();

        if let Some(stop) = self.manager.update_trailing_stop(price) {
            debug!(timestamp = %bar.timestamp, stop, "stop moved");
        }

        if let Some(partial) = self.manager.check_partial_exits(price) {
            let trade =
                self.manager
                    .partial_close(price, bar.timestamp, partial.fraction, partial.reason)?;
            self.record_close(trade);
        }

        let threshold = self.config.confidence_threshold;
        let signal_exit = match self.manager.position().map(|pos| pos.side) {
            Some(Side::Long) => signal.is_actionable(SignalKind::Sell, threshold),
            Some(Side::Short) => signal.is_actionable(SignalKind::Buy, threshold),
            None => false,
        };

        // a strategy exit outranks the time limit but not the price levels
        let reason = match self.manager.check_exit_conditions(price) {
            Some(ExitReason::MaxHoldingPeriod) | None if signal_exit => Some(ExitReason::Signal),
            other => other,
        };

        if let Some(reason) = reason {
            let trade = self.manager.close(price, bar.timestamp, reason)?;
            self.record_close(trade);
        }
        Ok(())
    }

    fn try_enter(&mut self, bar: &Bar, signal: &Signal) {
        let threshold = self.config.confidence_threshold;
        let side = if signal.is_actionable(SignalKind::Buy, threshold) {
            Side::Long
        } else if self.config.allow_shorting && signal.is_actionable(SignalKind::Sell, threshold) {
            Side::Short
        } else {
            return;
        };

        let price = bar.close;
        let entry = size_entry(
            self.cash,
            self.config.base_position_fraction,
            signal.size_multiplier(),
            price,
            self.config.commission_rate,
        );
        let quantity = match entry {
            EntryResult::Entered { quantity, .. } => quantity,
            EntryResult::InsufficientCapital => {
                debug!(timestamp = %bar.timestamp, cash = self.cash, "entry skipped: no capital");
                return;
            }
        };

        let request = OpenRequest {
            symbol: self.config.symbol.clone(),
            side,
            quantity,
            entry_price: price,
            entry_time: bar.timestamp,
            stop_loss: signal.risk.stop_loss_price,
            take_profit: signal.risk.take_profit_price,
            trailing_stop_multiplier: signal.risk.trailing_stop_multiplier,
            atr_value: signal.risk.atr_value,
        };

        match self.manager.open(request) {
            Ok(_) => {
                self.cash -= entry.total_cost();
                debug!(
                    timestamp = %bar.timestamp,
                    %side,
                    quantity,
                    price,
                    confidence = signal.confidence,
                    "entered"
                );
            }
            Err(e) => warn!(timestamp = %bar.timestamp, error = %e, "entry rejected"),
        }
    }

    fn record_close(&mut self, trade: ClosedTrade) {
        self.cash += exit_proceeds(
            trade.side,
            trade.quantity,
            trade.entry_price,
            trade.exit_price,
            self.config.commission_rate,
        );
        self.closed_trades.push(trade);
    }
}
