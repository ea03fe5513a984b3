//! Position state and the closed-trade ledger entry.

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Why a trade (or a slice of one) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ProfitProtection,
    PartialExit1,
    PartialExit2,
    Signal,
    MaxHoldingPeriod,
    EndOfBacktest,
}

impl ExitReason {
    pub fn label(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "Stop loss",
            ExitReason::TakeProfit => "Take profit",
            ExitReason::ProfitProtection => "Profit protection",
            ExitReason::PartialExit1 => "Partial exit 1",
            ExitReason::PartialExit2 => "Partial exit 2",
            ExitReason::Signal => "Signal exit",
            ExitReason::MaxHoldingPeriod => "Max holding period",
            ExitReason::EndOfBacktest => "End of Backtest",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A currently-held stake. Only `PositionManager` mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub original_quantity: f64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub stop_loss: f64,
    pub initial_stop_loss: f64,
    pub take_profit: f64,
    /// Highest price seen for a long, lowest for a short.
    pub extreme_price: f64,
    pub trailing_enabled: bool,
    pub profit_target_1_hit: bool,
    pub profit_target_2_hit: bool,
    pub peak_profit_percent: f64,
    pub atr_value: Option<f64>,
    pub trailing_stop_multiplier: f64,
    pub bars_held: usize,
    /// Entry commission not yet attributed to a closed slice.
    pub entry_commission_remaining: f64,
}

impl Position {
    /// Value of the stake if liquidated at `price`, before commission.
    ///
    /// Shorts are cash-secured: the entry notional is escrowed, so the value
    /// is that notional plus the unrealized gain.
    pub fn market_value(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.quantity * price,
            Side::Short => self.quantity * (2.0 * self.entry_price - price),
        }
    }

    /// Unrealized profit in percent of the entry price.
    pub fn profit_percent(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * 100.0 / self.entry_price
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss,
            Side::Short => price >= self.stop_loss,
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price >= self.take_profit,
            Side::Short => price <= self.take_profit,
        }
    }

    /// True if `candidate` is a tighter (more protective) stop than the current one.
    pub fn is_tighter_stop(&self, candidate: f64) -> bool {
        match self.side {
            Side::Long => candidate > self.stop_loss,
            Side::Short => candidate < self.stop_loss,
        }
    }
}

/// An immutable ledger entry for a full or partial close.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub quantity: f64,
    /// Net of the entry and exit commission attributed to this slice.
    pub pnl: f64,
    /// Price move in percent of entry, signed by side; excludes commission.
    pub pnl_percent: f64,
    pub commission: f64,
    pub reason: ExitReason,
    pub is_partial: bool,
    pub trailing_used: bool,
    pub peak_profit_percent: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn holding_secs(&self) -> i64 {
        (self.exit_time - self.entry_time).num_seconds()
    }
}
