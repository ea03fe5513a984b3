//! Fill arithmetic: commission, entry sizing and exit settlement.
//!
//! Commission is a flat fraction of traded notional, charged on entry cost
//! and on exit proceeds, never on mark-to-market.

use super::position::Side;

/// Commission on a traded notional: `trade_value * rate`.
pub fn calculate_commission(trade_value: f64, rate: f64) -> f64 {
    trade_value * rate
}

/// Result of an entry sizing attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        cost: f64,
        commission: f64,
    },
    InsufficientCapital,
}

impl EntryResult {
    /// Cash debited by the entry.
    pub fn total_cost(&self) -> f64 {
        match self {
            EntryResult::Entered {
                cost, commission, ..
            } => cost + commission,
            EntryResult::InsufficientCapital => 0.0,
        }
    }
}

/// Size an entry.
///
/// Steps:
/// 1. Allocate `cash * base_fraction * size_multiplier`
/// 2. quantity = allocation / price (fractional units allowed)
/// 3. If cost + commission exceeds cash, shrink to what cash can cover
/// 4. Non-positive or non-finite quantity → InsufficientCapital
///
/// The returned `cost + commission` never exceeds `cash`, so debiting it
/// cannot drive cash below zero.
pub fn size_entry(
    cash: f64,
    base_fraction: f64,
    size_multiplier: f64,
    price: f64,
    commission_rate: f64,
) -> EntryResult {
    if !(price.is_finite() && price > 0.0) || cash <= 0.0 {
        return EntryResult::InsufficientCapital;
    }

    let allocation = cash * base_fraction * size_multiplier;
    let mut quantity = allocation / price;

    if quantity * price * (1.0 + commission_rate) > cash {
        quantity = cash / (price * (1.0 + commission_rate));
    }

    // the division above can round a few ulps over
    for _ in 0..MAX_SHRINK_STEPS {
        let cost = quantity * price;
        let commission = calculate_commission(cost, commission_rate);
        if !(quantity.is_finite() && quantity > 0.0) {
            break;
        }
        if cost + commission <= cash {
            return EntryResult::Entered {
                quantity,
                cost,
                commission,
            };
        }
        quantity *= 1.0 - SHRINK_STEP;
    }
    EntryResult::InsufficientCapital
}

const MAX_SHRINK_STEPS: usize = 8;
const SHRINK_STEP: f64 = 1e-12;

/// Cash returned when `quantity` units entered at `entry_price` are closed at
/// `exit_price`, net of exit commission.
///
/// Long: sale proceeds. Short: the escrowed entry notional plus the short's
/// gain (or minus its loss).
pub fn exit_proceeds(
    side: Side,
    quantity: f64,
    entry_price: f64,
    exit_price: f64,
    commission_rate: f64,
) -> f64 {
    let exit_value = quantity * exit_price;
    let exit_commission = calculate_commission(exit_value, commission_rate);
    match side {
        Side::Long => exit_value - exit_commission,
        Side::Short => {
            let entry_notional = quantity * entry_price;
            entry_notional + (entry_notional - exit_value) - exit_commission
        }
    }
}
