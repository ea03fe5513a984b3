//! Single-position lifecycle: open, trail, scale out, close.
//!
//! State machine: Flat → Open → (Partial)* → Flat. At most one position is
//! held at a time; every close produces an immutable [`ClosedTrade`].

use chrono::NaiveDateTime;
use tracing::{debug, trace};

use super::error::SimError;
use super::execution::calculate_commission;
use super::position::{ClosedTrade, ExitReason, Position, Side};

/// Risk-management thresholds. Percentages are in percent (2.0 == 2%),
/// fractions are of the original quantity (0.5 == half).
#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub default_stop_loss_pct: f64,
    pub default_take_profit_pct: f64,
    pub trailing_activation_pct: f64,
    /// Trailing distance used when the position carries no ATR value.
    pub trailing_fallback_pct: f64,
    pub partial_exits_enabled: bool,
    pub profit_target_1_pct: f64,
    pub profit_target_1_fraction: f64,
    pub profit_target_2_pct: f64,
    pub profit_target_2_fraction: f64,
    pub protection_peak_pct: f64,
    pub protection_floor_pct: f64,
    pub max_holding_bars: Option<usize>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            default_stop_loss_pct: 3.0,
            default_take_profit_pct: 6.0,
            trailing_activation_pct: 1.0,
            trailing_fallback_pct: 2.0,
            partial_exits_enabled: true,
            profit_target_1_pct: 2.0,
            profit_target_1_fraction: 0.5,
            profit_target_2_pct: 4.0,
            profit_target_2_fraction: 0.25,
            protection_peak_pct: 5.0,
            protection_floor_pct: 2.0,
            max_holding_bars: None,
        }
    }
}

impl RiskConfig {
    /// Rejects thresholds the state machine cannot honour, such as profit
    /// target fractions that would close more than the whole position.
    pub fn validate(&self) -> Result<(), SimError> {
        let positive = [
            ("default_stop_loss_pct", self.default_stop_loss_pct),
            ("default_take_profit_pct", self.default_take_profit_pct),
            ("trailing_fallback_pct", self.trailing_fallback_pct),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid_risk(key, format!("must be positive, got {value}")));
            }
        }
        if self.trailing_fallback_pct >= 100.0 {
            return Err(invalid_risk("trailing_fallback_pct", "must be below 100".into()));
        }
        if self.trailing_activation_pct.is_nan() || self.trailing_activation_pct < 0.0 {
            return Err(invalid_risk("trailing_activation_pct", "must be non-negative".into()));
        }
        if !(self.protection_floor_pct >= 0.0 && self.protection_peak_pct > self.protection_floor_pct) {
            return Err(invalid_risk(
                "protection_peak_pct",
                format!(
                    "must exceed protection_floor_pct ({} <= {})",
                    self.protection_peak_pct, self.protection_floor_pct
                ),
            ));
        }
        for (key, fraction) in [
            ("profit_target_1_fraction", self.profit_target_1_fraction),
            ("profit_target_2_fraction", self.profit_target_2_fraction),
        ] {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(invalid_risk(key, format!("must be in (0, 1), got {fraction}")));
            }
        }
        if self.profit_target_1_fraction + self.profit_target_2_fraction >= 1.0 {
            return Err(invalid_risk(
                "profit_target_2_fraction",
                format!(
                    "targets close {} + {} of the position, leaving nothing open",
                    self.profit_target_1_fraction, self.profit_target_2_fraction
                ),
            ));
        }
        if !(self.profit_target_1_pct > 0.0 && self.profit_target_2_pct > self.profit_target_1_pct) {
            return Err(invalid_risk(
                "profit_target_2_pct",
                "targets must be positive and ascending".into(),
            ));
        }
        Ok(())
    }
}

fn invalid_risk(key: &str, reason: String) -> SimError {
    SimError::ConfigInvalid {
        section: "risk".into(),
        key: key.into(),
        reason,
    }
}

/// A scale-out decision returned by [`PositionManager::check_partial_exits`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialExit {
    pub fraction: f64,
    pub reason: ExitReason,
}

/// Everything needed to open a position.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing_stop_multiplier: f64,
    pub atr_value: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PositionManager {
    risk: RiskConfig,
    commission_rate: f64,
    position: Option<Position>,
}

impl PositionManager {
    pub fn new(risk: RiskConfig, commission_rate: f64) -> Self {
        PositionManager {
            risk,
            commission_rate,
            position: None,
        }
    }

    pub fn risk(&self) -> &RiskConfig {
        &self.risk
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    /// Opens a position. Fails without touching state if one is already held.
    pub fn open(&mut self, req: OpenRequest) -> Result<&Position, SimError> {
        if let Some(existing) = &self.position {
            return Err(SimError::AlreadyOpen {
                symbol: existing.symbol.clone(),
            });
        }
        if !(req.quantity.is_finite() && req.quantity > 0.0) {
            return Err(SimError::InvalidOrder {
                reason: format!("quantity must be positive, got {}", req.quantity),
            });
        }
        if !(req.entry_price.is_finite() && req.entry_price > 0.0) {
            return Err(SimError::InvalidOrder {
                reason: format!("entry price must be positive, got {}", req.entry_price),
            });
        }

        let sign = req.side.sign();
        let stop_loss = req
            .stop_loss
            .unwrap_or(req.entry_price * (1.0 - sign * self.risk.default_stop_loss_pct / 100.0));
        let take_profit = req
            .take_profit
            .unwrap_or(req.entry_price * (1.0 + sign * self.risk.default_take_profit_pct / 100.0));

        // stop below / target above entry for longs, mirrored for shorts
        if sign * (req.entry_price - stop_loss) <= 0.0 {
            return Err(SimError::InvalidOrder {
                reason: format!(
                    "stop loss {stop_loss} is on the wrong side of entry {} for {}",
                    req.entry_price, req.side
                ),
            });
        }
        if sign * (take_profit - req.entry_price) <= 0.0 {
            return Err(SimError::InvalidOrder {
                reason: format!(
                    "take profit {take_profit} is on the wrong side of entry {} for {}",
                    req.entry_price, req.side
                ),
            });
        }

        let entry_commission =
            calculate_commission(req.quantity * req.entry_price, self.commission_rate);

        debug!(
            symbol = %req.symbol,
            side = %req.side,
            quantity = req.quantity,
            entry = req.entry_price,
            stop_loss,
            take_profit,
            "opening position"
        );

        let position = Position {
            symbol: req.symbol,
            side: req.side,
            quantity: req.quantity,
            original_quantity: req.quantity,
            entry_price: req.entry_price,
            entry_time: req.entry_time,
            stop_loss,
            initial_stop_loss: stop_loss,
            take_profit,
            extreme_price: req.entry_price,
            trailing_enabled: false,
            profit_target_1_hit: false,
            profit_target_2_hit: false,
            peak_profit_percent: 0.0,
            atr_value: req.atr_value.filter(|a| a.is_finite() && *a > 0.0),
            trailing_stop_multiplier: req.trailing_stop_multiplier,
            bars_held: 0,
            entry_commission_remaining: entry_commission,
        };
        Ok(self.position.insert(position))
    }

    /// Advances the holding-period counter by one bar.
    pub fn on_bar(&mut self) {
        if let Some(pos) = self.position.as_mut() {
            pos.bars_held += 1;
        }
    }

    /// Tracks the favourable extreme and ratchets the trailing stop.
    ///
    /// Returns the new stop when it moved. The stop never loosens.
    pub fn update_trailing_stop(&mut self, current_price: f64) -> Option<f64> {
        let risk = &self.risk;
        let pos = self.position.as_mut()?;

        let favourable = match pos.side {
            Side::Long => current_price > pos.extreme_price,
            Side::Short => current_price < pos.extreme_price,
        };
        if favourable {
            pos.extreme_price = current_price;
        }

        let profit_pct = pos.profit_percent(current_price);
        if profit_pct > pos.peak_profit_percent {
            pos.peak_profit_percent = profit_pct;
        }

        if !pos.trailing_enabled && profit_pct > risk.trailing_activation_pct {
            trace!(profit_pct, "trailing stop activated");
            pos.trailing_enabled = true;
        }
        if !pos.trailing_enabled {
            return None;
        }

        let sign = pos.side.sign();
        let candidate = match pos.atr_value {
            Some(atr) => pos.extreme_price - sign * atr * pos.trailing_stop_multiplier,
            None => pos.extreme_price * (1.0 - sign * risk.trailing_fallback_pct / 100.0),
        };

        if pos.is_tighter_stop(candidate) {
            trace!(from = pos.stop_loss, to = candidate, "trailing stop ratcheted");
            pos.stop_loss = candidate;
            Some(candidate)
        } else {
            None
        }
    }

    /// Evaluates the profit targets in ascending order. A target fires at
    /// most once per position; the second only after the first.
    ///
    /// A target whose slice would not leave part of the position open does
    /// not fire and stays armed.
    pub fn check_partial_exits(&mut self, current_price: f64) -> Option<PartialExit> {
        let risk = &self.risk;
        if !risk.partial_exits_enabled {
            return None;
        }
        let pos = self.position.as_mut()?;
        let profit_pct = pos.profit_percent(current_price);

        if !pos.profit_target_1_hit {
            if profit_pct >= risk.profit_target_1_pct
                && slice_fits(pos, risk.profit_target_1_fraction)
            {
                pos.profit_target_1_hit = true;
                return Some(PartialExit {
                    fraction: risk.profit_target_1_fraction,
                    reason: ExitReason::PartialExit1,
                });
            }
            return None;
        }

        if !pos.profit_target_2_hit
            && profit_pct >= risk.profit_target_2_pct
            && slice_fits(pos, risk.profit_target_2_fraction)
        {
            pos.profit_target_2_hit = true;
            return Some(PartialExit {
                fraction: risk.profit_target_2_fraction,
                reason: ExitReason::PartialExit2,
            });
        }
        None
    }

    /// Risk exits in priority order: stop loss, take profit, profit
    /// protection, max holding period.
    pub fn check_exit_conditions(&self, current_price: f64) -> Option<ExitReason> {
        let pos = self.position.as_ref()?;

        if pos.should_stop_loss(current_price) {
            return Some(ExitReason::StopLoss);
        }
        if pos.should_take_profit(current_price) {
            return Some(ExitReason::TakeProfit);
        }
        if pos.peak_profit_percent >= self.risk.protection_peak_pct
            && pos.profit_percent(current_price) < self.risk.protection_floor_pct
        {
            return Some(ExitReason::ProfitProtection);
        }
        if let Some(max_bars) = self.risk.max_holding_bars {
            if pos.bars_held >= max_bars {
                return Some(ExitReason::MaxHoldingPeriod);
            }
        }
        None
    }

    /// Closes `fraction` of the original quantity; the remainder stays open.
    pub fn partial_close(
        &mut self,
        exit_price: f64,
        exit_time: NaiveDateTime,
        fraction: f64,
        reason: ExitReason,
    ) -> Result<ClosedTrade, SimError> {
        let rate = self.commission_rate;
        let pos = self.position.as_mut().ok_or(SimError::NoOpenPosition)?;

        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(SimError::InvalidFraction {
                fraction,
                reason: "must be strictly between 0 and 1".into(),
            });
        }
        let slice = fraction * pos.original_quantity;
        if slice >= pos.quantity {
            return Err(SimError::InvalidFraction {
                fraction,
                reason: format!(
                    "slice {slice} would not leave any of the remaining {} open",
                    pos.quantity
                ),
            });
        }

        let trade = settle(pos, slice, exit_price, exit_time, reason, true, rate);
        let attributed = trade_entry_share(pos, slice);
        pos.entry_commission_remaining -= attributed;
        pos.quantity -= slice;

        debug!(
            symbol = %trade.symbol,
            reason = %reason,
            quantity = slice,
            remaining = pos.quantity,
            pnl = trade.pnl,
            "partial close"
        );
        Ok(trade)
    }

    /// Closes the whole position and returns to Flat.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: NaiveDateTime,
        reason: ExitReason,
    ) -> Result<ClosedTrade, SimError> {
        let pos = self.position.take().ok_or(SimError::NoOpenPosition)?;
        let trade = settle(
            &pos,
            pos.quantity,
            exit_price,
            exit_time,
            reason,
            false,
            self.commission_rate,
        );
        debug!(
            symbol = %trade.symbol,
            reason = %reason,
            quantity = trade.quantity,
            pnl = trade.pnl,
            trailing_used = trade.trailing_used,
            "position closed"
        );
        Ok(trade)
    }
}

/// `fraction` of the original quantity is a proper part of what remains.
fn slice_fits(pos: &Position, fraction: f64) -> bool {
    fraction > 0.0 && fraction < 1.0 && fraction * pos.original_quantity < pos.quantity
}

fn trade_entry_share(pos: &Position, quantity: f64) -> f64 {
    pos.entry_commission_remaining * quantity / pos.quantity
}

fn settle(
    pos: &Position,
    quantity: f64,
    exit_price: f64,
    exit_time: NaiveDateTime,
    reason: ExitReason,
    is_partial: bool,
    commission_rate: f64,
) -> ClosedTrade {
    let entry_share = trade_entry_share(pos, quantity);
    let exit_commission = calculate_commission(quantity * exit_price, commission_rate);
    let price_pnl = pos.side.sign() * quantity * (exit_price - pos.entry_price);

    ClosedTrade {
        symbol: pos.symbol.clone(),
        side: pos.side,
        entry_price: pos.entry_price,
        exit_price,
        entry_time: pos.entry_time,
        exit_time,
        quantity,
        pnl: price_pnl - entry_share - exit_commission,
        pnl_percent: pos.profit_percent(exit_price),
        commission: entry_share + exit_commission,
        reason,
        is_partial,
        trailing_used: pos.trailing_enabled,
        peak_profit_percent: pos.peak_profit_percent,
    }
}
