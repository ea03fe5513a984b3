//! Per-bar trading signal emitted by a strategy.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::Hold => write!(f, "HOLD"),
        }
    }
}

/// Risk parameters attached to a signal.
///
/// `stop_loss_price`/`take_profit_price` of `None` mean "use the configured
/// default percentages around the entry price".
#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    /// Scales the configured base position fraction, clamped to 0..=1.
    pub position_size_multiplier: f64,
    pub atr_value: Option<f64>,
    pub trailing_stop_multiplier: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            stop_loss_price: None,
            take_profit_price: None,
            position_size_multiplier: 1.0,
            atr_value: None,
            trailing_stop_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    /// 0..=100
    pub confidence: f64,
    pub risk: RiskParams,
}

impl Signal {
    pub fn new(kind: SignalKind, confidence: f64, risk: RiskParams) -> Self {
        Signal {
            kind,
            confidence: confidence.clamp(0.0, 100.0),
            risk,
        }
    }

    pub fn hold() -> Self {
        Signal {
            kind: SignalKind::Hold,
            confidence: 0.0,
            risk: RiskParams::default(),
        }
    }

    pub fn buy(confidence: f64, risk: RiskParams) -> Self {
        Self::new(SignalKind::Buy, confidence, risk)
    }

    pub fn sell(confidence: f64, risk: RiskParams) -> Self {
        Self::new(SignalKind::Sell, confidence, risk)
    }

    /// True when the signal is of `kind` and meets the confidence threshold.
    pub fn is_actionable(&self, kind: SignalKind, threshold: f64) -> bool {
        self.kind == kind && self.confidence >= threshold
    }

    pub fn size_multiplier(&self) -> f64 {
        let m = self.risk.position_size_multiplier;
        if m.is_finite() { m.clamp(0.0, 1.0) } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Signal::buy(150.0, RiskParams::default()).confidence, 100.0);
        assert_eq!(Signal::sell(-5.0, RiskParams::default()).confidence, 0.0);
    }

    #[test]
    fn actionable_requires_kind_and_threshold() {
        let sig = Signal::buy(70.0, RiskParams::default());
        assert!(sig.is_actionable(SignalKind::Buy, 70.0));
        assert!(!sig.is_actionable(SignalKind::Buy, 70.1));
        assert!(!sig.is_actionable(SignalKind::Sell, 10.0));
        assert!(!Signal::hold().is_actionable(SignalKind::Hold, 50.0));
    }

    #[test]
    fn size_multiplier_clamped() {
        let mut risk = RiskParams {
            position_size_multiplier: 1.7,
            ..RiskParams::default()
        };
        assert_eq!(Signal::buy(80.0, risk.clone()).size_multiplier(), 1.0);
        risk.position_size_multiplier = f64::NAN;
        assert_eq!(Signal::buy(80.0, risk.clone()).size_multiplier(), 0.0);
        risk.position_size_multiplier = 0.4;
        assert_eq!(Signal::buy(80.0, risk).size_multiplier(), 0.4);
    }

    #[test]
    fn kind_display() {
        assert_eq!(SignalKind::Buy.to_string(), "BUY");
        assert_eq!(SignalKind::Sell.to_string(), "SELL");
        assert_eq!(SignalKind::Hold.to_string(), "HOLD");
    }
}
