//! Domain error types.

/// Top-level error type for stoptrail.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("no usable signal for {symbol} across {bars} bars (indicator warm-up too long?)")]
    NoUsableSignals { symbol: String, bars: usize },

    #[error("signal count {signals} does not match bar count {bars}")]
    SignalCountMismatch { bars: usize, signals: usize },

    #[error("a position in {symbol} is already open")]
    AlreadyOpen { symbol: String },

    #[error("no open position")]
    NoOpenPosition,

    #[error("invalid partial-close fraction {fraction}: {reason}")]
    InvalidFraction { fraction: f64, reason: String },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Data-sufficiency failures abort a single run but are not fatal to a batch.
    pub fn is_data_insufficient(&self) -> bool {
        matches!(
            self,
            SimError::InsufficientData { .. } | SimError::NoUsableSignals { .. }
        )
    }
}

impl From<&SimError> for std::process::ExitCode {
    fn from(err: &SimError) -> Self {
        let code: u8 = match err {
            SimError::Io(_) => 1,
            SimError::ConfigParse { .. }
            | SimError::ConfigMissing { .. }
            | SimError::ConfigInvalid { .. } => 2,
            SimError::Data { .. } | SimError::SignalCountMismatch { .. } => 3,
            SimError::AlreadyOpen { .. }
            | SimError::NoOpenPosition
            | SimError::InvalidFraction { .. }
            | SimError::InvalidOrder { .. } => 4,
            SimError::InsufficientData { .. } | SimError::NoUsableSignals { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = SimError::InsufficientData {
            symbol: "BTCUSDT".into(),
            bars: 12,
            minimum: 100,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for BTCUSDT: have 12 bars, need 100"
        );
        assert!(err.is_data_insufficient());
    }

    #[test]
    fn already_open_is_not_data_insufficient() {
        let err = SimError::AlreadyOpen {
            symbol: "ETHUSDT".into(),
        };
        assert!(!err.is_data_insufficient());
        assert_eq!(err.to_string(), "a position in ETHUSDT is already open");
    }
}
