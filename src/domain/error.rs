//! Domain error types.
//!
//! [`MissingData`] is the recoverable kind: a ticker lacks a price or a
//! fundamentals value, and the caller excludes it. [`FactortraderError`]
//! covers everything that ends a run.

use chrono::NaiveDate;

/// Which fundamentals field a lookup was after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FundamentalField {
    MarketCap,
    TrailingPe,
    EarningsGrowth,
}

impl std::fmt::Display for FundamentalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FundamentalField::MarketCap => write!(f, "market cap"),
            FundamentalField::TrailingPe => write!(f, "trailing P/E"),
            FundamentalField::EarningsGrowth => write!(f, "earnings growth"),
        }
    }
}

/// A value needed for one ticker on one date is unavailable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MissingData {
    #[error("{ticker}: no fundamentals snapshot")]
    NoSnapshot { ticker: String },

    #[error("{ticker}: {field} unavailable")]
    NoFundamental {
        ticker: String,
        field: FundamentalField,
    },

    #[error("{ticker}: {field} is non-positive ({value})")]
    NonPositiveFundamental {
        ticker: String,
        field: FundamentalField,
        value: f64,
    },

    #[error("{ticker}: no price on or before {date}")]
    NoPrice { ticker: String, date: NaiveDate },

    #[error("{ticker}: non-positive price {price} on {date}")]
    NonPositivePrice {
        ticker: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("{ticker}: {observations} observations, need {required}")]
    InsufficientHistory {
        ticker: String,
        observations: usize,
        required: usize,
    },
}

/// Top-level error type for factortrader.
#[derive(Debug, thiserror::Error)]
pub enum FactortraderError {
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

    #[error("market data provider failed: {reason}")]
    Provider { reason: String },

    #[error("malformed data in {source_name}: {reason}")]
    DataFormat { source_name: String, reason: String },

    #[error("no data for {what}")]
    NoData { what: String },

    #[error("EPS reconciliation failed for {failed} of {total} years")]
    ReconciliationFailed { failed: usize, total: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&FactortraderError> for std::process::ExitCode {
    fn from(err: &FactortraderError) -> Self {
        let code: u8 = match err {
            FactortraderError::Io(_) => 1,
            FactortraderError::ConfigParse { .. }
            | FactortraderError::ConfigMissing { .. }
            | FactortraderError::ConfigInvalid { .. } => 2,
            FactortraderError::Provider { .. } => 3,
            FactortraderError::DataFormat { .. } => 4,
            FactortraderError::NoData { .. } => 5,
            FactortraderError::ReconciliationFailed { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_messages_name_the_ticker() {
        let err = MissingData::NoFundamental {
            ticker: "AAPL".into(),
            field: FundamentalField::TrailingPe,
        };
        assert_eq!(err.to_string(), "AAPL: trailing P/E unavailable");

        let err = MissingData::InsufficientHistory {
            ticker: "MSFT".into(),
            observations: 5,
            required: 20,
        };
        assert_eq!(err.to_string(), "MSFT: 5 observations, need 20");
    }

    #[test]
    fn config_errors_format_section_and_key() {
        let err = FactortraderError::ConfigMissing {
            section: "backtest".into(),
            key: "rebalance_dates".into(),
        };
        assert_eq!(err.to_string(), "missing config key [backtest] rebalance_dates");
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let code = |e: FactortraderError| format!("{:?}", std::process::ExitCode::from(&e));
        assert_eq!(
            code(FactortraderError::NoData { what: "prices".into() }),
            format!("{:?}", std::process::ExitCode::from(5))
        );
        assert_eq!(
            code(FactortraderError::ReconciliationFailed { failed: 1, total: 4 }),
            format!("{:?}", std::process::ExitCode::from(6))
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FactortraderError = io.into();
        assert!(matches!(err, FactortraderError::Io(_)));
    }
}
