//! Configuration validation.
//!
//! Validates all config fields before a backtest or reconciliation runs. Date parsing helpers
//! are shared with the CLI's config builder.

use crate::domain::error::FactortraderError;
use crate::domain::momentum::MIN_MOMENTUM_OBSERVATIONS;
use crate::domain::reconcile::DEFAULT_TOLERANCE;
use crate::domain::selector::SelectionPolicy;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    validate_dates(config)?;
    validate_rebalance_dates(config)?;
    validate_contribution(config)?;
    validate_risk_free_rate(config)?;
    validate_strategies(config)?;
    Ok(())
}

pub fn validate_selection_config(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    validate_num_stocks(config)?;
    validate_momentum_lookback(config)?;
    validate_positive(config, "selection", "min_market_cap")?;
    validate_positive(config, "selection", "max_pe_multiple")?;
    Ok(())
}

/// `[reconcile] tolerance`, a non-negative fraction.
pub fn validate_reconcile_config(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    validate_tolerance(config.get_double("reconcile", "tolerance", DEFAULT_TOLERANCE)).map(|_| ())
}

pub fn validate_tolerance(value: f64) -> Result<f64, FactortraderError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(invalid(
            "reconcile",
            "tolerance",
            "tolerance must be a non-negative fraction",
        ));
    }
    Ok(value)
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FactortraderError {
    FactortraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    let start = required_date(config, "backtest", "data_start_date")?;
    let end = required_date(config, "backtest", "end_date")?;
    if start >= end {
        return Err(invalid(
            "backtest",
            "data_start_date",
            "data_start_date must be before end_date",
        ));
    }
    Ok(())
}

fn validate_rebalance_dates(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    let dates = required_date_list(config, "backtest", "rebalance_dates")?;
    if dates.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid(
            "backtest",
            "rebalance_dates",
            "rebalance_dates must be strictly increasing",
        ));
    }
    let start = required_date(config, "backtest", "data_start_date")?;
    let end = required_date(config, "backtest", "end_date")?;
    if dates.iter().any(|d| *d < start || *d > end) {
        return Err(invalid(
            "backtest",
            "rebalance_dates",
            "rebalance_dates must fall between data_start_date and end_date",
        ));
    }
    Ok(())
}

fn validate_contribution(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    let value = config.get_double("backtest", "contribution", 1000.0);
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            "backtest",
            "contribution",
            "contribution must be positive",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.04);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_strategies(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    parse_strategies(config).map(|_| ())
}

/// Configured selection policies; both when the key is absent.
pub fn parse_strategies(config: &dyn ConfigPort) -> Result<Vec<SelectionPolicy>, FactortraderError> {
    let Some(keys) = config.get_list("backtest", "strategies") else {
        return Ok(SelectionPolicy::ALL.to_vec());
    };
    if keys.is_empty() {
        return Err(invalid("backtest", "strategies", "at least one strategy is required"));
    }
    let mut policies = Vec::with_capacity(keys.len());
    for key in keys {
        let policy = SelectionPolicy::from_key(&key)
            .ok_or_else(|| invalid("backtest", "strategies", format!("unknown strategy '{key}'")))?;
        if !policies.contains(&policy) {
            policies.push(policy);
        }
    }
    Ok(policies)
}

fn validate_num_stocks(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    if config.get_int("selection", "num_stocks", 25) < 1 {
        return Err(invalid(
            "selection",
            "num_stocks",
            "num_stocks must be at least 1",
        ));
    }
    Ok(())
}

fn validate_momentum_lookback(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    let value = config.get_int("selection", "momentum_lookback", 126);
    let minimum = MIN_MOMENTUM_OBSERVATIONS as i64 + 1;
    if value < minimum {
        return Err(invalid(
            "selection",
            "momentum_lookback",
            format!("momentum_lookback must be at least {minimum}"),
        ));
    }
    Ok(())
}

fn validate_positive(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), FactortraderError> {
    let value = config.get_double(section, key, 1.0);
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(section, key, format!("{key} must be positive")));
    }
    Ok(())
}

pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, FactortraderError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        invalid(
            section,
            key,
            format!("invalid date '{}', expected YYYY-MM-DD", value.trim()),
        )
    })
}

pub fn required_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, FactortraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => parse_date(&s, section, key),
        _ => Err(FactortraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

pub fn required_date_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Vec<NaiveDate>, FactortraderError> {
    match config.get_list(section, key) {
        Some(items) if !items.is_empty() => items
            .iter()
            .map(|s| parse_date(s, section, key))
            .collect(),
        _ => Err(FactortraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}
