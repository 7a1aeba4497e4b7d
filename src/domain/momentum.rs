//! Trailing price momentum.
//!
//! momentum = (P[date] - P[start]) / P[start], where the window is the
//! longest available up to `lookback_days` rows and must span at least
//! [`MIN_MOMENTUM_OBSERVATIONS`] rows.

use chrono::NaiveDate;

use super::error::MissingData;
use super::price_table::PriceTable;

pub const DEFAULT_LOOKBACK_DAYS: usize = 126;
pub const MIN_MOMENTUM_OBSERVATIONS: usize = 20;

pub fn momentum(
    prices: &PriceTable,
    ticker: &str,
    date: NaiveDate,
    lookback_days: usize,
) -> Result<f64, MissingData> {
    let history = prices
        .history_until(ticker, date)
        .ok_or_else(|| MissingData::NoPrice {
            ticker: ticker.to_string(),
            date,
        })?;

    let window = lookback_days.min(history.len().saturating_sub(1));
    if window < MIN_MOMENTUM_OBSERVATIONS {
        return Err(MissingData::InsufficientHistory {
            ticker: ticker.to_string(),
            observations: history.len(),
            required: MIN_MOMENTUM_OBSERVATIONS + 1,
        });
    }

    let current = history[history.len() - 1];
    let start = history[history.len() - window];
    if start <= 0.0 {
        return Err(MissingData::NonPositivePrice {
            ticker: ticker.to_string(),
            date,
            price: start,
        });
    }
    Ok((current - start) / start)
}
