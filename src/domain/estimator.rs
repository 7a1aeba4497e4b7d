//! Point-in-time fundamentals estimation.
//!
//! The snapshot only holds today's values. [`PriceRatioEstimator`] scales
//! them by `price(date) / price(latest)`, which assumes the metric moves in
//! proportion to price. That is wrong whenever shares outstanding or
//! earnings changed, so estimates are directional signals only. A genuine
//! historical source can implement [`FundamentalsEstimator`] instead.

use chrono::NaiveDate;

use super::error::{FundamentalField, MissingData};
use super::fundamentals::FundamentalsSnapshot;
use super::price_table::PriceTable;

pub trait FundamentalsEstimator {
    /// Estimated value of a price-scaled field (market cap, trailing P/E)
    /// as of `date`.
    fn estimate(
        &self,
        field: FundamentalField,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<f64, MissingData>;

    /// Earnings growth as reported; not price-scaled.
    fn earnings_growth(&self, ticker: &str) -> Result<f64, MissingData>;
}

pub struct PriceRatioEstimator<'a> {
    prices: &'a PriceTable,
    snapshot: &'a FundamentalsSnapshot,
}

impl<'a> PriceRatioEstimator<'a> {
    pub fn new(prices: &'a PriceTable, snapshot: &'a FundamentalsSnapshot) -> Self {
        Self { prices, snapshot }
    }

    fn snapshot_value(&self, field: FundamentalField, ticker: &str) -> Result<f64, MissingData> {
        let fundamentals = self
            .snapshot
            .get(ticker)
            .ok_or_else(|| MissingData::NoSnapshot {
                ticker: ticker.to_string(),
            })?;
        fundamentals
            .get(field)
            .ok_or_else(|| MissingData::NoFundamental {
                ticker: ticker.to_string(),
                field,
            })
    }

    fn price_ratio(&self, ticker: &str, date: NaiveDate) -> Result<f64, MissingData> {
        let no_price = |date| MissingData::NoPrice {
            ticker: ticker.to_string(),
            date,
        };
        let current = self
            .prices
            .latest_price(ticker)
            .ok_or_else(|| no_price(self.prices.last_date().unwrap_or(date)))?;
        let historical = self
            .prices
            .price_at_or_before(ticker, date)
            .ok_or_else(|| no_price(date))?;
        Ok(if current > 0.0 { historical / current } else { 1.0 })
    }
}

impl FundamentalsEstimator for PriceRatioEstimator<'_> {
    fn estimate(
        &self,
        field: FundamentalField,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<f64, MissingData> {
        let value = self.snapshot_value(field, ticker)?;
        if value <= 0.0 {
            return Err(MissingData::NonPositiveFundamental {
                ticker: ticker.to_string(),
                field,
                value,
            });
        }
        let estimate = value * self.price_ratio(ticker, date)?;
        if field == FundamentalField::TrailingPe && estimate <= 0.0 {
            return Err(MissingData::NonPositiveFundamental {
                ticker: ticker.to_string(),
                field,
                value: estimate,
            });
        }
        Ok(estimate)
    }

    fn earnings_growth(&self, ticker: &str) -> Result<f64, MissingData> {
        self.snapshot_value(FundamentalField::EarningsGrowth, ticker)
    }
}
