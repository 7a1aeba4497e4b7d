//! Market data access port.

use crate::domain::error::FactortraderError;
use crate::domain::fundamentals::{Fundamentals, FundamentalsSnapshot};
use crate::domain::price_table::{PriceSeries, PriceTable};
use chrono::NaiveDate;
use tracing::warn;

pub trait MarketDataPort {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceTable, FactortraderError>;

    fn fetch_benchmark(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, FactortraderError>;

    fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, FactortraderError>;

    fn list_constituents(&self) -> Result<Vec<String>, FactortraderError>;

    /// Fetch fundamentals ticker by ticker; a failing ticker is logged and
    /// left out of the snapshot. Adapters whose fundamentals come from one
    /// source override this to report a failure of that source as an error.
    fn fetch_snapshot(&self, tickers: &[String]) -> Result<FundamentalsSnapshot, FactortraderError> {
        Ok(collect_snapshot(tickers, |ticker| self.fetch_fundamentals(ticker)))
    }
}

/// Build a snapshot from a per-ticker lookup, skipping failures.
pub fn collect_snapshot<F>(tickers: &[String], mut fetch: F) -> FundamentalsSnapshot
where
    F: FnMut(&str) -> Result<Fundamentals, FactortraderError>,
{
    let mut snapshot = FundamentalsSnapshot::new();
    for ticker in tickers {
        match fetch(ticker) {
            Ok(f) => snapshot.insert(ticker.clone(), f),
            Err(e) => warn!(%ticker, error = %e, "fundamentals unavailable, skipping"),
        }
    }
    snapshot
}
