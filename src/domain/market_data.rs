//! Up-front market data load.
//!
//! Everything the backtest reads is fetched once here and held immutably
//! for the rest of the run.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::FactortraderError;
use crate::domain::fundamentals::FundamentalsSnapshot;
use crate::domain::price_table::{PriceSeries, PriceTable};
use crate::ports::data_port::MarketDataPort;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketData {
    pub prices: PriceTable,
    pub snapshot: FundamentalsSnapshot,
    pub benchmark: Option<PriceSeries>,
}

/// Load prices, fundamentals and the benchmark. `tickers` overrides the
/// port's constituent list when given. Bulk price, benchmark and
/// fundamentals failures abort; per-ticker fundamentals failures are skipped.
pub fn load_market_data(
    port: &dyn MarketDataPort,
    config: &BacktestConfig,
    tickers: Option<Vec<String>>,
) -> Result<MarketData, FactortraderError> {
    let tickers = match tickers {
        Some(t) => t,
        None => port.list_constituents()?,
    };
    if tickers.is_empty() {
        return Err(FactortraderError::NoData {
            what: "constituent list".to_string(),
        });
    }
    info!(tickers = tickers.len(), "loaded constituents");

    let prices = port.fetch_prices(&tickers, config.data_start_date, config.end_date)?;
    if prices.is_empty() {
        return Err(FactortraderError::NoData {
            what: format!("prices between {} and {}", config.data_start_date, config.end_date),
        });
    }
    info!(
        tickers = prices.ticker_count(),
        days = prices.len(),
        "loaded price table"
    );

    let benchmark = match &config.benchmark {
        Some(symbol) => {
            let series = port.fetch_benchmark(symbol, config.data_start_date, config.end_date)?;
            info!(%symbol, days = series.len(), "loaded benchmark");
            Some(series)
        }
        None => None,
    };

    let snapshot = port.fetch_snapshot(prices.tickers())?;
    info!(tickers = snapshot.len(), "loaded fundamentals");

    Ok(MarketData {
        prices,
        snapshot,
        benchmark,
    })
}
