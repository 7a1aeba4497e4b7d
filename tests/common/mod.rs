#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use factortrader::domain::backtest::{BacktestConfig, BacktestResult};
use factortrader::domain::error::FactortraderError;
use factortrader::domain::fundamentals::Fundamentals;
use factortrader::domain::price_table::{Observations, PriceSeries, PriceTable};
use factortrader::domain::selector::{SelectionPolicy, SelectionRules};
use factortrader::ports::data_port::MarketDataPort;
use factortrader::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// In-memory market data; tickers keep insertion order.
pub struct MockMarketData {
    pub series: Vec<(String, Observations)>,
    pub fundamentals: HashMap<String, Fundamentals>,
    pub benchmarks: HashMap<String, Observations>,
    pub errors: HashMap<String, String>,
    pub price_error: Option<String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            series: Vec::new(),
            fundamentals: HashMap::new(),
            benchmarks: HashMap::new(),
            errors: HashMap::new(),
            price_error: None,
        }
    }

    pub fn with_series(mut self, ticker: &str, observations: Observations) -> Self {
        self.series.push((ticker.to_string(), observations));
        self
    }

    pub fn with_fundamentals(
        mut self,
        ticker: &str,
        market_cap: f64,
        trailing_pe: f64,
        earnings_growth: Option<f64>,
    ) -> Self {
        self.fundamentals.insert(
            ticker.to_string(),
            Fundamentals {
                market_cap: Some(market_cap),
                trailing_pe: Some(trailing_pe),
                earnings_growth,
            },
        );
        self
    }

    /// A listed ticker with prices and fundamentals in one call.
    pub fn with_stock(
        self,
        ticker: &str,
        observations: Observations,
        market_cap: f64,
        trailing_pe: f64,
        earnings_growth: Option<f64>,
    ) -> Self {
        self.with_series(ticker, observations)
            .with_fundamentals(ticker, market_cap, trailing_pe, earnings_growth)
    }

    pub fn with_benchmark(mut self, symbol: &str, observations: Observations) -> Self {
        self.benchmarks.insert(symbol.to_string(), observations);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn with_price_error(mut self, reason: &str) -> Self {
        self.price_error = Some(reason.to_string());
        self
    }
}

fn within(observations: &Observations, start: NaiveDate, end: NaiveDate) -> Observations {
    observations
        .iter()
        .copied()
        .filter(|(d, _)| *d >= start && *d <= end)
        .collect()
}

impl MarketDataPort for MockMarketData {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceTable, FactortraderError> {
        if let Some(reason) = &self.price_error {
            return Err(FactortraderError::Provider {
                reason: reason.clone(),
            });
        }
        let series = tickers
            .iter()
            .filter_map(|t| self.series.iter().find(|(name, _)| name == t))
            .map(|(name, obs)| (name.clone(), within(obs, start_date, end_date)))
            .collect();
        Ok(PriceTable::from_observations(series))
    }

    fn fetch_benchmark(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, FactortraderError> {
        match self.benchmarks.get(symbol) {
            Some(obs) => Ok(PriceSeries::new(symbol, within(obs, start_date, end_date))),
            None => Err(FactortraderError::Provider {
                reason: format!("unknown symbol {symbol}"),
            }),
        }
    }

    fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, FactortraderError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(FactortraderError::Provider {
                reason: reason.clone(),
            });
        }
        self.fundamentals
            .get(ticker)
            .copied()
            .ok_or_else(|| FactortraderError::Provider {
                reason: format!("no fundamentals for {ticker}"),
            })
    }

    fn list_constituents(&self) -> Result<Vec<String>, FactortraderError> {
        Ok(self.series.iter().map(|(t, _)| t.clone()).collect())
    }
}

/// Records every report request.
pub struct MockReportPort {
    pub calls: RefCell<Vec<(BacktestResult, PathBuf)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockReportPort {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), FactortraderError> {
        self.calls
            .borrow_mut()
            .push((result.clone(), output_dir.to_path_buf()));
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `n` consecutive weekdays starting at `start` (or the next weekday).
pub fn trading_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(n)
        .collect()
}

pub fn series(days: &[NaiveDate], price: impl Fn(usize) -> f64) -> Observations {
    days.iter().enumerate().map(|(i, &d)| (d, price(i))).collect()
}

pub fn flat(days: &[NaiveDate], price: f64) -> Observations {
    series(days, |_| price)
}

/// Compounding daily growth from `start_price`.
pub fn trending(days: &[NaiveDate], start_price: f64, daily: f64) -> Observations {
    series(days, |i| start_price * (1.0 + daily).powi(i as i32))
}

pub fn backtest_config(
    days: &[NaiveDate],
    rebalance_dates: Vec<NaiveDate>,
    benchmark: Option<&str>,
) -> BacktestConfig {
    BacktestConfig {
        data_start_date: days[0],
        end_date: days[days.len() - 1],
        rebalance_dates,
        contribution: 1000.0,
        risk_free_rate: 0.04,
        benchmark: benchmark.map(str::to_string),
        strategies: SelectionPolicy::ALL.to_vec(),
        selection: SelectionRules::default(),
    }
}
