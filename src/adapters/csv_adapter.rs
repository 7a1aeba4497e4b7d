//! CSV directory market data adapter.
//!
//! Layout of the data directory:
//!
//! - `prices.csv`: `date,TICK1,TICK2,...`, one column per ticker, empty cell
//!   for a missing close.
//! - `<SYMBOL>.csv`: `date,close` for a benchmark symbol.
//! - `fundamentals.csv`: `ticker,market_cap,trailing_pe,earnings_growth`,
//!   empty cell for an absent value.
//! - `constituents.csv` (optional): a `ticker` column. Without it the
//!   constituents are the `prices.csv` header.

use crate::domain::config_validation::DATE_FORMAT;
use crate::domain::error::FactortraderError;
use crate::domain::fundamentals::{Fundamentals, FundamentalsSnapshot};
use crate::domain::price_table::{Observations, PriceSeries, PriceTable};
use crate::ports::data_port::{collect_snapshot, MarketDataPort};
use chrono::NaiveDate;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PRICES_FILE: &str = "prices.csv";
pub const FUNDAMENTALS_FILE: &str = "fundamentals.csv";
pub const CONSTITUENTS_FILE: &str = "constituents.csv";

pub struct CsvMarketDataAdapter {
    base_path: PathBuf,
    fundamentals: OnceCell<HashMap<String, Fundamentals>>,
}

impl CsvMarketDataAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            fundamentals: OnceCell::new(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn read(&self, file: &str) -> Result<String, FactortraderError> {
        let path = self.base_path.join(file);
        fs::read_to_string(&path).map_err(|e| FactortraderError::Provider {
            reason: format!("failed to read {}: {}", path.display(), e),
        })
    }

    fn benchmark_path(symbol: &str) -> String {
        format!("{}.csv", symbol)
    }

    fn fundamentals_table(&self) -> Result<&HashMap<String, Fundamentals>, FactortraderError> {
        if let Some(table) = self.fundamentals.get() {
            return Ok(table);
        }
        let table = parse_fundamentals(&self.read(FUNDAMENTALS_FILE)?)?;
        Ok(self.fundamentals.get_or_init(|| table))
    }
}

fn format_error(source_name: &str, reason: impl Into<String>) -> FactortraderError {
    FactortraderError::DataFormat {
        source_name: source_name.to_string(),
        reason: reason.into(),
    }
}

fn parse_date(source_name: &str, value: &str) -> Result<NaiveDate, FactortraderError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| format_error(source_name, format!("invalid date '{}': {}", value, e)))
}

/// Empty cell means absent.
fn parse_optional(source_name: &str, column: &str, value: &str) -> Result<Option<f64>, FactortraderError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|e| format_error(source_name, format!("invalid {} value '{}': {}", column, value, e)))
}

fn parse_prices(
    content: &str,
    tickers: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<PriceTable, FactortraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let header = rdr
        .headers()
        .map_err(|e| format_error(PRICES_FILE, format!("CSV parse error: {}", e)))?
        .clone();

    let mut columns: Vec<(String, usize)> = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        match header.iter().skip(1).position(|h| h.trim() == ticker) {
            Some(i) => columns.push((ticker.clone(), i + 1)),
            None => warn!(%ticker, "no price column, skipping"),
        }
    }

    let mut series: Vec<(String, Observations)> = columns
        .iter()
        .map(|(ticker, _)| (ticker.clone(), Vec::new()))
        .collect();

    for result in rdr.records() {
        let record =
            result.map_err(|e| format_error(PRICES_FILE, format!("CSV parse error: {}", e)))?;
        let date_str = record
            .get(0)
            .ok_or_else(|| format_error(PRICES_FILE, "missing date column"))?;
        let date = parse_date(PRICES_FILE, date_str)?;
        if date < start_date || date > end_date {
            continue;
        }
        for ((ticker, column), (_, observations)) in columns.iter().zip(series.iter_mut()) {
            let cell = record.get(*column).unwrap_or("");
            if let Some(price) = parse_optional(PRICES_FILE, ticker, cell)? {
                observations.push((date, price));
            }
        }
    }

    Ok(PriceTable::from_observations(series))
}

fn parse_close_series(
    source_name: &str,
    symbol: &str,
    content: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<PriceSeries, FactortraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut observations = Vec::new();

    for result in rdr.records() {
        let record =
            result.map_err(|e| format_error(source_name, format!("CSV parse error: {}", e)))?;
        let date_str = record
            .get(0)
            .ok_or_else(|| format_error(source_name, "missing date column"))?;
        let date = parse_date(source_name, date_str)?;
        if date < start_date || date > end_date {
            continue;
        }
        let close = record
            .get(1)
            .ok_or_else(|| format_error(source_name, "missing close column"))?;
        if let Some(close) = parse_optional(source_name, "close", close)? {
            observations.push((date, close));
        }
    }

    Ok(PriceSeries::new(symbol, observations))
}

fn parse_fundamentals(content: &str) -> Result<HashMap<String, Fundamentals>, FactortraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut table = HashMap::new();

    for result in rdr.records() {
        let record = result
            .map_err(|e| format_error(FUNDAMENTALS_FILE, format!("CSV parse error: {}", e)))?;
        let ticker = record
            .get(0)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| format_error(FUNDAMENTALS_FILE, "missing ticker column"))?;
        let cell = |i: usize| record.get(i).unwrap_or("");
        let fundamentals = Fundamentals {
            market_cap: parse_optional(FUNDAMENTALS_FILE, "market_cap", cell(1))?,
            trailing_pe: parse_optional(FUNDAMENTALS_FILE, "trailing_pe", cell(2))?,
            earnings_growth: parse_optional(FUNDAMENTALS_FILE, "earnings_growth", cell(3))?,
        };
        table.insert(ticker.to_string(), fundamentals);
    }

    Ok(table)
}

fn parse_constituents(content: &str) -> Result<Vec<String>, FactortraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let column = rdr
        .headers()
        .map_err(|e| format_error(CONSTITUENTS_FILE, format!("CSV parse error: {}", e)))?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("ticker"))
        .ok_or_else(|| format_error(CONSTITUENTS_FILE, "missing ticker column"))?;

    let mut tickers: Vec<String> = Vec::new();
    for result in rdr.records() {
        let record = result
            .map_err(|e| format_error(CONSTITUENTS_FILE, format!("CSV parse error: {}", e)))?;
        if let Some(ticker) = record.get(column).map(str::trim).filter(|t| !t.is_empty()) {
            if !tickers.iter().any(|t| t == ticker) {
                tickers.push(ticker.to_string());
            }
        }
    }
    Ok(tickers)
}

fn lookup(table: &HashMap<String, Fundamentals>, ticker: &str) -> Result<Fundamentals, FactortraderError> {
    table
        .get(ticker)
        .copied()
        .ok_or_else(|| FactortraderError::Provider {
            reason: format!("no fundamentals for {}", ticker),
        })
}

fn price_header_tickers(content: &str) -> Result<Vec<String>, FactortraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let header = rdr
        .headers()
        .map_err(|e| format_error(PRICES_FILE, format!("CSV parse error: {}", e)))?;
    Ok(header
        .iter()
        .skip(1)
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect())
}

impl MarketDataPort for CsvMarketDataAdapter {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceTable, FactortraderError> {
        let content = self.read(PRICES_FILE)?;
        parse_prices(&content, tickers, start_date, end_date)
    }

    fn fetch_benchmark(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, FactortraderError> {
        let file = Self::benchmark_path(symbol);
        let content = self.read(&file)?;
        parse_close_series(&file, symbol, &content, start_date, end_date)
    }

    fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, FactortraderError> {
        lookup(self.fundamentals_table()?, ticker)
    }

    /// An unreadable `fundamentals.csv` fails the whole snapshot.
    fn fetch_snapshot(&self, tickers: &[String]) -> Result<FundamentalsSnapshot, FactortraderError> {
        let table = self.fundamentals_table()?;
        Ok(collect_snapshot(tickers, |ticker| lookup(table, ticker)))
    }

    fn list_constituents(&self) -> Result<Vec<String>, FactortraderError> {
        if self.base_path.join(CONSTITUENTS_FILE).exists() {
            return parse_constituents(&self.read(CONSTITUENTS_FILE)?);
        }
        debug!("no {}, using {} header", CONSTITUENTS_FILE, PRICES_FILE);
        price_header_tickers(&self.read(PRICES_FILE)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join(PRICES_FILE),
            "date,AAA,BBB,CCC\n\
             2024-01-15,100.0,50.0,\n\
             2024-01-16,,51.0,\n\
             2024-01-17,102.0,52.0,\n",
        )
        .unwrap();
        fs::write(
            path.join("SPY.csv"),
            "date,close\n2024-01-15,470.0\n2024-01-16,472.5\n2024-01-17,\n",
        )
        .unwrap();
        fs::write(
            path.join(FUNDAMENTALS_FILE),
            "ticker,market_cap,trailing_pe,earnings_growth\n\
             AAA,2000000000000,30.5,0.12\n\
             BBB,15000000000,,\n",
        )
        .unwrap();

        (dir, path)
    }

    fn all(tickers: &[&str]) -> Vec<String> {
        tickers.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn fetch_prices_fills_gaps_and_drops_empty_columns() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);

        let table = adapter
            .fetch_prices(&all(&["AAA", "BBB", "CCC"]), d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.tickers(), &["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(table.price_on("AAA", d(2024, 1, 16)), Some(100.0));
        assert_eq!(table.price_on("BBB", d(2024, 1, 17)), Some(52.0));
    }

    #[test]
    fn fetch_prices_filters_by_date_and_ticker() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);

        let table = adapter
            .fetch_prices(&all(&["BBB", "ZZZ"]), d(2024, 1, 16), d(2024, 1, 16))
            .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.tickers(), &["BBB".to_string()]);
    }

    #[test]
    fn malformed_price_is_a_format_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PRICES_FILE), "date,AAA\n2024-01-15,abc\n").unwrap();
        let adapter = CsvMarketDataAdapter::new(dir.path().to_path_buf());

        let err = adapter
            .fetch_prices(&all(&["AAA"]), d(2024, 1, 1), d(2024, 1, 31))
            .unwrap_err();
        assert!(matches!(err, FactortraderError::DataFormat { .. }));
    }

    #[test]
    fn missing_prices_file_is_a_provider_error() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvMarketDataAdapter::new(dir.path().to_path_buf());

        let err = adapter
            .fetch_prices(&all(&["AAA"]), d(2024, 1, 1), d(2024, 1, 31))
            .unwrap_err();
        assert!(matches!(err, FactortraderError::Provider { .. }));
    }

    #[test]
    fn fetch_benchmark_reads_close_column() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);

        let series = adapter
            .fetch_benchmark("SPY", d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(series.symbol, "SPY");
        assert_eq!(
            series.points(),
            &[(d(2024, 1, 15), 470.0), (d(2024, 1, 16), 472.5)]
        );
    }

    #[test]
    fn fetch_fundamentals_keeps_absent_fields_empty() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);

        let aaa = adapter.fetch_fundamentals("AAA").unwrap();
        assert_eq!(aaa.market_cap, Some(2.0e12));
        assert_eq!(aaa.trailing_pe, Some(30.5));
        assert_eq!(aaa.earnings_growth, Some(0.12));

        let bbb = adapter.fetch_fundamentals("BBB").unwrap();
        assert_eq!(bbb.trailing_pe, None);
        assert_eq!(bbb.earnings_growth, None);

        assert!(adapter.fetch_fundamentals("CCC").is_err());
    }

    #[test]
    fn snapshot_skips_unknown_tickers() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);

        let snapshot = adapter.fetch_snapshot(&all(&["AAA", "BBB", "CCC"])).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.contains("CCC"));
    }

    #[test]
    fn missing_fundamentals_file_fails_the_snapshot() {
        let (_dir, path) = setup_test_data();
        fs::remove_file(path.join(FUNDAMENTALS_FILE)).unwrap();
        let adapter = CsvMarketDataAdapter::new(path);

        let err = adapter.fetch_snapshot(&all(&["AAA", "BBB"])).unwrap_err();
        assert!(matches!(err, FactortraderError::Provider { .. }));
    }

    #[test]
    fn constituents_fall_back_to_price_header() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketDataAdapter::new(path);

        assert_eq!(adapter.list_constituents().unwrap(), all(&["AAA", "BBB", "CCC"]));
    }

    #[test]
    fn constituents_file_wins_when_present() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join(CONSTITUENTS_FILE),
            "ticker,name\nBBB,Bravo\nAAA,Alpha\nBBB,Bravo again\n",
        )
        .unwrap();
        let adapter = CsvMarketDataAdapter::new(path);

        assert_eq!(adapter.list_constituents().unwrap(), all(&["BBB", "AAA"]));
    }
}
