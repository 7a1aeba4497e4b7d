//! CSV annual earnings adapter.
//!
//! One file per provider with a `ticker` column, a `year` (or `fiscal_year`)
//! column holding either a year or a fiscal year-end date, and either an
//! `eps` column or `net_income` and `diluted_shares` columns. EPS derived
//! from income needs a positive share count; rows without a usable value
//! are left out.

use crate::domain::config_validation::DATE_FORMAT;
use crate::domain::error::FactortraderError;
use crate::domain::reconcile::EpsByYear;
use crate::ports::earnings_port::EarningsPort;
use chrono::{Datelike, NaiveDate};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default)]
struct EpsTable {
    order: Vec<String>,
    eps: HashMap<String, EpsByYear>,
}

pub struct CsvEarningsAdapter {
    path: PathBuf,
    name: String,
    table: OnceCell<EpsTable>,
}

impl CsvEarningsAdapter {
    /// The source is named after the file stem.
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::with_name(path, name)
    }

    pub fn with_name(path: PathBuf, name: impl Into<String>) -> Self {
        Self {
            path,
            name: name.into(),
            table: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn table(&self) -> Result<&EpsTable, FactortraderError> {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| FactortraderError::Provider {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        let table = parse_earnings(&self.name, &content)?;
        debug!(source = %self.name, tickers = table.order.len(), "loaded earnings");
        Ok(self.table.get_or_init(|| table))
    }
}

fn format_error(source_name: &str, reason: impl Into<String>) -> FactortraderError {
    FactortraderError::DataFormat {
        source_name: source_name.to_string(),
        reason: reason.into(),
    }
}

fn parse_year(source_name: &str, value: &str) -> Result<i32, FactortraderError> {
    let value = value.trim();
    if let Ok(year) = value.parse::<i32>() {
        return Ok(year);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|d| d.year())
        .map_err(|_| format_error(source_name, format!("invalid year '{}'", value)))
}

fn parse_number(source_name: &str, column: &str, value: &str) -> Result<Option<f64>, FactortraderError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<f64>()
        .map(Some)
        .map_err(|e| format_error(source_name, format!("invalid {} value '{}': {}", column, value, e)))
}

fn find_column(header: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

#[derive(Clone, Copy)]
enum EpsColumns {
    Direct(usize),
    Derived { net_income: usize, shares: usize },
}

fn parse_earnings(source_name: &str, content: &str) -> Result<EpsTable, FactortraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let header = rdr
        .headers()
        .map_err(|e| format_error(source_name, format!("CSV parse error: {}", e)))?
        .clone();
    let column = |names: &[&str]| find_column(&header, names);

    let ticker_col =
        column(&["ticker"][..]).ok_or_else(|| format_error(source_name, "missing ticker column"))?;
    let year_col = column(&["year", "fiscal_year"][..])
        .ok_or_else(|| format_error(source_name, "missing year column"))?;
    let eps_cols = match (
        column(&["eps"][..]),
        column(&["net_income"][..]),
        column(&["diluted_shares"][..]),
    ) {
        (Some(eps), _, _) => EpsColumns::Direct(eps),
        (None, Some(net_income), Some(shares)) => EpsColumns::Derived { net_income, shares },
        _ => {
            return Err(format_error(
                source_name,
                "need an eps column or net_income and diluted_shares columns",
            ));
        }
    };

    let mut table = EpsTable::default();
    for result in rdr.records() {
        let record = result.map_err(|e| format_error(source_name, format!("CSV parse error: {}", e)))?;
        let cell = |i: usize| record.get(i).unwrap_or("");
        let ticker = cell(ticker_col).trim();
        if ticker.is_empty() {
            continue;
        }
        let year = parse_year(source_name, cell(year_col))?;

        let eps = match eps_cols {
            EpsColumns::Direct(i) => parse_number(source_name, "eps", cell(i))?,
            EpsColumns::Derived { net_income, shares } => {
                let income = parse_number(source_name, "net_income", cell(net_income))?;
                let shares = parse_number(source_name, "diluted_shares", cell(shares))?;
                match (income, shares) {
                    (Some(income), Some(shares)) if shares > 0.0 => Some(income / shares),
                    _ => None,
                }
            }
        };
        let Some(eps) = eps else {
            continue;
        };

        if !table.eps.contains_key(ticker) {
            table.order.push(ticker.to_string());
        }
        table.eps.entry(ticker.to_string()).or_default().insert(year, eps);
    }
    Ok(table)
}

impl EarningsPort for CsvEarningsAdapter {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn fetch_eps(&self, ticker: &str) -> Result<EpsByYear, FactortraderError> {
        Ok(self.table()?.eps.get(ticker).cloned().unwrap_or_default())
    }

    fn list_tickers(&self) -> Result<Vec<String>, FactortraderError> {
        Ok(self.table()?.order.clone())
    }
}
