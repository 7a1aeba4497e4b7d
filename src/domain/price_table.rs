//! Gap-filled price table and single-symbol price series.
//!
//! A [`PriceTable`] is built from raw per-ticker observations on a unified
//! timeline of trading dates. Each ticker's series is forward-filled then
//! backward-filled, so every retained ticker has a price on every date.
//! Tickers with no observation at all are dropped.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Raw observations for one ticker, in any order.
pub type Observations = Vec<(NaiveDate, f64)>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    prices: HashMap<String, Vec<f64>>,
    date_index: HashMap<NaiveDate, usize>,
}

impl PriceTable {
    /// Build a table from `(ticker, observations)` pairs. Ticker order is
    /// preserved; non-finite prices count as missing.
    pub fn from_observations(series: Vec<(String, Observations)>) -> Self {
        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|(_, obs)| obs.iter().map(|(d, _)| *d))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let date_index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut tickers = Vec::with_capacity(series.len());
        let mut prices = HashMap::with_capacity(series.len());

        for (ticker, obs) in series {
            if prices.contains_key(&ticker) {
                continue;
            }
            let mut column: Vec<Option<f64>> = vec![None; dates.len()];
            for (date, price) in obs {
                if price.is_finite() {
                    column[date_index[&date]] = Some(price);
                }
            }
            if let Some(filled) = fill_gaps(&column) {
                tickers.push(ticker.clone());
                prices.insert(ticker, filled);
            }
        }

        PriceTable {
            dates,
            tickers,
            prices,
            date_index,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn ticker_count(&self) -> usize {
        self.tickers.len()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.prices.contains_key(ticker)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Price on exactly `date`; `None` if the date is not a trading day in
    /// this table or the ticker is unknown.
    pub fn price_on(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let idx = *self.date_index.get(&date)?;
        self.prices.get(ticker).map(|col| col[idx])
    }

    /// Index of the last trading date at or before `date`.
    pub fn index_at_or_before(&self, date: NaiveDate) -> Option<usize> {
        let upper = self.dates.partition_point(|d| *d <= date);
        upper.checked_sub(1)
    }

    /// Price at the last trading date at or before `date`.
    pub fn price_at_or_before(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let idx = self.index_at_or_before(date)?;
        self.prices.get(ticker).map(|col| col[idx])
    }

    /// Most recent price in the table.
    pub fn latest_price(&self, ticker: &str) -> Option<f64> {
        self.prices.get(ticker).and_then(|col| col.last().copied())
    }

    /// The ticker's prices from the first date up to and including the last
    /// trading date at or before `date`.
    pub fn history_until(&self, ticker: &str, date: NaiveDate) -> Option<&[f64]> {
        let idx = self.index_at_or_before(date)?;
        self.prices.get(ticker).map(|col| &col[..=idx])
    }
}

/// Forward-fill then backward-fill; `None` when the column is entirely empty.
fn fill_gaps(column: &[Option<f64>]) -> Option<Vec<f64>> {
    let first = column.iter().flatten().copied().next()?;
    let mut last = first;
    Some(
        column
            .iter()
            .map(|v| {
                if let Some(p) = v {
                    last = *p;
                }
                last
            })
            .collect(),
    )
}

/// Date-ordered prices for one symbol, used for the benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<(NaiveDate, f64)>,
}

impl PriceSeries {
    /// Sorts by date; a later duplicate date replaces an earlier one and
    /// non-finite prices are dropped.
    pub fn new(symbol: impl Into<String>, observations: Observations) -> Self {
        let by_date: BTreeMap<NaiveDate, f64> = observations
            .into_iter()
            .filter(|(_, p)| p.is_finite())
            .collect();
        PriceSeries {
            symbol: symbol.into(),
            points: by_date.into_iter().collect(),
        }
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
