//! Portfolio state and daily value tracking.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::warn;

use super::price_table::PriceTable;
use super::selector::Candidate;

/// One row of the daily mark-to-market series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: f64,
    pub invested: f64,
}

/// Append-only daily value series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioHistory {
    points: Vec<ValuePoint>,
}

impl PortfolioHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, date: NaiveDate, value: f64, invested: f64) {
        self.points.push(ValuePoint {
            date,
            value,
            invested,
        });
    }

    pub fn points(&self) -> &[ValuePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&ValuePoint> {
        self.points.last()
    }

    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }
}

impl FromIterator<ValuePoint> for PortfolioHistory {
    fn from_iter<I: IntoIterator<Item = ValuePoint>>(iter: I) -> Self {
        PortfolioHistory {
            points: iter.into_iter().collect(),
        }
    }
}

/// Cash, share counts and cumulative contributions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub total_invested: f64,
    pub holdings: HashMap<String, f64>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_count(&self) -> usize {
        self.holdings.len()
    }

    pub fn shares(&self, ticker: &str) -> Option<f64> {
        self.holdings.get(ticker).copied()
    }

    /// Add new money; counts toward `total_invested`.
    pub fn deposit(&mut self, amount: f64) {
        self.cash += amount;
        self.total_invested += amount;
    }

    /// Sell every holding at `date`'s price and return the proceeds.
    /// A holding with no price that day is dropped without proceeds.
    pub fn liquidate(&mut self, prices: &PriceTable, date: NaiveDate) -> f64 {
        let mut proceeds = 0.0;
        for (ticker, shares) in self.holdings.drain() {
            match prices.price_on(&ticker, date) {
                Some(price) => proceeds += shares * price,
                None => warn!(%ticker, %date, shares, "no price at liquidation, position dropped"),
            }
        }
        self.cash += proceeds;
        proceeds
    }

    /// Split all cash equally across `picks` and return the amount deployed.
    /// Picks with a non-positive price are ignored; with no usable pick the
    /// cash stays put.
    pub fn buy_equal_weight(&mut self, picks: &[Candidate]) -> f64 {
        let usable: Vec<&Candidate> = picks.iter().filter(|c| c.price > 0.0).collect();
        if usable.is_empty() {
            return 0.0;
        }
        let deployed = self.cash;
        let allocation = deployed / usable.len() as f64;
        for pick in usable {
            *self.holdings.entry(pick.ticker.clone()).or_insert(0.0) += allocation / pick.price;
        }
        self.cash = 0.0;
        deployed
    }

    /// Σ shares × price over holdings priced on `date`; unpriced holdings
    /// count as zero for that day only.
    pub fn holdings_value(&self, prices: &PriceTable, date: NaiveDate) -> f64 {
        self.holdings
            .iter()
            .filter_map(|(ticker, &shares)| prices.price_on(ticker, date).map(|p| shares * p))
            .sum()
    }

    pub fn total_value(&self, prices: &PriceTable, date: NaiveDate) -> f64 {
        self.holdings_value(prices, date) + self.cash
    }
}
