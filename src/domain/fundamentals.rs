//! Point-in-time fundamentals snapshot.

use std::collections::HashMap;

use super::error::FundamentalField;

/// Current fundamentals for one ticker. Any field may be unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fundamentals {
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub earnings_growth: Option<f64>,
}

impl Fundamentals {
    pub fn get(&self, field: FundamentalField) -> Option<f64> {
        match field {
            FundamentalField::MarketCap => self.market_cap,
            FundamentalField::TrailingPe => self.trailing_pe,
            FundamentalField::EarningsGrowth => self.earnings_growth,
        }
        .filter(|v| v.is_finite())
    }
}

/// Ticker → fundamentals, as of the moment the snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundamentalsSnapshot {
    entries: HashMap<String, Fundamentals>,
}

impl FundamentalsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: impl Into<String>, fundamentals: Fundamentals) {
        self.entries.insert(ticker.into(), fundamentals);
    }

    pub fn get(&self, ticker: &str) -> Option<&Fundamentals> {
        self.entries.get(ticker)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.entries.contains_key(ticker)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Fundamentals)> for FundamentalsSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Fundamentals)>>(iter: I) -> Self {
        FundamentalsSnapshot {
            entries: iter.into_iter().collect(),
        }
    }
}
