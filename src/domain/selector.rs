//! Stock selection policies.
//!
//! Both policies share one admission screen on estimated fundamentals:
//!
//! ```text
//! market_cap >= min_market_cap
//! 0 < pe < max_pe_multiple * market_cap / 1e9
//! ```
//!
//! Value-Only ranks admitted tickers by estimated market cap, largest first.
//! Multi-Factor additionally requires positive momentum and positive
//! earnings growth, then orders by the sum of three rank positions (P/E
//! ascending, growth descending, momentum descending), lowest sum first.

use chrono::NaiveDate;
use tracing::debug;

use super::error::{FundamentalField, MissingData};
use super::estimator::FundamentalsEstimator;
use super::momentum::{momentum, DEFAULT_LOOKBACK_DAYS};
use super::price_table::PriceTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionPolicy {
    ValueOnly,
    MultiFactor,
}

impl SelectionPolicy {
    pub const ALL: [SelectionPolicy; 2] = [SelectionPolicy::ValueOnly, SelectionPolicy::MultiFactor];

    /// Display name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            SelectionPolicy::ValueOnly => "Value-Only",
            SelectionPolicy::MultiFactor => "Multi-Factor",
        }
    }

    /// Parse a config/CLI key such as `value` or `multifactor`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "value" | "valueonly" => Some(SelectionPolicy::ValueOnly),
            "multifactor" | "mf" => Some(SelectionPolicy::MultiFactor),
            _ => None,
        }
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Admission thresholds and portfolio size.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRules {
    pub num_stocks: usize,
    pub min_market_cap: f64,
    pub max_pe_multiple: f64,
    pub momentum_lookback: usize,
}

impl Default for SelectionRules {
    fn default() -> Self {
        SelectionRules {
            num_stocks: 25,
            min_market_cap: 10e9,
            max_pe_multiple: 0.5,
            momentum_lookback: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl SelectionRules {
    /// The shared fundamentals screen.
    pub fn admits(&self, market_cap: f64, pe_ratio: f64) -> bool {
        let market_cap_billions = market_cap / 1e9;
        market_cap >= self.min_market_cap
            && pe_ratio > 0.0
            && pe_ratio < self.max_pe_multiple * market_cap_billions
    }
}

/// Per-factor rank positions, 1-based; ties share the average position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorRanks {
    pub value: f64,
    pub growth: f64,
    pub momentum: f64,
}

impl FactorRanks {
    pub fn composite(&self) -> f64 {
        self.value + self.growth + self.momentum
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub ticker: String,
    pub market_cap: f64,
    pub pe_ratio: f64,
    pub momentum: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub price: f64,
    pub ranks: Option<FactorRanks>,
    pub composite_score: Option<f64>,
}

/// Anything that can produce an ordered candidate list for a date.
pub trait Selector {
    fn name(&self) -> &str;
    fn select(&self, date: NaiveDate) -> Vec<Candidate>;
}

pub struct StockSelector<'a> {
    policy: SelectionPolicy,
    prices: &'a PriceTable,
    estimator: &'a dyn FundamentalsEstimator,
    rules: &'a SelectionRules,
}

impl<'a> StockSelector<'a> {
    pub fn new(
        policy: SelectionPolicy,
        prices: &'a PriceTable,
        estimator: &'a dyn FundamentalsEstimator,
        rules: &'a SelectionRules,
    ) -> Self {
        Self {
            policy,
            prices,
            estimator,
            rules,
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Estimated fundamentals for one ticker; `Ok(None)` when the data is
    /// present but fails the screen.
    fn screen(&self, ticker: &str, date: NaiveDate) -> Result<Option<Candidate>, MissingData> {
        let price = self
            .prices
            .price_at_or_before(ticker, date)
            .ok_or_else(|| MissingData::NoPrice {
                ticker: ticker.to_string(),
                date,
            })?;
        if price <= 0.0 {
            return Err(MissingData::NonPositivePrice {
                ticker: ticker.to_string(),
                date,
                price,
            });
        }

        let market_cap = self
            .estimator
            .estimate(FundamentalField::MarketCap, ticker, date)?;
        let pe_ratio = self
            .estimator
            .estimate(FundamentalField::TrailingPe, ticker, date)?;

        let mut candidate = Candidate {
            ticker: ticker.to_string(),
            market_cap,
            pe_ratio,
            momentum: None,
            earnings_growth: None,
            price,
            ranks: None,
            composite_score: None,
        };

        if self.policy == SelectionPolicy::MultiFactor {
            let mom = momentum(self.prices, ticker, date, self.rules.momentum_lookback)?;
            let growth = self.estimator.earnings_growth(ticker)?;
            candidate.momentum = Some(mom);
            candidate.earnings_growth = Some(growth);
            if mom <= 0.0 || growth <= 0.0 {
                return Ok(None);
            }
        }

        if !self.rules.admits(market_cap, pe_ratio) {
            return Ok(None);
        }
        Ok(Some(candidate))
    }
}

impl Selector for StockSelector<'_> {
    fn name(&self) -> &str {
        self.policy.name()
    }

    fn select(&self, date: NaiveDate) -> Vec<Candidate> {
        let mut admitted = Vec::new();
        for ticker in self.prices.tickers() {
            match self.screen(ticker, date) {
                Ok(Some(candidate)) => admitted.push(candidate),
                Ok(None) => {}
                Err(reason) => debug!(policy = %self.policy, %date, %reason, "excluded"),
            }
        }
        debug!(policy = %self.policy, %date, admitted = admitted.len(), "screen complete");

        let mut ranked = match self.policy {
            SelectionPolicy::ValueOnly => rank_by_market_cap(admitted),
            SelectionPolicy::MultiFactor => rank_multi_factor(admitted),
        };
        ranked.truncate(self.rules.num_stocks);
        ranked
    }
}

/// Largest estimated market cap first; equal caps keep input order.
pub fn rank_by_market_cap(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap));
    candidates
}

/// Assign factor ranks and composite scores, then order by score ascending.
/// Candidates missing momentum or growth rank last on that factor.
pub fn rank_multi_factor(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    let pe: Vec<f64> = candidates.iter().map(|c| c.pe_ratio).collect();
    let growth: Vec<f64> = candidates
        .iter()
        .map(|c| c.earnings_growth.unwrap_or(f64::NEG_INFINITY))
        .collect();
    let mom: Vec<f64> = candidates
        .iter()
        .map(|c| c.momentum.unwrap_or(f64::NEG_INFINITY))
        .collect();

    let value_ranks = average_ranks(&pe, true);
    let growth_ranks = average_ranks(&growth, false);
    let momentum_ranks = average_ranks(&mom, false);

    for (i, candidate) in candidates.iter_mut().enumerate() {
        let ranks = FactorRanks {
            value: value_ranks[i],
            growth: growth_ranks[i],
            momentum: momentum_ranks[i],
        };
        candidate.composite_score = Some(ranks.composite());
        candidate.ranks = Some(ranks);
    }

    candidates.sort_by(|a, b| {
        let sa = a.composite_score.unwrap_or(f64::INFINITY);
        let sb = b.composite_score.unwrap_or(f64::INFINITY);
        sa.total_cmp(&sb)
    });
    candidates
}

/// 1-based rank positions; tied values share the mean of their positions.
pub fn average_ranks(values: &[f64], ascending: bool) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let ord = values[a].total_cmp(&values[b]);
        if ascending { ord } else { ord.reverse() }
    });

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let avg = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = avg;
        }
        start = end + 1;
    }
    ranks
}
