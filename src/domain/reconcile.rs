//! Cross-provider EPS reconciliation.
//!
//! Two fundamentals sources rarely agree to the cent: one may report basic
//! EPS and the other diluted, and restatements land at different times. For
//! each ticker, every fiscal year both sources cover is compared by relative
//! difference against a tolerance.

use crate::domain::error::FactortraderError;
use crate::ports::earnings_port::EarningsPort;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Annual EPS keyed by fiscal year.
pub type EpsByYear = BTreeMap<i32, f64>;

pub const DEFAULT_TOLERANCE: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearComparison {
    pub year: i32,
    pub primary_eps: f64,
    pub secondary_eps: f64,
    pub diff_pct: f64,
    pub status: Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPrimaryData,
    NoSecondaryData,
    NoOverlap,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoPrimaryData => write!(f, "no primary data"),
            SkipReason::NoSecondaryData => write!(f, "no secondary data"),
            SkipReason::NoOverlap => write!(f, "no overlapping years"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    Compared(Vec<YearComparison>),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerReconciliation {
    pub ticker: String,
    pub outcome: TickerOutcome,
}

impl TickerReconciliation {
    pub fn years(&self) -> &[YearComparison] {
        match &self.outcome {
            TickerOutcome::Compared(years) => years.as_slice(),
            TickerOutcome::Skipped(_) => &[],
        }
    }

    /// `None` when the ticker was skipped.
    pub fn passed(&self) -> Option<bool> {
        match &self.outcome {
            TickerOutcome::Compared(years) => Some(years.iter().all(|y| y.status == Status::Pass)),
            TickerOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// Nothing was compared.
    Inconclusive,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Inconclusive => write!(f, "INCONCLUSIVE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub primary: String,
    pub secondary: String,
    pub tolerance: f64,
    pub tickers: Vec<TickerReconciliation>,
}

impl ReconciliationReport {
    fn years(&self) -> impl Iterator<Item = &YearComparison> {
        self.tickers.iter().flat_map(|t| t.years())
    }

    pub fn total(&self) -> usize {
        self.years().count()
    }

    pub fn passed(&self) -> usize {
        self.years().filter(|y| y.status == Status::Pass).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn skipped(&self) -> usize {
        self.tickers.iter().filter(|t| t.passed().is_none()).count()
    }

    pub fn verdict(&self) -> Verdict {
        match (self.total(), self.failed()) {
            (0, _) => Verdict::Inconclusive,
            (_, 0) => Verdict::Pass,
            _ => Verdict::Fail,
        }
    }
}

/// Relative difference in percent, measured against `secondary`. Two zeros
/// agree; a zero against a non-zero is a 100% miss.
pub fn relative_difference_pct(primary: f64, secondary: f64) -> f64 {
    if primary == 0.0 && secondary == 0.0 {
        0.0
    } else if primary == 0.0 || secondary == 0.0 {
        100.0
    } else {
        (primary - secondary).abs() / secondary.abs() * 100.0
    }
}

/// Compare the years both series cover, in ascending year order. A year
/// passes when its difference is at most `tolerance` (a fraction).
pub fn compare_eps(primary: &EpsByYear, secondary: &EpsByYear, tolerance: f64) -> Vec<YearComparison> {
    let limit = tolerance * 100.0;
    primary
        .iter()
        .filter_map(|(&year, &a)| secondary.get(&year).map(|&b| (year, a, b)))
        .map(|(year, a, b)| {
            let diff_pct = relative_difference_pct(a, b);
            YearComparison {
                year,
                primary_eps: a,
                secondary_eps: b,
                diff_pct,
                status: if diff_pct <= limit { Status::Pass } else { Status::Fail },
            }
        })
        .collect()
}

pub fn reconcile_ticker(primary: &EpsByYear, secondary: &EpsByYear, tolerance: f64) -> TickerOutcome {
    if primary.is_empty() {
        return TickerOutcome::Skipped(SkipReason::NoPrimaryData);
    }
    if secondary.is_empty() {
        return TickerOutcome::Skipped(SkipReason::NoSecondaryData);
    }
    let years = compare_eps(primary, secondary, tolerance);
    if years.is_empty() {
        TickerOutcome::Skipped(SkipReason::NoOverlap)
    } else {
        TickerOutcome::Compared(years)
    }
}

/// Reconcile every ticker. A source that cannot be read at all aborts;
/// a ticker one source lacks is skipped.
pub fn reconcile(
    primary: &dyn EarningsPort,
    secondary: &dyn EarningsPort,
    tickers: &[String],
    tolerance: f64,
) -> Result<ReconciliationReport, FactortraderError> {
    let mut results = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let outcome = reconcile_ticker(
            &primary.fetch_eps(ticker)?,
            &secondary.fetch_eps(ticker)?,
            tolerance,
        );
        match &outcome {
            TickerOutcome::Skipped(reason) => info!(%ticker, %reason, "skipping"),
            TickerOutcome::Compared(years) => debug!(%ticker, years = years.len(), "compared"),
        }
        results.push(TickerReconciliation {
            ticker: ticker.clone(),
            outcome,
        });
    }

    Ok(ReconciliationReport {
        primary: primary.source_name().to_string(),
        secondary: secondary.source_name().to_string(),
        tolerance,
        tickers: results,
    })
}
