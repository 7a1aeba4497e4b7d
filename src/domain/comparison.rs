//! Cross-strategy comparison: best CAGR, best Sharpe, alpha vs benchmark.

use super::metrics::Metrics;

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub best_cagr: Option<(String, f64)>,
    pub best_sharpe: Option<(String, f64)>,
    /// CAGR difference in percentage points, per non-benchmark strategy.
    pub alphas: Vec<(String, f64)>,
}

/// `strategies` excludes the benchmark; the leaders are chosen among all
/// entries including the benchmark. The first entry wins ties.
pub fn compare(strategies: &[(String, Metrics)], benchmark: Option<&(String, Metrics)>) -> Comparison {
    let everyone: Vec<&(String, Metrics)> = strategies.iter().chain(benchmark).collect();

    let leader = |key: fn(&Metrics) -> f64| {
        everyone
            .iter()
            .fold(None::<&(String, Metrics)>, |best, entry| match best {
                Some(b) if key(&b.1) >= key(&entry.1) => Some(b),
                _ => Some(*entry),
            })
            .map(|(name, m)| (name.clone(), key(m)))
    };

    let alphas = match benchmark {
        Some((_, bench)) => strategies
            .iter()
            .map(|(name, m)| (name.clone(), m.cagr_pct - bench.cagr_pct))
            .collect(),
        None => Vec::new(),
    };

    Comparison {
        best_cagr: leader(|m| m.cagr_pct),
        best_sharpe: leader(|m| m.sharpe_ratio),
        alphas,
    }
}
