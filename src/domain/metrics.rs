//! Performance metrics over a daily value series.
//!
//! Only rows with a positive value take part: leading zero-value rows are
//! the period before the first purchase, not real returns.

use chrono::Datelike;

use super::portfolio::{PortfolioHistory, ValuePoint};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.04;

/// All percentages are expressed in percent (20.0 means 20%).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub total_invested: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub cagr_pct: f64,
    pub volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
}

impl Metrics {
    pub fn compute(history: &PortfolioHistory, risk_free_rate: f64) -> Self {
        let valid: Vec<ValuePoint> = history
            .points()
            .iter()
            .filter(|p| p.value > 0.0)
            .copied()
            .collect();

        let (Some(first), Some(last)) = (valid.first(), valid.last()) else {
            return Metrics::default();
        };

        let total_invested = last.invested;
        let final_value = last.value;
        let total_return_pct = if total_invested > 0.0 {
            (final_value - total_invested) / total_invested * 100.0
        } else {
            0.0
        };

        let years = (last.date - first.date).num_days() as f64 / DAYS_PER_YEAR;
        let cagr_pct = if first.value > 0.0 && years > 0.0 {
            ((final_value / first.value).powf(1.0 / years) - 1.0) * 100.0
        } else {
            0.0
        };

        let volatility_pct = annualized_volatility(&valid) * 100.0;
        let sharpe_ratio = if volatility_pct > 0.0 {
            (cagr_pct / 100.0 - risk_free_rate) / (volatility_pct / 100.0)
        } else {
            0.0
        };

        let max_drawdown_pct = compute_max_drawdown(&valid) * 100.0;

        Metrics {
            total_invested,
            final_value,
            total_return_pct,
            cagr_pct,
            volatility_pct,
            sharpe_ratio,
            max_drawdown_pct,
        }
    }
}

/// Day-over-day returns with zero returns removed.
fn daily_returns(points: &[ValuePoint]) -> Vec<f64> {
    points
        .windows(2)
        .map(|w| (w[1].value - w[0].value) / w[0].value)
        .filter(|r| *r != 0.0 && r.is_finite())
        .collect()
}

/// Sample standard deviation of daily returns scaled by sqrt(252).
fn annualized_volatility(points: &[ValuePoint]) -> f64 {
    let returns = daily_returns(points);
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Most negative (value - running max) / running max; 0 or below.
fn compute_max_drawdown(points: &[ValuePoint]) -> f64 {
    drawdowns(points).into_iter().fold(0.0, f64::min)
}

fn drawdowns(points: &[ValuePoint]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    points
        .iter()
        .map(|p| {
            peak = peak.max(p.value);
            if peak > 0.0 { (p.value - peak) / peak } else { 0.0 }
        })
        .collect()
}

/// Drawdown in percent for every row of the history.
pub fn drawdown_series(history: &PortfolioHistory) -> Vec<(chrono::NaiveDate, f64)> {
    let points = history.points();
    points
        .iter()
        .zip(drawdowns(points))
        .map(|(p, dd)| (p.date, dd * 100.0))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnualReturn {
    pub year: i32,
    pub return_pct: f64,
}

/// Return from the first to the last row of each calendar year. Years with
/// a single row, or starting at zero value, are skipped.
pub fn annual_returns(history: &PortfolioHistory) -> Vec<AnnualReturn> {
    let mut out = Vec::new();
    for year_points in history.points().chunk_by(|a, b| a.date.year() == b.date.year()) {
        let (first, last) = (&year_points[0], &year_points[year_points.len() - 1]);
        if year_points.len() < 2 || first.value <= 0.0 {
            continue;
        }
        out.push(AnnualReturn {
            year: first.date.year(),
            return_pct: (last.value / first.value - 1.0) * 100.0,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn history(values: &[f64], invested: f64) -> PortfolioHistory {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| ValuePoint {
                date: start + chrono::Duration::days(i as i64),
                value,
                invested,
            })
            .collect()
    }

    #[test]
    fn empty_history_is_all_zero() {
        let m = Metrics::compute(&PortfolioHistory::new(), 0.04);
        assert_eq!(m, Metrics::default());
        let m = Metrics::compute(&history(&[0.0, 0.0], 1000.0), 0.04);
        assert_eq!(m, Metrics::default());
    }

    #[test]
    fn worked_example() {
        let m = Metrics::compute(&history(&[1000.0, 1000.0, 1100.0, 1050.0, 1200.0], 1000.0), 0.04);
        assert_relative_eq!(m.total_return_pct, 20.0);
        assert_relative_eq!(m.final_value, 1200.0);
        assert_relative_eq!(m.max_drawdown_pct, (1050.0 - 1100.0) / 1100.0 * 100.0);
        assert!((m.max_drawdown_pct + 4.545).abs() < 1e-3);
    }

    #[test]
    fn cagr_over_one_year() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let h: PortfolioHistory = vec![
            ValuePoint {
                date: start,
                value: 1000.0,
                invested: 1000.0,
            },
            ValuePoint {
                date: start + chrono::Duration::days(365),
                value: 1100.0,
                invested: 1000.0,
            },
        ]
        .into_iter()
        .collect();
        let m = Metrics::compute(&h, 0.04);
        let years = 365.0 / 365.25;
        assert_relative_eq!(m.cagr_pct, (1.1f64.powf(1.0 / years) - 1.0) * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn single_row_has_zero_cagr_and_volatility() {
        let m = Metrics::compute(&history(&[1500.0], 1000.0), 0.04);
        assert_relative_eq!(m.total_return_pct, 50.0);
        assert_eq!(m.cagr_pct, 0.0);
        assert_eq!(m.volatility_pct, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn zero_returns_are_excluded_from_volatility() {
        let with_flat = Metrics::compute(&history(&[100.0, 100.0, 110.0, 110.0, 99.0], 100.0), 0.0);
        let without = Metrics::compute(&history(&[100.0, 110.0, 99.0], 100.0), 0.0);
        assert_relative_eq!(with_flat.volatility_pct, without.volatility_pct);
    }

    #[test]
    fn volatility_uses_sample_stdev() {
        // returns +10%, -10%: mean 0, sample variance 0.02
        let m = Metrics::compute(&history(&[100.0, 110.0, 99.0], 100.0), 0.0);
        assert_relative_eq!(m.volatility_pct, 0.02f64.sqrt() * 252f64.sqrt() * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn sharpe_uses_cagr_and_volatility() {
        let m = Metrics::compute(&history(&[100.0, 103.0, 101.0, 106.0, 104.0, 110.0], 100.0), 0.04);
        assert_relative_eq!(
            m.sharpe_ratio,
            (m.cagr_pct / 100.0 - 0.04) / (m.volatility_pct / 100.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn leading_zero_rows_are_ignored() {
        let a = Metrics::compute(&history(&[0.0, 0.0, 100.0, 120.0], 100.0), 0.04);
        assert_relative_eq!(a.total_return_pct, 20.0);
        assert_relative_eq!(a.max_drawdown_pct, 0.0);
    }

    #[test]
    fn monotonic_series_has_no_drawdown() {
        let m = Metrics::compute(&history(&[100.0, 101.0, 102.0, 103.0], 100.0), 0.04);
        assert_eq!(m.max_drawdown_pct, 0.0);
    }

    #[test]
    fn drawdown_series_tracks_running_peak() {
        let series = drawdown_series(&history(&[100.0, 120.0, 90.0, 130.0], 100.0));
        let dds: Vec<f64> = series.iter().map(|(_, dd)| *dd).collect();
        assert_relative_eq!(dds[0], 0.0);
        assert_relative_eq!(dds[1], 0.0);
        assert_relative_eq!(dds[2], -25.0);
        assert_relative_eq!(dds[3], 0.0);
    }

    #[test]
    fn annual_returns_per_calendar_year() {
        let h: PortfolioHistory = [
            (2021, 1, 4, 1000.0),
            (2021, 6, 1, 1050.0),
            (2021, 12, 31, 1200.0),
            (2022, 1, 3, 2200.0),
            (2022, 12, 30, 1980.0),
            (2023, 1, 3, 3000.0),
        ]
        .iter()
        .map(|&(y, m, d, value)| ValuePoint {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            value,
            invested: 0.0,
        })
        .collect();

        let returns = annual_returns(&h);
        assert_eq!(returns.len(), 2);
        assert_eq!(returns[0].year, 2021);
        assert_relative_eq!(returns[0].return_pct, 20.0, epsilon = 1e-9);
        assert_eq!(returns[1].year, 2022);
        assert_relative_eq!(returns[1].return_pct, -10.0, epsilon = 1e-9);
    }
}
