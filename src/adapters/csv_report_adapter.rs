//! CSV report adapter.
//!
//! Writes one file per view of the backtest into the output directory:
//! `summary.csv`, `daily_values.csv`, `drawdowns.csv`,
//! `annual_returns.csv` and `rebalances.csv`. Wide files carry one column
//! per run, strategies first and the benchmark last.

use crate::domain::backtest::{BacktestResult, StrategyRun};
use crate::domain::error::FactortraderError;
use crate::domain::metrics::drawdown_series;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::info;

pub const SUMMARY_FILE: &str = "summary.csv";
pub const DAILY_VALUES_FILE: &str = "daily_values.csv";
pub const DRAWDOWNS_FILE: &str = "drawdowns.csv";
pub const ANNUAL_RETURNS_FILE: &str = "annual_returns.csv";
pub const REBALANCES_FILE: &str = "rebalances.csv";

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

type CsvWriter = csv::Writer<fs::File>;

fn create(output_dir: &Path, file: &str) -> Result<CsvWriter, FactortraderError> {
    let writer = csv::Writer::from_path(output_dir.join(file)).map_err(std::io::Error::from)?;
    Ok(writer)
}

fn finish(mut writer: CsvWriter) -> Result<(), FactortraderError> {
    writer.flush()?;
    Ok(())
}

fn row<I, T>(writer: &mut CsvWriter, fields: I) -> Result<(), FactortraderError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    writer.write_record(fields).map_err(std::io::Error::from)?;
    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

fn header(first: &str, runs: &[&StrategyRun]) -> Vec<String> {
    std::iter::once(first.to_string())
        .chain(runs.iter().map(|r| r.name().to_string()))
        .collect()
}

/// Date-keyed wide table; a run without a row on some date leaves the cell
/// empty.
fn write_date_matrix(
    output_dir: &Path,
    file: &str,
    runs: &[&StrategyRun],
    columns: &[Vec<(NaiveDate, f64)>],
) -> Result<(), FactortraderError> {
    let dates: BTreeSet<NaiveDate> = columns
        .iter()
        .flat_map(|c| c.iter().map(|(d, _)| *d))
        .collect();
    let lookups: Vec<BTreeMap<NaiveDate, f64>> = columns
        .iter()
        .map(|c| c.iter().copied().collect())
        .collect();

    let mut writer = create(output_dir, file)?;
    row(&mut writer, header("date", runs))?;
    for date in dates {
        let fields = std::iter::once(date.to_string())
            .chain(lookups.iter().map(|l| cell(l.get(&date).copied())));
        row(&mut writer, fields)?;
    }
    finish(writer)
}

fn write_summary(output_dir: &Path, runs: &[&StrategyRun]) -> Result<(), FactortraderError> {
    let mut writer = create(output_dir, SUMMARY_FILE)?;
    row(
        &mut writer,
        [
            "strategy",
            "total_invested",
            "final_value",
            "total_return_pct",
            "cagr_pct",
            "volatility_pct",
            "sharpe_ratio",
            "max_drawdown_pct",
        ],
    )?;
    for run in runs {
        let m = &run.metrics;
        row(
            &mut writer,
            [
                run.name().to_string(),
                format!("{:.2}", m.total_invested),
                format!("{:.2}", m.final_value),
                format!("{:.4}", m.total_return_pct),
                format!("{:.4}", m.cagr_pct),
                format!("{:.4}", m.volatility_pct),
                format!("{:.4}", m.sharpe_ratio),
                format!("{:.4}", m.max_drawdown_pct),
            ],
        )?;
    }
    finish(writer)
}

fn write_annual_returns(output_dir: &Path, runs: &[&StrategyRun]) -> Result<(), FactortraderError> {
    let years: BTreeSet<i32> = runs
        .iter()
        .flat_map(|r| r.annual_returns.iter().map(|a| a.year))
        .collect();

    let mut writer = create(output_dir, ANNUAL_RETURNS_FILE)?;
    row(&mut writer, header("year", runs))?;
    for year in years {
        let fields = std::iter::once(year.to_string()).chain(runs.iter().map(|r| {
            cell(
                r.annual_returns
                    .iter()
                    .find(|a| a.year == year)
                    .map(|a| a.return_pct),
            )
        }));
        row(&mut writer, fields)?;
    }
    finish(writer)
}

fn write_rebalances(output_dir: &Path, runs: &[&StrategyRun]) -> Result<(), FactortraderError> {
    let mut writer = create(output_dir, REBALANCES_FILE)?;
    row(
        &mut writer,
        [
            "strategy",
            "scheduled",
            "executed",
            "proceeds",
            "deployed",
            "idle_cash",
            "total_invested",
            "selected_count",
            "selected",
        ],
    )?;
    for run in runs {
        for event in &run.simulation.rebalances {
            row(
                &mut writer,
                [
                    run.name().to_string(),
                    event.scheduled.to_string(),
                    event.executed.to_string(),
                    format!("{:.2}", event.proceeds),
                    format!("{:.2}", event.deployed),
                    format!("{:.2}", event.idle_cash),
                    format!("{:.2}", event.total_invested),
                    event.selected.len().to_string(),
                    event.selected.join(" "),
                ],
            )?;
        }
    }
    finish(writer)
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), FactortraderError> {
        fs::create_dir_all(output_dir)?;
        let runs: Vec<&StrategyRun> = result.all_runs().collect();

        write_summary(output_dir, &runs)?;

        let values: Vec<Vec<(NaiveDate, f64)>> = runs
            .iter()
            .map(|r| {
                r.simulation
                    .history
                    .points()
                    .iter()
                    .map(|p| (p.date, p.value))
                    .collect()
            })
            .collect();
        write_date_matrix(output_dir, DAILY_VALUES_FILE, &runs, &values)?;

        let drawdowns: Vec<Vec<(NaiveDate, f64)>> = runs
            .iter()
            .map(|r| drawdown_series(&r.simulation.history))
            .collect();
        write_date_matrix(output_dir, DRAWDOWNS_FILE, &runs, &drawdowns)?;

        write_annual_returns(output_dir, &runs)?;
        write_rebalances(output_dir, &runs)?;

        info!(dir = %output_dir.display(), runs = runs.len(), "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::comparison::compare;
    use crate::domain::metrics::{annual_returns, Metrics};
    use crate::domain::portfolio::{PortfolioHistory, ValuePoint};
    use crate::domain::simulator::{RebalanceEvent, SimulationResult};
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn run(name: &str, rows: &[(NaiveDate, f64)], rebalances: Vec<RebalanceEvent>) -> StrategyRun {
        let history: PortfolioHistory = rows
            .iter()
            .map(|&(date, value)| ValuePoint {
                date,
                value,
                invested: 1000.0,
            })
            .collect();
        StrategyRun {
            metrics: Metrics::compute(&history, 0.04),
            annual_returns: annual_returns(&history),
            simulation: SimulationResult {
                name: name.to_string(),
                history,
                rebalances,
            },
        }
    }

    fn sample_result() -> BacktestResult {
        let event = RebalanceEvent {
            scheduled: d(2024, 1, 1),
            executed: d(2024, 1, 2),
            proceeds: 0.0,
            selected: vec!["AAA".into(), "BBB".into()],
            deployed: 1000.0,
            idle_cash: 0.0,
            total_invested: 1000.0,
        };
        let value = run(
            "Value-Only",
            &[(d(2024, 1, 2), 1000.0), (d(2024, 1, 3), 1100.0)],
            vec![event],
        );
        let bench = run(
            "SPY",
            &[(d(2024, 1, 3), 1000.0), (d(2024, 1, 4), 990.0)],
            Vec::new(),
        );
        let comparison = compare(
            &[(value.name().to_string(), value.metrics)],
            Some(&(bench.name().to_string(), bench.metrics)),
        );
        BacktestResult {
            strategies: vec![value],
            benchmark: Some(bench),
            comparison,
        }
    }

    fn lines(dir: &Path, file: &str) -> Vec<String> {
        fs::read_to_string(dir.join(file))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn writes_every_report_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/report");
        CsvReportAdapter::new().write(&sample_result(), &out).unwrap();

        for file in [
            SUMMARY_FILE,
            DAILY_VALUES_FILE,
            DRAWDOWNS_FILE,
            ANNUAL_RETURNS_FILE,
            REBALANCES_FILE,
        ] {
            assert!(out.join(file).exists(), "{file} missing");
        }
    }

    #[test]
    fn summary_has_one_row_per_run() {
        let dir = TempDir::new().unwrap();
        CsvReportAdapter::new().write(&sample_result(), dir.path()).unwrap();

        let summary = lines(dir.path(), SUMMARY_FILE);
        assert_eq!(summary.len(), 3);
        assert!(summary[0].starts_with("strategy,total_invested,final_value"));
        assert!(summary[1].starts_with("Value-Only,1000.00,1100.00,10.0000"));
        assert!(summary[2].starts_with("SPY,"));
    }

    #[test]
    fn daily_values_align_on_the_union_of_dates() {
        let dir = TempDir::new().unwrap();
        CsvReportAdapter::new().write(&sample_result(), dir.path()).unwrap();

        let daily = lines(dir.path(), DAILY_VALUES_FILE);
        assert_eq!(
            daily,
            vec![
                "date,Value-Only,SPY",
                "2024-01-02,1000.0000,",
                "2024-01-03,1100.0000,1000.0000",
                "2024-01-04,,990.0000",
            ]
        );
    }

    #[test]
    fn rebalance_log_lists_selected_tickers() {
        let dir = TempDir::new().unwrap();
        CsvReportAdapter::new().write(&sample_result(), dir.path()).unwrap();

        let log = lines(dir.path(), REBALANCES_FILE);
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[1],
            "Value-Only,2024-01-01,2024-01-02,0.00,1000.00,0.00,1000.00,2,AAA BBB"
        );
    }

    #[test]
    fn drawdowns_are_in_percent() {
        let dir = TempDir::new().unwrap();
        CsvReportAdapter::new().write(&sample_result(), dir.path()).unwrap();

        let dd = lines(dir.path(), DRAWDOWNS_FILE);
        assert_eq!(dd[3], "2024-01-04,,-1.0000");
    }
}
