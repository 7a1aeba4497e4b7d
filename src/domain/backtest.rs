//! Backtest orchestration.
//!
//! [`BacktestConfig`] holds every tunable parameter. [`run_backtest`] runs
//! each configured selection policy, plus the benchmark when one is
//! supplied, against the same read-only [`MarketData`].

use chrono::NaiveDate;
use tracing::info;

use super::benchmark::run_benchmark;
use super::comparison::{compare, Comparison};
use super::estimator::PriceRatioEstimator;
use super::market_data::MarketData;
use super::metrics::{annual_returns, AnnualReturn, Metrics, DEFAULT_RISK_FREE_RATE};
use super::selector::{SelectionPolicy, SelectionRules, StockSelector};
use super::simulator::{run_simulation, SimulationConfig, SimulationResult};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub data_start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rebalance_dates: Vec<NaiveDate>,
    pub contribution: f64,
    pub risk_free_rate: f64,
    pub benchmark: Option<String>,
    pub strategies: Vec<SelectionPolicy>,
    pub selection: SelectionRules,
}

impl BacktestConfig {
    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            rebalance_dates: self.rebalance_dates.clone(),
            contribution: self.contribution,
        }
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        BacktestConfig {
            data_start_date: date(2020, 6, 1),
            end_date: date(2026, 1, 22),
            rebalance_dates: vec![
                date(2021, 1, 4),
                date(2022, 1, 3),
                date(2023, 1, 3),
                date(2024, 1, 2),
                date(2025, 1, 2),
            ],
            contribution: 1000.0,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            benchmark: Some("SPY".to_string()),
            strategies: SelectionPolicy::ALL.to_vec(),
            selection: SelectionRules::default(),
        }
    }
}

/// One simulated strategy with its derived statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRun {
    pub simulation: SimulationResult,
    pub metrics: Metrics,
    pub annual_returns: Vec<AnnualReturn>,
}

impl StrategyRun {
    fn from_simulation(simulation: SimulationResult, risk_free_rate: f64) -> Self {
        let metrics = Metrics::compute(&simulation.history, risk_free_rate);
        let annual_returns = annual_returns(&simulation.history);
        StrategyRun {
            simulation,
            metrics,
            annual_returns,
        }
    }

    pub fn name(&self) -> &str {
        &self.simulation.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub strategies: Vec<StrategyRun>,
    pub benchmark: Option<StrategyRun>,
    pub comparison: Comparison,
}

impl BacktestResult {
    /// Strategies followed by the benchmark, in report order.
    pub fn all_runs(&self) -> impl Iterator<Item = &StrategyRun> {
        self.strategies.iter().chain(self.benchmark.as_ref())
    }
}

pub fn run_backtest(data: &MarketData, config: &BacktestConfig) -> BacktestResult {
    let estimator = PriceRatioEstimator::new(&data.prices, &data.snapshot);
    let simulation = config.simulation();

    let strategies: Vec<StrategyRun> = config
        .strategies
        .iter()
        .map(|&policy| {
            info!(strategy = %policy, "running strategy");
            let selector = StockSelector::new(policy, &data.prices, &estimator, &config.selection);
            let result = run_simulation(&data.prices, &selector, &simulation);
            StrategyRun::from_simulation(result, config.risk_free_rate)
        })
        .collect();

    let benchmark = data.benchmark.as_ref().map(|series| {
        info!(symbol = %series.symbol, "running benchmark");
        StrategyRun::from_simulation(run_benchmark(series, &simulation), config.risk_free_rate)
    });

    let named: Vec<(String, Metrics)> = strategies
        .iter()
        .map(|run| (run.name().to_string(), run.metrics))
        .collect();
    let bench_named = benchmark
        .as_ref()
        .map(|run| (run.name().to_string(), run.metrics));
    let comparison = compare(&named, bench_named.as_ref());

    BacktestResult {
        strategies,
        benchmark,
        comparison,
    }
}
