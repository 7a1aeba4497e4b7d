//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvMarketDataAdapter;
use crate::adapters::csv_earnings_adapter::CsvEarningsAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    parse_strategies, required_date, required_date_list, validate_backtest_config,
    validate_reconcile_config, validate_selection_config, validate_tolerance,
};
use crate::domain::error::FactortraderError;
use crate::domain::estimator::PriceRatioEstimator;
use crate::domain::market_data::{load_market_data, MarketData};
use crate::domain::reconcile::{self, ReconciliationReport, TickerOutcome, Verdict, DEFAULT_TOLERANCE};
use crate::domain::selector::{Candidate, SelectionPolicy, SelectionRules, Selector, StockSelector};
use crate::logging::{init_logging, LoggingConfig};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::earnings_port::EarningsPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OUTPUT_DIR: &str = "report";
pub const DEFAULT_BENCHMARK: &str = "SPY";
pub const DEFAULT_PRIMARY_EPS_FILE: &str = "eps_primary.csv";
pub const DEFAULT_SECONDARY_EPS_FILE: &str = "eps_secondary.csv";

#[derive(Parser, Debug)]
#[command(name = "factortrader", about = "Rebalancing equity factor backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every configured strategy and the benchmark
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print one selector's candidates at a single date
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Defaults to the last trading date
        #[arg(long)]
        date: Option<NaiveDate>,
        /// `value` or `multifactor`; defaults to every configured strategy
        #[arg(long)]
        policy: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the loaded data range
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Compare annual EPS from two fundamentals providers
    Reconcile {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        primary: Option<PathBuf>,
        #[arg(long)]
        secondary: Option<PathBuf>,
        /// Allowed relative difference as a fraction, e.g. 0.15
        #[arg(long)]
        tolerance: Option<f64>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            output,
        } => run_backtest(&config, data_dir.as_ref(), output.as_ref()),
        Command::Screen {
            config,
            data_dir,
            date,
            policy,
        } => run_screen(&config, data_dir.as_ref(), date, policy.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, data_dir } => run_info(&config, data_dir.as_ref()),
        Command::Reconcile {
            config,
            primary,
            secondary,
            tolerance,
        } => run_reconcile(&config, primary.as_ref(), secondary.as_ref(), tolerance),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn start_logging(config: &dyn ConfigPort) {
    if let Err(e) = init_logging(&LoggingConfig::from_config(config)) {
        eprintln!("warning: logging disabled ({e})");
    }
}

fn validate_all(config: &dyn ConfigPort) -> Result<(), FactortraderError> {
    validate_backtest_config(config)?;
    validate_selection_config(config)
}

/// Load, validate and build in one step; errors are reported and mapped to
/// an exit code.
fn prepare(config_path: &PathBuf) -> Result<(FileConfigAdapter, BacktestConfig), ExitCode> {
    // Stage 1: Load config
    let adapter = load_config(config_path)?;
    start_logging(&adapter);
    info!(path = %config_path.display(), "loaded config");

    // Stage 2: Validate
    let report = |e: FactortraderError| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    };
    validate_all(&adapter).map_err(report)?;

    // Stage 3: Build BacktestConfig
    let bt_config = build_backtest_config(&adapter).map_err(report)?;
    Ok((adapter, bt_config))
}

pub fn build_selection_rules(adapter: &dyn ConfigPort) -> SelectionRules {
    let defaults = SelectionRules::default();
    SelectionRules {
        num_stocks: adapter.get_int("selection", "num_stocks", defaults.num_stocks as i64).max(1) as usize,
        min_market_cap: adapter.get_double("selection", "min_market_cap", defaults.min_market_cap),
        max_pe_multiple: adapter.get_double("selection", "max_pe_multiple", defaults.max_pe_multiple),
        momentum_lookback: adapter
            .get_int("selection", "momentum_lookback", defaults.momentum_lookback as i64)
            .max(0) as usize,
    }
}

/// `benchmark` defaults to SPY; an empty value or `none` disables it.
fn resolve_benchmark(adapter: &dyn ConfigPort) -> Option<String> {
    match adapter.get_string("backtest", "benchmark") {
        None => Some(DEFAULT_BENCHMARK.to_string()),
        Some(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(s.to_uppercase())
            }
        }
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, FactortraderError> {
    let defaults = BacktestConfig::default();
    Ok(BacktestConfig {
        data_start_date: required_date(adapter, "backtest", "data_start_date")?,
        end_date: required_date(adapter, "backtest", "end_date")?,
        rebalance_dates: required_date_list(adapter, "backtest", "rebalance_dates")?,
        contribution: adapter.get_double("backtest", "contribution", defaults.contribution),
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),
        benchmark: resolve_benchmark(adapter),
        strategies: parse_strategies(adapter)?,
        selection: build_selection_rules(adapter),
    })
}

/// `[data] tickers` override of the provider's constituent list.
pub fn resolve_tickers(config: &dyn ConfigPort) -> Option<Vec<String>> {
    ticker_list(config, "data")
}

fn ticker_list(config: &dyn ConfigPort, section: &str) -> Option<Vec<String>> {
    config
        .get_list(section, "tickers")
        .map(|list| list.into_iter().map(|t| t.to_uppercase()).collect::<Vec<_>>())
        .filter(|list| !list.is_empty())
}

pub fn resolve_data_dir(override_dir: Option<&PathBuf>, config: &dyn ConfigPort) -> PathBuf {
    override_dir
        .cloned()
        .or_else(|| config.get_string("data", "dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

pub fn resolve_output_dir(override_dir: Option<&PathBuf>, config: &dyn ConfigPort) -> PathBuf {
    override_dir
        .cloned()
        .or_else(|| config.get_string("report", "output_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

fn run_backtest(
    config_path: &PathBuf,
    data_dir: Option<&PathBuf>,
    output: Option<&PathBuf>,
) -> ExitCode {
    let (adapter, bt_config) = match prepare(config_path) {
        Ok(p) => p,
        Err(code) => return code,
    };

    // Stage 4: Resolve data source and report destination
    let data_port = CsvMarketDataAdapter::new(resolve_data_dir(data_dir, &adapter));
    let output_dir = resolve_output_dir(output, &adapter);
    let tickers = resolve_tickers(&adapter);

    // Stages 5-7: Load data, simulate, report
    let result = match run_backtest_pipeline(
        &data_port,
        &CsvReportAdapter::new(),
        &bt_config,
        tickers,
        &output_dir,
    ) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if adapter.get_bool("report", "console", true) {
        print!("{}", format_summary(&result));
    }
    eprintln!("\nReport written to: {}", output_dir.display());
    ExitCode::SUCCESS
}

pub fn run_backtest_pipeline(
    data_port: &dyn MarketDataPort,
    report_port: &dyn ReportPort,
    bt_config: &BacktestConfig,
    tickers: Option<Vec<String>>,
    output_dir: &Path,
) -> Result<BacktestResult, FactortraderError> {
    // Stage 5: Load market data
    let data = load_market_data(data_port, bt_config, tickers)?;

    // Stage 6: Simulate every strategy and the benchmark
    info!(
        strategies = bt_config.strategies.len(),
        rebalances = bt_config.rebalance_dates.len(),
        "running backtest"
    );
    let result = backtest_engine::run_backtest(&data, bt_config);

    // Stage 7: Write the report
    report_port.write(&result, output_dir)?;
    Ok(result)
}

pub fn format_summary(result: &BacktestResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== Results ===");
    let _ = writeln!(
        out,
        "{:<14} {:>12} {:>12} {:>9} {:>8} {:>8} {:>7} {:>9}",
        "Strategy", "Invested", "Final", "Return%", "CAGR%", "Vol%", "Sharpe", "MaxDD%"
    );
    for run in result.all_runs() {
        let m = &run.metrics;
        let _ = writeln!(
            out,
            "{:<14} {:>12.2} {:>12.2} {:>9.2} {:>8.2} {:>8.2} {:>7.2} {:>9.2}",
            run.name(),
            m.total_invested,
            m.final_value,
            m.total_return_pct,
            m.cagr_pct,
            m.volatility_pct,
            m.sharpe_ratio,
            m.max_drawdown_pct,
        );
    }

    let comparison = &result.comparison;
    out.push('\n');
    if let Some((name, cagr)) = &comparison.best_cagr {
        let _ = writeln!(out, "Best CAGR:   {} ({:.2}%)", name, cagr);
    }
    if let Some((name, sharpe)) = &comparison.best_sharpe {
        let _ = writeln!(out, "Best Sharpe: {} ({:.2})", name, sharpe);
    }
    if let Some(bench) = &result.benchmark {
        for (name, alpha) in &comparison.alphas {
            let _ = writeln!(out, "Alpha vs {}: {} {:+.2} pp", bench.name(), name, alpha);
        }
    }
    out
}

fn run_screen(
    config_path: &PathBuf,
    data_dir: Option<&PathBuf>,
    date: Option<NaiveDate>,
    policy: Option<&str>,
) -> ExitCode {
    let (adapter, mut bt_config) = match prepare(config_path) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let policies = match policy {
        Some(key) => match SelectionPolicy::from_key(key) {
            Some(p) => vec![p],
            None => {
                let e = FactortraderError::ConfigInvalid {
                    section: "cli".into(),
                    key: "policy".into(),
                    reason: format!("unknown strategy '{key}'"),
                };
                eprintln!("error: {e}");
                return (&e).into();
            }
        },
        None => bt_config.strategies.clone(),
    };

    bt_config.benchmark = None;
    let data_port = CsvMarketDataAdapter::new(resolve_data_dir(data_dir, &adapter));
    let data = match load_market_data(&data_port, &bt_config, resolve_tickers(&adapter)) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let date = match screen_date(date, &data) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for policy in policies {
        let candidates = screen(&data, &bt_config.selection, policy, date);
        println!("\n=== {} on {} ({} selected) ===", policy, date, candidates.len());
        print!("{}", format_candidates(&candidates));
    }
    ExitCode::SUCCESS
}

/// The requested date, or the last loaded trading date.
pub fn screen_date(requested: Option<NaiveDate>, data: &MarketData) -> Result<NaiveDate, FactortraderError> {
    requested
        .or_else(|| data.prices.last_date())
        .ok_or_else(|| FactortraderError::NoData {
            what: "trading dates".into(),
        })
}

/// Run one selector against loaded data at a single date.
pub fn screen(
    data: &MarketData,
    rules: &SelectionRules,
    policy: SelectionPolicy,
    date: NaiveDate,
) -> Vec<Candidate> {
    let estimator = PriceRatioEstimator::new(&data.prices, &data.snapshot);
    StockSelector::new(policy, &data.prices, &estimator, rules).select(date)
}

pub fn format_candidates(candidates: &[Candidate]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4} {:<8} {:>10} {:>8} {:>10} {:>9} {:>10} {:>6}",
        "#", "Ticker", "Price", "P/E", "MktCap($B)", "Momentum%", "Growth%", "Score"
    );
    let pct = |v: Option<f64>| v.map(|x| format!("{:.1}", x * 100.0)).unwrap_or_else(|| "-".into());
    for (i, c) in candidates.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4} {:<8} {:>10.2} {:>8.2} {:>10.1} {:>9} {:>10} {:>6}",
            i + 1,
            c.ticker,
            c.price,
            c.pe_ratio,
            c.market_cap / 1e9,
            pct(c.momentum),
            pct(c.earnings_growth),
            c.composite_score
                .map(|s| format!("{:.1}", s))
                .unwrap_or_else(|| "-".into()),
        );
    }
    out
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let (_, bt_config) = match prepare(config_path) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let strategies: Vec<&str> = bt_config.strategies.iter().map(|p| p.name()).collect();
    eprintln!("\nData range:      {} to {}", bt_config.data_start_date, bt_config.end_date);
    eprintln!("Rebalance dates: {}", bt_config.rebalance_dates.len());
    eprintln!("Contribution:    {:.2}", bt_config.contribution);
    eprintln!("Strategies:      {}", strategies.join(", "));
    eprintln!(
        "Benchmark:       {}",
        bt_config.benchmark.as_deref().unwrap_or("none")
    );
    eprintln!(
        "Selection:       top {}, min cap ${:.1}B, P/E < {} x cap($B), lookback {}",
        bt_config.selection.num_stocks,
        bt_config.selection.min_market_cap / 1e9,
        bt_config.selection.max_pe_multiple,
        bt_config.selection.momentum_lookback,
    );
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &PathBuf, data_dir: Option<&PathBuf>) -> ExitCode {
    let (adapter, bt_config) = match prepare(config_path) {
        Ok(p) => p,
        Err(code) => return code,
    };

    let data_port = CsvMarketDataAdapter::new(resolve_data_dir(data_dir, &adapter));
    let data = match load_market_data(&data_port, &bt_config, resolve_tickers(&adapter)) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    print!("{}", format_info(&data));

    if let Some(first) = bt_config.rebalance_dates.first() {
        if data.prices.last_date().is_some_and(|last| last < *first) {
            warn!(%first, "price data ends before the first rebalance date");
        }
    }
    ExitCode::SUCCESS
}

pub fn format_info(data: &MarketData) -> String {
    let mut out = String::new();
    match (data.prices.first_date(), data.prices.last_date()) {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                out,
                "prices: {} tickers, {} days, {} to {}",
                data.prices.ticker_count(),
                data.prices.len(),
                first,
                last
            );
        }
        _ => {
            let _ = writeln!(out, "prices: no data");
        }
    }
    let _ = writeln!(out, "fundamentals: {} tickers", data.snapshot.len());
    if let Some(bench) = &data.benchmark {
        match (bench.points().first(), bench.points().last()) {
            (Some((first, _)), Some((last, _))) => {
                let _ = writeln!(
                    out,
                    "benchmark {}: {} days, {} to {}",
                    bench.symbol,
                    bench.len(),
                    first,
                    last
                );
            }
            _ => {
                let _ = writeln!(out, "benchmark {}: no data", bench.symbol);
            }
        }
    }
    out
}

/// `[reconcile] primary` and `secondary`, defaulting to files in the data
/// directory. Command-line paths win.
pub fn resolve_eps_paths(
    primary: Option<&PathBuf>,
    secondary: Option<&PathBuf>,
    config: &dyn ConfigPort,
) -> (PathBuf, PathBuf) {
    let data_dir = resolve_data_dir(None, config);
    let resolve = |arg: Option<&PathBuf>, key: &str, default: &str| {
        arg.cloned()
            .or_else(|| config.get_string("reconcile", key).map(PathBuf::from))
            .unwrap_or_else(|| data_dir.join(default))
    };
    (
        resolve(primary, "primary", DEFAULT_PRIMARY_EPS_FILE),
        resolve(secondary, "secondary", DEFAULT_SECONDARY_EPS_FILE),
    )
}

fn run_reconcile(
    config_path: &PathBuf,
    primary: Option<&PathBuf>,
    secondary: Option<&PathBuf>,
    tolerance: Option<f64>,
) -> ExitCode {
    let report_err = |e: FactortraderError| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    };

    // Stage 1: Load config
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    start_logging(&adapter);

    // Stage 2: Validate
    if let Err(e) = validate_reconcile_config(&adapter) {
        return report_err(e);
    }
    let tolerance = match validate_tolerance(
        tolerance.unwrap_or_else(|| adapter.get_double("reconcile", "tolerance", DEFAULT_TOLERANCE)),
    ) {
        Ok(t) => t,
        Err(e) => return report_err(e),
    };

    // Stage 3: Resolve both sources
    let (primary_path, secondary_path) = resolve_eps_paths(primary, secondary, &adapter);
    let primary = CsvEarningsAdapter::new(primary_path);
    let secondary = CsvEarningsAdapter::new(secondary_path);
    info!(
        primary = %primary.path().display(),
        secondary = %secondary.path().display(),
        "resolved earnings sources"
    );

    // Stage 4: Compare and report
    let tickers = ticker_list(&adapter, "reconcile");
    let report = match run_reconcile_pipeline(&primary, &secondary, tickers, tolerance) {
        Ok(r) => r,
        Err(e) => return report_err(e),
    };
    print!("{}", format_reconciliation(&report));
    match reconciliation_verdict(&report) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_err(e),
    }
}

/// `tickers` defaults to every ticker the primary source lists.
pub fn run_reconcile_pipeline(
    primary: &dyn EarningsPort,
    secondary: &dyn EarningsPort,
    tickers: Option<Vec<String>>,
    tolerance: f64,
) -> Result<ReconciliationReport, FactortraderError> {
    let tickers = match tickers {
        Some(t) => t,
        None => primary.list_tickers()?,
    };
    info!(tickers = tickers.len(), tolerance, "reconciling EPS");
    reconcile::reconcile(primary, secondary, &tickers, tolerance)
}

/// A failing year or an empty comparison is an error.
pub fn reconciliation_verdict(report: &ReconciliationReport) -> Result<(), FactortraderError> {
    match report.verdict() {
        Verdict::Pass => Ok(()),
        Verdict::Fail => Err(FactortraderError::ReconciliationFailed {
            failed: report.failed(),
            total: report.total(),
        }),
        Verdict::Inconclusive => Err(FactortraderError::NoData {
            what: "overlapping EPS years".into(),
        }),
    }
}

pub fn format_reconciliation(report: &ReconciliationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n=== EPS reconciliation: {} vs {} (tolerance {:.1}%) ===",
        report.primary,
        report.secondary,
        report.tolerance * 100.0
    );
    for ticker in &report.tickers {
        let _ = writeln!(out, "\n{}:", ticker.ticker);
        match &ticker.outcome {
            TickerOutcome::Skipped(reason) => {
                let _ = writeln!(out, "  [SKIP] {}", reason);
            }
            TickerOutcome::Compared(years) => {
                for y in years {
                    let _ = writeln!(
                        out,
                        "  {}: {}=${:.2}, {}=${:.2}, diff={:.1}% [{}]",
                        y.year,
                        report.primary,
                        y.primary_eps,
                        report.secondary,
                        y.secondary_eps,
                        y.diff_pct,
                        y.status
                    );
                }
            }
        }
    }

    let total = report.total();
    let share = |n: usize| {
        if total == 0 {
            String::new()
        } else {
            format!(" ({:.1}%)", n as f64 / total as f64 * 100.0)
        }
    };
    let _ = writeln!(out, "\nTotal:   {}", total);
    let _ = writeln!(out, "Passed:  {}{}", report.passed(), share(report.passed()));
    let _ = writeln!(out, "Failed:  {}{}", report.failed(), share(report.failed()));
    let _ = writeln!(out, "Skipped: {} tickers", report.skipped());
    let _ = writeln!(out, "Verdict: {}", report.verdict());
    out
}
