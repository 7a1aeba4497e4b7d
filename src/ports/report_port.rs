//! Report generation port.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FactortraderError;
use std::path::Path;

/// Port for writing backtest results somewhere durable.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), FactortraderError>;
}
