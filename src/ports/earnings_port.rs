//! Annual earnings access port.

use crate::domain::error::FactortraderError;
use crate::domain::reconcile::EpsByYear;

pub trait EarningsPort {
    /// Label used when reporting comparisons.
    fn source_name(&self) -> &str;

    /// Annual EPS for one ticker; empty when the source has none.
    fn fetch_eps(&self, ticker: &str) -> Result<EpsByYear, FactortraderError>;

    fn list_tickers(&self) -> Result<Vec<String>, FactortraderError>;
}
