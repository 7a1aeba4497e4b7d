//! Port traits: the boundaries to configuration, market data, earnings and reports.

pub mod config_port;
pub mod data_port;
pub mod earnings_port;
pub mod report_port;
