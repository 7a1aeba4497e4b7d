//! Core domain types and logic.

pub mod price_table;
pub mod fundamentals;
pub mod estimator;
pub mod momentum;
pub mod selector;
pub mod portfolio;
pub mod simulator;
pub mod benchmark;
pub mod metrics;
pub mod comparison;
pub mod reconcile;
pub mod market_data;
pub mod backtest;
pub mod config_validation;
pub mod error;
