//! Rebalancing portfolio simulation.
//!
//! A single pass over the trading dates from the first rebalance date on.
//! When the next pending rebalance date has been reached, holdings are
//! liquidated at that day's prices, the periodic contribution is added, and
//! the cash is split equally across the selector's picks. Every trading
//! date then records `holdings value + cash`. At most one rebalance is
//! consumed per trading date, strictly in schedule order.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::portfolio::{Portfolio, PortfolioHistory};
use super::price_table::PriceTable;
use super::selector::Selector;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub rebalance_dates: Vec<NaiveDate>,
    pub contribution: f64,
}

/// What happened at one rebalance.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceEvent {
    pub scheduled: NaiveDate,
    pub executed: NaiveDate,
    pub proceeds: f64,
    pub selected: Vec<String>,
    pub deployed: f64,
    pub idle_cash: f64,
    pub total_invested: f64,
}

impl RebalanceEvent {
    pub fn is_idle(&self) -> bool {
        self.selected.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub name: String,
    pub history: PortfolioHistory,
    pub rebalances: Vec<RebalanceEvent>,
}

pub fn run_simulation(
    prices: &PriceTable,
    selector: &dyn Selector,
    config: &SimulationConfig,
) -> SimulationResult {
    let name = selector.name().to_string();
    let mut portfolio = Portfolio::new();
    let mut history = PortfolioHistory::new();
    let mut rebalances = Vec::with_capacity(config.rebalance_dates.len());

    let Some(&first_rebalance) = config.rebalance_dates.first() else {
        warn!(strategy = %name, "no rebalance dates configured");
        return SimulationResult {
            name,
            history,
            rebalances,
        };
    };

    let mut pending = config.rebalance_dates.iter().copied().peekable();

    for &date in prices.dates().iter().filter(|d| **d >= first_rebalance) {
        if let Some(scheduled) = pending.next_if(|r| *r <= date) {
            let event = rebalance(&mut portfolio, prices, selector, config, scheduled, date);
            if event.is_idle() {
                warn!(strategy = %name, %date, cash = event.idle_cash, "no stocks selected");
            } else {
                info!(
                    strategy = %name,
                    %date,
                    stocks = event.selected.len(),
                    invested = event.total_invested,
                    "rebalanced"
                );
            }
            rebalances.push(event);
        }

        history.record(
            date,
            portfolio.total_value(prices, date),
            portfolio.total_invested,
        );
    }

    if pending.peek().is_some() {
        warn!(
            strategy = %name,
            remaining = pending.count(),
            "rebalance dates after the last trading date were not processed"
        );
    }

    SimulationResult {
        name,
        history,
        rebalances,
    }
}

fn rebalance(
    portfolio: &mut Portfolio,
    prices: &PriceTable,
    selector: &dyn Selector,
    config: &SimulationConfig,
    scheduled: NaiveDate,
    date: NaiveDate,
) -> RebalanceEvent {
    let proceeds = portfolio.liquidate(prices, date);
    portfolio.deposit(config.contribution);

    let picks = selector.select(date);
    let deployed = portfolio.buy_equal_weight(&picks);
    let selected = picks
        .iter()
        .filter(|c| c.price > 0.0)
        .map(|c| c.ticker.clone())
        .collect();

    RebalanceEvent {
        scheduled,
        executed: date,
        proceeds,
        selected,
        deployed,
        idle_cash: portfolio.cash,
        total_invested: portfolio.total_invested,
    }
}
