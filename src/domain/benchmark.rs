//! Dollar-cost-averaged benchmark: buy one contribution's worth of the
//! benchmark symbol at each rebalance date and never sell.

use tracing::{info, warn};

use super::portfolio::PortfolioHistory;
use super::price_table::PriceSeries;
use super::simulator::{RebalanceEvent, SimulationConfig, SimulationResult};

pub fn run_benchmark(series: &PriceSeries, config: &SimulationConfig) -> SimulationResult {
    let name = series.symbol.clone();
    let mut history = PortfolioHistory::new();
    let mut rebalances = Vec::new();
    let mut shares = 0.0;
    let mut invested = 0.0;

    let Some(&first_rebalance) = config.rebalance_dates.first() else {
        return SimulationResult {
            name,
            history,
            rebalances,
        };
    };
    let mut pending = config.rebalance_dates.iter().copied().peekable();

    for &(date, price) in series.points().iter().filter(|(d, _)| *d >= first_rebalance) {
        if let Some(scheduled) = pending.next_if(|r| *r <= date) {
            if price > 0.0 {
                let bought = config.contribution / price;
                shares += bought;
                invested += config.contribution;
                info!(symbol = %name, %date, shares = bought, price, "benchmark purchase");
                rebalances.push(RebalanceEvent {
                    scheduled,
                    executed: date,
                    proceeds: 0.0,
                    selected: vec![name.clone()],
                    deployed: config.contribution,
                    idle_cash: 0.0,
                    total_invested: invested,
                });
            } else {
                warn!(symbol = %name, %date, price, "non-positive benchmark price, purchase skipped");
            }
        }
        history.record(date, shares * price, invested);
    }

    SimulationResult {
        name,
        history,
        rebalances,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn spy() -> PriceSeries {
        PriceSeries::new(
            "SPY",
            vec![
                (d(1, 1), 90.0),
                (d(1, 2), 100.0),
                (d(1, 3), 110.0),
                (d(2, 1), 200.0),
                (d(2, 2), 250.0),
            ],
        )
    }

    #[test]
    fn buys_and_holds_each_contribution() {
        let config = SimulationConfig {
            rebalance_dates: vec![d(1, 2), d(2, 1)],
            contribution: 1000.0,
        };
        let result = run_benchmark(&spy(), &config);

        assert_eq!(result.name, "SPY");
        assert_eq!(result.history.len(), 4);
        assert_relative_eq!(result.history.points()[0].value, 1000.0);
        assert_relative_eq!(result.history.points()[1].value, 1100.0);
        // 10 + 5 shares at 250
        assert_relative_eq!(result.history.last().unwrap().value, 3750.0);
        assert_relative_eq!(result.history.last().unwrap().invested, 2000.0);
        assert_eq!(result.rebalances.len(), 2);
    }

    #[test]
    fn weekend_rebalance_rolls_forward() {
        let config = SimulationConfig {
            rebalance_dates: vec![d(1, 2), d(1, 15)],
            contribution: 1000.0,
        };
        let result = run_benchmark(&spy(), &config);
        assert_eq!(result.rebalances[1].executed, d(2, 1));
    }

    #[test]
    fn empty_schedule_gives_empty_history() {
        let config = SimulationConfig {
            rebalance_dates: vec![],
            contribution: 1000.0,
        };
        assert!(run_benchmark(&spy(), &config).history.is_empty());
    }
}
