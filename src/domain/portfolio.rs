//! Cash and holdings bookkeeping for a replay.
//!
//! Rejected trades are reported as `false`, never as errors: a strategy is
//! free to attempt a buy it cannot afford.

use crate::domain::store::Id;
use crate::domain::timeline::{Stop, Timepoint};

/// One unit of a company, held at the price it was bought for.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub company: Id,
    pub bought: Timepoint,
    pub current_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            holdings: Vec::new(),
        }
    }

    /// Buy one unit of `company` at its price in `stop`.
    ///
    /// Fails when the company has no price in the stop or when cash cannot
    /// cover the price; cash is untouched on failure.
    pub fn buy(&mut self, company: Id, stop: &Stop) -> bool {
        let Some(point) = stop.points.get(&company) else {
            return false;
        };
        if point.price > self.cash {
            return false;
        }
        self.cash -= point.price;
        self.holdings.push(Holding {
            company,
            bought: *point,
            current_value: point.price,
        });
        true
    }

    /// Sell the holding at `index`, crediting its mark-to-market value.
    pub fn sell(&mut self, index: usize) -> bool {
        if index >= self.holdings.len() {
            return false;
        }
        let holding = self.holdings.remove(index);
        self.cash += holding.current_value;
        true
    }

    /// Refresh every holding to the current stop's price for its company.
    pub fn mark_to_market(&mut self, stop: &Stop) {
        for holding in &mut self.holdings {
            if let Some(point) = stop.points.get(&holding.company) {
                holding.current_value = point.price;
            }
        }
    }

    /// Cash plus the mark-to-market value of all holdings.
    pub fn total_value(&self) -> f64 {
        self.cash + self.holdings.iter().map(|h| h.current_value).sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::domain::entities::{Company, Exchange};
    use crate::domain::store::Registry;

    fn company_id() -> Id {
        let mut registry = Registry::new();
        let exchange = registry.add_exchange(Exchange {
            name: "XNAS".into(),
            country: "USA".into(),
            city: "New York".into(),
        });
        registry.add_company(Company::new("Acme".into(), "ACME".into(), exchange))
    }

    fn stop_with(prices: &[(Id, f64)], time: u64) -> Stop {
        let points: HashMap<Id, Timepoint> = prices
            .iter()
            .map(|&(id, price)| (id, Timepoint { time, price }))
            .collect();
        Stop { time, points }
    }

    #[test]
    fn buy_debits_cash_and_records_holding() {
        let company = company_id();
        let mut portfolio = Portfolio::new(100.0);
        let stop = stop_with(&[(company, 40.0)], 10);

        assert!(portfolio.buy(company, &stop));
        assert!((portfolio.cash - 60.0).abs() < f64::EPSILON);
        assert_eq!(portfolio.holdings.len(), 1);
        assert_eq!(portfolio.holdings[0].bought.time, 10);
        assert!((portfolio.total_value() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buy_rejects_unpriced_company() {
        let mut registry = Registry::new();
        let exchange = registry.add_exchange(Exchange {
            name: "XNAS".into(),
            country: "USA".into(),
            city: "New York".into(),
        });
        let company = registry.add_company(Company::new("Acme".into(), "ACME".into(), exchange));
        let other = registry.add_company(Company::new("Bolt".into(), "BOLT".into(), exchange));
        let mut portfolio = Portfolio::new(100.0);
        let stop = stop_with(&[(other, 40.0)], 10);

        assert!(!portfolio.buy(company, &stop));
        assert!((portfolio.cash - 100.0).abs() < f64::EPSILON);
        assert!(portfolio.holdings.is_empty());
    }

    #[test]
    fn buy_rejects_unaffordable_price() {
        let company = company_id();
        let mut portfolio = Portfolio::new(30.0);
        let stop = stop_with(&[(company, 40.0)], 10);

        assert!(!portfolio.buy(company, &stop));
        assert!((portfolio.cash - 30.0).abs() < f64::EPSILON);
        assert!(portfolio.holdings.is_empty());
    }

    #[test]
    fn sell_credits_marked_value() {
        let company = company_id();
        let mut portfolio = Portfolio::new(100.0);
        portfolio.buy(company, &stop_with(&[(company, 40.0)], 10));
        portfolio.mark_to_market(&stop_with(&[(company, 55.0)], 20));

        assert!(portfolio.sell(0));
        assert!((portfolio.cash - 115.0).abs() < f64::EPSILON);
        assert!(portfolio.holdings.is_empty());
    }

    #[test]
    fn sell_out_of_range_is_rejected() {
        let mut portfolio = Portfolio::new(100.0);
        assert!(!portfolio.sell(0));
        assert!((portfolio.cash - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mark_to_market_tracks_the_current_stop() {
        let company = company_id();
        let mut portfolio = Portfolio::new(100.0);
        portfolio.buy(company, &stop_with(&[(company, 40.0)], 10));

        portfolio.mark_to_market(&stop_with(&[(company, 25.0)], 20));
        assert!((portfolio.holdings[0].current_value - 25.0).abs() < f64::EPSILON);
        assert!((portfolio.total_value() - 85.0).abs() < f64::EPSILON);
        // the entry price is untouched
        assert!((portfolio.holdings[0].bought.price - 40.0).abs() < f64::EPSILON);
    }
}
