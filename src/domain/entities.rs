//! Domain records: exchanges, companies and price observations.
//!
//! Entities never hold pointers to each other; cross-references are [`Id`]s
//! into the [`Registry`](crate::domain::store::Registry) that owns them.

use crate::domain::store::Id;

/// A stock exchange, created once per distinct market.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub name: String,
    pub country: String,
    pub city: String,
}

/// A listed company. The exchange reference is set at creation and is
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub name: String,
    pub ticker: String,
    exchange: Id,
}

impl Company {
    pub fn new(name: String, ticker: String, exchange: Id) -> Self {
        Self {
            name,
            ticker,
            exchange,
        }
    }

    pub fn exchange_id(&self) -> Id {
        self.exchange
    }
}

/// One intraday price observation for a company.
///
/// `time` is seconds since the Unix epoch. Observations are logically a
/// time-ordered sequence per company, but insertion order is arbitrary;
/// consumers sort before use.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub last: f64,
    pub close: f64,
    pub volume: f64,
    pub time: u64,
    company: Id,
}

impl Datapoint {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        open: f64,
        high: f64,
        low: f64,
        last: f64,
        close: f64,
        volume: f64,
        time: u64,
        company: Id,
    ) -> Self {
        Self {
            open,
            high,
            low,
            last,
            close,
            volume,
            time,
            company,
        }
    }

    pub fn company_id(&self) -> Id {
        self.company
    }

    /// (open + close) / 2, the observed price the replay engine works with.
    pub fn midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }
}
