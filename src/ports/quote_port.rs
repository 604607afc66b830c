//! Quote provider port trait.
//!
//! Abstracts the reference-data and intraday-bar source used during
//! ingestion: company metadata by ticker, and price bars by date range,
//! delivered in pages of at most [`PAGE_LIMIT`] rows.

use chrono::NaiveDate;

use crate::domain::error::TapesimError;

/// Rows per page a provider returns at most; a shorter page means the
/// range is exhausted.
pub const PAGE_LIMIT: usize = 1000;

/// Company metadata as the provider reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyProfile {
    pub name: String,
    pub ticker: String,
    pub exchange: String,
    pub exchange_country: String,
    pub exchange_city: String,
}

/// One intraday bar. `time` is seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteBar {
    pub time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub last: f64,
    pub close: f64,
    pub volume: f64,
}

/// One page of intraday bars. `count` is the provider-reported row count
/// for the page, which may exceed `bars.len()` when rows were dropped for
/// being malformed; pagination advances by `count`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotePage {
    pub bars: Vec<QuoteBar>,
    pub count: usize,
}

pub trait QuotePort {
    fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, TapesimError>;

    fn intraday(
        &self,
        ticker: &str,
        interval: &str,
        from: NaiveDate,
        to: NaiveDate,
        offset: usize,
    ) -> Result<QuotePage, TapesimError>;
}
