//! HTTP quote adapter for a marketstack-style REST API.
//!
//! Blocking GETs against `/tickers/{ticker}` and `/intraday`. Bars with
//! missing or mistyped fields are skipped rather than failing the page, so
//! one bad row cannot abort an ingestion run.

use chrono::DateTime;
use serde::Deserialize;

use crate::domain::error::TapesimError;
use crate::ports::config_port::ConfigPort;
use crate::ports::quote_port::{CompanyProfile, PAGE_LIMIT, QuoteBar, QuotePage, QuotePort};

pub const DEFAULT_BASE_URL: &str = "https://api.marketstack.com/v1";

pub struct MarketstackAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
    access_key: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    name: Option<String>,
    symbol: Option<String>,
    stock_exchange: Option<StockExchange>,
}

#[derive(Debug, Deserialize)]
struct StockExchange {
    acronym: Option<String>,
    country: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IntradayResponse {
    pagination: Pagination,
    data: Vec<RawBar>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    date: Option<String>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    last: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

impl RawBar {
    /// A bar survives only with a parseable date and every price present.
    fn into_quote_bar(self) -> Option<QuoteBar> {
        let stamp = parse_stamp(self.date.as_deref()?)?;
        Some(QuoteBar {
            time: stamp,
            open: self.open?,
            high: self.high?,
            low: self.low?,
            last: self.last?,
            close: self.close?,
            // volume is absent from some plans; treat it as zero
            volume: self.volume.unwrap_or(0.0),
        })
    }
}

fn parse_stamp(date: &str) -> Option<u64> {
    let parsed = DateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%z").ok()?;
    u64::try_from(parsed.timestamp()).ok()
}

impl MarketstackAdapter {
    pub fn new(base_url: String, access_key: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url,
            access_key,
        }
    }

    /// Read `[api] access_key` (required) and `[api] base_url` (optional)
    /// from configuration.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TapesimError> {
        let access_key = config.get_string("api", "access_key").ok_or_else(|| {
            TapesimError::ConfigMissing {
                section: "api".into(),
                key: "access_key".into(),
            }
        })?;
        let base_url = config
            .get_string("api", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(base_url, access_key))
    }

    fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, TapesimError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TapesimError::Provider {
                reason: format!("request failed: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(TapesimError::Provider {
                reason: format!("HTTP {} from provider", response.status()),
            });
        }
        response.json().map_err(|e| TapesimError::Provider {
            reason: format!("bad JSON from provider: {e}"),
        })
    }
}

impl QuotePort for MarketstackAdapter {
    fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, TapesimError> {
        let url = format!(
            "{}/tickers/{}?access_key={}",
            self.base_url, ticker, self.access_key
        );
        let response: TickerResponse = self.get(&url)?;

        let missing = |field: &str| TapesimError::Provider {
            reason: format!("ticker response for {ticker} lacks {field}"),
        };
        let exchange = response.stock_exchange.ok_or_else(|| missing("stock_exchange"))?;
        Ok(CompanyProfile {
            name: response.name.ok_or_else(|| missing("name"))?,
            ticker: response.symbol.ok_or_else(|| missing("symbol"))?,
            exchange: exchange.acronym.ok_or_else(|| missing("acronym"))?,
            exchange_country: exchange.country.unwrap_or_default(),
            exchange_city: exchange.city.unwrap_or_default(),
        })
    }

    fn intraday(
        &self,
        ticker: &str,
        interval: &str,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
        offset: usize,
    ) -> Result<QuotePage, TapesimError> {
        let url = format!(
            "{}/intraday?access_key={}&symbols={}&interval={}&date_from={}&date_to={}&limit={}&offset={}",
            self.base_url, self.access_key, ticker, interval, from, to, PAGE_LIMIT, offset
        );
        let response: IntradayResponse = self.get(&url)?;

        let count = response.pagination.count;
        let bars = response
            .data
            .into_iter()
            .filter_map(RawBar::into_quote_bar)
            .collect();
        Ok(QuotePage { bars, count })
    }
}
