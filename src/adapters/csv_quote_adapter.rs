//! CSV quote adapter: serves the quote port from a local directory.
//!
//! Expects `companies.csv` with `ticker,name,exchange,country,city` rows
//! and one `<TICKER>.csv` per instrument with
//! `date,open,high,low,last,close,volume` rows, dates as
//! `YYYY-MM-DD HH:MM`. Useful for offline ingestion and tests.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;

use crate::domain::error::TapesimError;
use crate::ports::quote_port::{CompanyProfile, PAGE_LIMIT, QuoteBar, QuotePage, QuotePort};

pub struct CsvQuoteAdapter {
    base_path: PathBuf,
}

impl CsvQuoteAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn bars_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    fn column<'a>(
        record: &'a csv::StringRecord,
        index: usize,
        name: &str,
    ) -> Result<&'a str, TapesimError> {
        record.get(index).ok_or_else(|| TapesimError::Provider {
            reason: format!("missing {name} column"),
        })
    }

    fn number(
        record: &csv::StringRecord,
        index: usize,
        name: &str,
    ) -> Result<f64, TapesimError> {
        Self::column(record, index, name)?
            .parse()
            .map_err(|e| TapesimError::Provider {
                reason: format!("invalid {name} value: {e}"),
            })
    }
}

impl QuotePort for CsvQuoteAdapter {
    fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, TapesimError> {
        let path = self.base_path.join("companies.csv");
        let mut reader =
            csv::Reader::from_path(&path).map_err(|e| TapesimError::Provider {
                reason: format!("failed to read {}: {e}", path.display()),
            })?;

        for result in reader.records() {
            let record = result.map_err(|e| TapesimError::Provider {
                reason: format!("CSV parse error: {e}"),
            })?;
            if Self::column(&record, 0, "ticker")? != ticker {
                continue;
            }
            return Ok(CompanyProfile {
                ticker: ticker.to_string(),
                name: Self::column(&record, 1, "name")?.to_string(),
                exchange: Self::column(&record, 2, "exchange")?.to_string(),
                exchange_country: Self::column(&record, 3, "country")?.to_string(),
                exchange_city: Self::column(&record, 4, "city")?.to_string(),
            });
        }

        Err(TapesimError::Provider {
            reason: format!("no company record for {ticker}"),
        })
    }

    fn intraday(
        &self,
        ticker: &str,
        _interval: &str,
        from: NaiveDate,
        to: NaiveDate,
        offset: usize,
    ) -> Result<QuotePage, TapesimError> {
        let path = self.bars_path(ticker);
        let mut reader =
            csv::Reader::from_path(&path).map_err(|e| TapesimError::Provider {
                reason: format!("failed to read {}: {e}", path.display()),
            })?;

        let mut bars = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| TapesimError::Provider {
                reason: format!("CSV parse error: {e}"),
            })?;

            let date_str = Self::column(&record, 0, "date")?;
            let stamp = NaiveDateTime::parse_from_str(date_str, "%Y-%m-%d %H:%M")
                .map_err(|e| TapesimError::Provider {
                    reason: format!("invalid date {date_str:?}: {e}"),
                })?;
            if stamp.date() < from || stamp.date() > to {
                continue;
            }

            bars.push(QuoteBar {
                time: stamp.and_utc().timestamp() as u64,
                open: Self::number(&record, 1, "open")?,
                high: Self::number(&record, 2, "high")?,
                low: Self::number(&record, 3, "low")?,
                last: Self::number(&record, 4, "last")?,
                close: Self::number(&record, 5, "close")?,
                volume: Self::number(&record, 6, "volume")?,
            });
        }
        bars.sort_by_key(|b| b.time);

        let page: Vec<QuoteBar> = bars
            .into_iter()
            .skip(offset)
            .take(PAGE_LIMIT)
            .collect();
        let count = page.len();
        Ok(QuotePage { bars: page, count })
    }
}
