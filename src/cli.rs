//! CLI definition and dispatch.

use chrono::{DateTime, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_quote_adapter::CsvQuoteAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::tape_file_adapter;
use crate::domain::entities::Datapoint;
use crate::domain::error::TapesimError;
use crate::domain::portfolio::Portfolio;
use crate::domain::replay::Replayer;
use crate::domain::store::{Id, Tape};
use crate::domain::strategy::Strategy;
use crate::domain::timeline::Stop;
use crate::ports::config_port::ConfigPort;
use crate::ports::quote_port::{PAGE_LIMIT, QuotePort};

#[derive(Parser, Debug)]
#[command(name = "tapesim", about = "Price tape recorder and replay backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a company's intraday bars into a year tape
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        year: i32,
        /// Read bars from a local CSV directory instead of the HTTP provider
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// Describe the contents of a tape file
    Info {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
    /// Replay a tape through the demo swing strategy
    Run {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        principal: Option<f64>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Fetch {
            config,
            ticker,
            year,
            csv_dir,
        } => run_fetch(&config, &ticker, year, csv_dir),
        Command::Info { file, ticker } => run_info(&file, ticker.as_deref()),
        Command::Run {
            file,
            ticker,
            config,
            principal,
        } => run_replay(&file, &ticker, config.as_ref(), principal),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TapesimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn format_time(time: u64) -> String {
    match DateTime::from_timestamp(time as i64, 0) {
        Some(stamp) => stamp.format("%Y-%m-%d %H:%M").to_string(),
        None => format!("@{time}"),
    }
}

/// Append a company's bars for one calendar year to a tape, paging through
/// the provider until a short page signals the range is exhausted.
pub fn ingest(
    tape: &mut Tape,
    port: &dyn QuotePort,
    ticker: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<usize, TapesimError> {
    let profile = port.company_profile(ticker)?;

    let exchange = if tape.registry.exists(&profile.exchange) {
        tape.registry.id_of(&profile.exchange)?
    } else {
        tape.new_exchange(
            &profile.exchange,
            &profile.exchange_country,
            &profile.exchange_city,
        )?
    };
    let company = tape.new_company(&profile.name, &profile.ticker, exchange)?;

    let mut offset = 0;
    let mut added = 0;
    loop {
        let page = port.intraday(ticker, "30min", from, to, offset)?;
        for bar in &page.bars {
            tape.new_datapoint(Datapoint::new(
                bar.open, bar.high, bar.low, bar.last, bar.close, bar.volume, bar.time, company,
            ))?;
            added += 1;
        }
        offset += page.count;
        if page.count < PAGE_LIMIT {
            break;
        }
    }
    Ok(added)
}

fn run_fetch(
    config_path: &PathBuf,
    ticker: &str,
    year: i32,
    csv_dir: Option<PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let data_dir = config
        .get_string("data", "dir")
        .unwrap_or_else(|| ".".to_string());
    let path = PathBuf::from(data_dir).join(format!("{year}.tape"));

    let mut tape = if path.exists() {
        match tape_file_adapter::load(&path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    } else {
        Tape::new()
    };

    if tape.find_ticker(ticker).is_some() {
        eprintln!("{ticker} is already recorded in {}", path.display());
        return ExitCode::SUCCESS;
    }

    let (Some(from), Some(to)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        eprintln!("error: invalid year {year}");
        return ExitCode::from(2);
    };

    let port: Box<dyn QuotePort> = match csv_dir {
        Some(dir) => Box::new(CsvQuoteAdapter::new(dir)),
        None => {
            #[cfg(feature = "fetch")]
            {
                use crate::adapters::marketstack_adapter::MarketstackAdapter;
                match MarketstackAdapter::from_config(&config) {
                    Ok(a) => Box::new(a),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return (&e).into();
                    }
                }
            }
            #[cfg(not(feature = "fetch"))]
            {
                eprintln!("error: the fetch feature is required without --csv-dir");
                return ExitCode::from(1);
            }
        }
    };

    eprintln!("Fetching {ticker} bars for {year}...");
    match ingest(&mut tape, &*port, ticker, from, to) {
        Ok(added) => eprintln!("  {added} bars recorded"),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    match tape_file_adapter::write(&tape, &path) {
        Ok(()) => {
            eprintln!("Tape written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_info(file: &PathBuf, ticker_filter: Option<&str>) -> ExitCode {
    let tape = match tape_file_adapter::load(file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let listing = || -> Result<(), TapesimError> {
        if ticker_filter.is_none() {
            for &id in &tape.exchanges {
                let exchange = tape.exchange(id)?;
                println!(
                    "{} ({}, {})",
                    exchange.name, exchange.city, exchange.country
                );
            }
        }
        for &id in &tape.companies {
            let company = tape.company(id)?;
            if let Some(filter) = ticker_filter {
                if company.ticker != filter {
                    continue;
                }
            }
            let series = tape.series_of(id);
            let mut times = Vec::with_capacity(series.len());
            for &dp in series {
                times.push(tape.datapoint(dp)?.time);
            }
            times.sort_unstable();
            match (times.first(), times.last()) {
                (Some(&first), Some(&last)) => println!(
                    "{} ({}): {} bars, {} to {}",
                    company.name,
                    company.ticker,
                    times.len(),
                    format_time(first),
                    format_time(last),
                ),
                _ => println!("{} ({}): no bars", company.name, company.ticker),
            }
        }
        Ok(())
    };

    match listing() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_replay(
    file: &PathBuf,
    ticker: &str,
    config_path: Option<&PathBuf>,
    principal_override: Option<f64>,
) -> ExitCode {
    let principal = match principal_override {
        Some(p) => p,
        None => match config_path {
            Some(path) => match load_config(path) {
                Ok(config) => config.get_double("replay", "principal", 1000.0),
                Err(code) => return code,
            },
            None => 1000.0,
        },
    };

    let tape = match tape_file_adapter::load(file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let Some(company) = tape.find_ticker(ticker) else {
        eprintln!("error: no company with ticker {ticker} in {}", file.display());
        return ExitCode::from(5);
    };

    let replayer = match Replayer::new(&tape, principal) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!(
        "Replaying {} stops with ${principal:.2} principal",
        replayer.stops().len()
    );

    let mut strategy = SwingStrategy::new(company, ticker.to_string());
    let portfolio = replayer.run(&mut strategy);

    let value = portfolio.total_value();
    let change = (value - principal) / principal * 100.0;
    eprintln!("\n=== Results ===");
    eprintln!("Trades:          {} buys, {} sells", strategy.buys, strategy.sells);
    eprintln!("Open holdings:   {}", portfolio.holdings.len());
    eprintln!("Final value:     ${value:.2} ({change:+.2}%)");
    ExitCode::SUCCESS
}

/// Demo momentum strategy: buys one unit of its target company when its
/// price turns upward, and sells the best-performing holding once it is up
/// more than 10%.
struct SwingStrategy {
    company: Id,
    ticker: String,
    last_price: Option<f64>,
    rising: bool,
    buys: usize,
    sells: usize,
}

impl SwingStrategy {
    fn new(company: Id, ticker: String) -> Self {
        Self {
            company,
            ticker,
            last_price: None,
            rising: false,
            buys: 0,
            sells: 0,
        }
    }

    fn best_holding(portfolio: &Portfolio) -> Option<(usize, f64)> {
        portfolio
            .holdings
            .iter()
            .enumerate()
            .map(|(i, h)| (i, (h.current_value - h.bought.price) / h.bought.price))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl Strategy for SwingStrategy {
    fn step(&mut self, history: &[Stop], current: &Stop, portfolio: &mut Portfolio) {
        let Some(price) = current.price_of(self.company) else {
            return;
        };
        if history.is_empty() {
            self.last_price = Some(price);
            return;
        }

        if let Some(last) = self.last_price {
            if last < price && !self.rising {
                self.rising = true;
                if portfolio.buy(self.company, current) {
                    self.buys += 1;
                    eprintln!(
                        "bought {} on {} for ${price:.2}",
                        self.ticker,
                        format_time(current.time)
                    );
                }
            } else if last > price && self.rising {
                self.rising = false;
                if let Some((index, gain)) = Self::best_holding(portfolio) {
                    if gain > 0.1 && portfolio.sell(index) {
                        self.sells += 1;
                        eprintln!(
                            "sold {} on {} for ${price:.2}",
                            self.ticker,
                            format_time(current.time)
                        );
                    }
                }
            }
        }
        self.last_price = Some(price);
    }
}
