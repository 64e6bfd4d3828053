//! CLI definition and dispatch.

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::account::Account;
use crate::domain::bar::{Bar, Frequency};
use crate::domain::error::LedgerError;
use crate::domain::order::Direction;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "quantledger", about = "Backtesting account ledger and bar warehouse")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query bars for code(s) over a time range
    Query {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated instrument codes; omit for all
        #[arg(long)]
        codes: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = "daily")]
        frequency: String,
        #[arg(long, default_value = "jqdata")]
        source: String,
    },
    /// Print the most recent N bars per code
    Last {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        #[arg(long)]
        codes: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = "daily")]
        frequency: String,
        #[arg(long, default_value = "jqdata")]
        source: String,
    },
    /// Show data range for code(s) in the warehouse
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        codes: Option<String>,
        #[arg(long, default_value = "daily")]
        frequency: String,
        #[arg(long, default_value = "jqdata")]
        source: String,
    },
    /// Import CSV bar files into the warehouse
    Import {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding {code}_{frequency}.csv files
        #[arg(short, long)]
        path: PathBuf,
        #[arg(long, default_value = "daily")]
        frequency: String,
        #[arg(long, default_value = "jqdata")]
        source: String,
    },
    /// Replay daily bars for one code through a fresh account
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = "jqdata")]
        source: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Query {
            config,
            codes,
            start,
            end,
            frequency,
            source,
        } => run_query(
            &config,
            codes.as_deref(),
            start.as_deref(),
            end.as_deref(),
            &frequency,
            &source,
        ),
        Command::Last {
            config,
            count,
            codes,
            end,
            frequency,
            source,
        } => run_last(
            &config,
            count,
            codes.as_deref(),
            end.as_deref(),
            &frequency,
            &source,
        ),
        Command::Info {
            config,
            codes,
            frequency,
            source,
        } => run_info(&config, codes.as_deref(), &frequency, &source),
        Command::Import {
            config,
            path,
            frequency,
            source,
        } => run_import(&config, &path, &frequency, &source),
        Command::Replay {
            config,
            code,
            end,
            source,
        } => run_replay(&config, &code, end.as_deref(), &source),
    }
}

/// Typed view of the config file the commands share.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub start_date: NaiveDate,
    pub init_cash: f64,
}

pub fn build_ledger_config(adapter: &dyn ConfigPort) -> Result<LedgerConfig, LedgerError> {
    let start_str = adapter
        .get_string("backtest", "start_date")
        .ok_or_else(|| LedgerError::ConfigMissing {
            section: "backtest".into(),
            key: "start_date".into(),
        })?;
    let start_date = NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
        LedgerError::ConfigInvalid {
            section: "backtest".into(),
            key: "start_date".into(),
            reason: "invalid date format (expected YYYY-MM-DD)".into(),
        }
    })?;

    let init_cash = adapter.get_double("backtest", "init_cash", 100_000.0);
    if init_cash <= 0.0 {
        return Err(LedgerError::ConfigInvalid {
            section: "backtest".into(),
            key: "init_cash".into(),
            reason: "must be positive".into(),
        });
    }

    Ok(LedgerConfig {
        start_date,
        init_cash,
    })
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::load_or_create(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Accepts `YYYY-MM-DD` (expanded to start or end of day) or a full
/// `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn parse_datetime(input: &str, end_of_day: bool) -> Result<NaiveDateTime, String> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        return Ok(time.unwrap());
    }
    Err(format!(
        "invalid datetime {input:?} (expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)"
    ))
}

pub fn parse_codes(codes: Option<&str>) -> Vec<String> {
    codes
        .map(|s| {
            s.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_frequency(label: &str) -> Result<Frequency, ExitCode> {
    label.parse::<Frequency>().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(1)
    })
}

fn print_bars(bars: &[Bar]) {
    for bar in bars {
        println!(
            "{},{},{},{},{},{},{},{}",
            bar.code, bar.datetime, bar.open, bar.high, bar.low, bar.close, bar.volume, bar.amount
        );
    }
    eprintln!("{} bars", bars.len());
}

fn run_query(
    config_path: &PathBuf,
    codes: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
    frequency: &str,
    source: &str,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let frequency = match parse_frequency(frequency) {
        Ok(f) => f,
        Err(code) => return code,
    };

    let ledger_config = match build_ledger_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let start = match start {
        Some(s) => match parse_datetime(s, false) {
            Ok(dt) => dt,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        },
        None => ledger_config.start_date.and_hms_opt(0, 0, 0).unwrap(),
    };
    let end = match end {
        Some(s) => match parse_datetime(s, true) {
            Ok(dt) => dt,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        },
        None => NaiveDate::from_ymd_opt(9999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap(),
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::data_port::MarketDataPort;

        let adapter = match SqliteAdapter::from_config(&config) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        match adapter.query_bars(&parse_codes(codes), start, end, frequency, source) {
            Ok(bars) => {
                print_bars(&bars);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, ledger_config, codes, start, end, frequency, source);
        eprintln!("error: sqlite feature is required for query");
        ExitCode::from(1)
    }
}

fn run_last(
    config_path: &PathBuf,
    count: usize,
    codes: Option<&str>,
    end: Option<&str>,
    frequency: &str,
    source: &str,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let frequency = match parse_frequency(frequency) {
        Ok(f) => f,
        Err(code) => return code,
    };

    let end = match end {
        Some(s) => match parse_datetime(s, true) {
            Ok(dt) => dt,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        },
        None => NaiveDate::from_ymd_opt(9999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap(),
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::data_port::MarketDataPort;

        let adapter = match SqliteAdapter::from_config(&config) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        match adapter.query_last_bars(count, &parse_codes(codes), end, frequency, source) {
            Ok(bars) => {
                print_bars(&bars);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, count, codes, end, frequency, source);
        eprintln!("error: sqlite feature is required for last");
        ExitCode::from(1)
    }
}

fn run_info(
    config_path: &PathBuf,
    codes: Option<&str>,
    frequency: &str,
    source: &str,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let frequency = match parse_frequency(frequency) {
        Ok(f) => f,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::data_port::MarketDataPort;

        let adapter = match SqliteAdapter::from_config(&config) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let codes = parse_codes(codes);
        let codes = if codes.is_empty() {
            match adapter.list_codes(frequency, source) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            }
        } else {
            codes
        };

        for code in &codes {
            match adapter.data_range(code, frequency, source) {
                Ok(Some((min, max, count))) => {
                    println!("{}: {} bars, {} to {}", code, count, min, max);
                }
                Ok(None) => {
                    eprintln!("{}: no data found", code);
                }
                Err(e) => {
                    eprintln!("error querying {}: {}", code, e);
                }
            }
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, codes, frequency, source);
        eprintln!("error: sqlite feature is required for info");
        ExitCode::from(1)
    }
}

fn run_import(
    config_path: &PathBuf,
    path: &PathBuf,
    frequency: &str,
    source: &str,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let frequency = match parse_frequency(frequency) {
        Ok(f) => f,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::CsvAdapter;
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::data_port::MarketDataPort;

        let csv = CsvAdapter::new(path.clone());
        let warehouse = match SqliteAdapter::from_config(&config) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        if let Err(e) = warehouse.initialize_schema() {
            eprintln!("error: {e}");
            return (&e).into();
        }

        let codes = match csv.list_codes(frequency) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        if codes.is_empty() {
            eprintln!("error: no {frequency} bar files under {}", path.display());
            return ExitCode::from(1);
        }

        let mut total = 0;
        for code in &codes {
            let min_dt = NaiveDate::from_ymd_opt(1970, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            let max_dt = NaiveDate::from_ymd_opt(9999, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap();
            let bars = match csv.query_bars(
                &[code.clone()],
                min_dt,
                max_dt,
                frequency,
                source,
            ) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("warning: skipping {} ({})", code, e);
                    continue;
                }
            };
            match warehouse.insert_bars(&bars, frequency, source) {
                Ok(n) => {
                    eprintln!("{}: imported {} bars", code, n);
                    total += n;
                }
                Err(e) => {
                    eprintln!("warning: skipping {} ({})", code, e);
                }
            }
        }
        eprintln!("imported {} bars total", total);
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, path, frequency, source);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

fn run_replay(
    config_path: &PathBuf,
    code: &str,
    end: Option<&str>,
    source: &str,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let ledger_config = match build_ledger_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let end = match end {
        Some(s) => match parse_datetime(s, true) {
            Ok(dt) => dt,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        },
        None => NaiveDate::from_ymd_opt(9999, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap(),
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        use crate::ports::data_port::MarketDataPort;

        let adapter = match SqliteAdapter::from_config(&config) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let start = ledger_config.start_date.and_hms_opt(0, 0, 0).unwrap();
        let bars = match adapter.query_bars(
            &[code.to_string()],
            start,
            end,
            Frequency::Daily,
            source,
        ) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        eprintln!(
            "Replaying {} daily bars for {} from {}",
            bars.len(),
            code,
            ledger_config.start_date
        );

        match replay_bars(ledger_config.init_cash, code, &bars) {
            Ok(account) => {
                print_account_summary(&account);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, ledger_config, code, end, source);
        eprintln!("error: sqlite feature is required for replay");
        ExitCode::from(1)
    }
}

/// Drive a fresh account through a daily bar series: buy whole board
/// lots on the first close, hold, mark to market on every close, and
/// settle at each day boundary. Profit shows up as float profit.
pub fn replay_bars(init_cash: f64, code: &str, bars: &[Bar]) -> Result<Account, LedgerError> {
    if bars.is_empty() {
        return Err(LedgerError::NoData {
            code: code.to_string(),
            frequency: Frequency::Daily.to_string(),
        });
    }

    let mut account = Account::new(init_cash);

    for (i, bar) in bars.iter().enumerate() {
        let price = bar.last_price();
        account.on_price_change(code, price);

        if i == 0 {
            let lots = ((account.available_cash / price) as i64) / 100;
            if lots > 0 {
                let order = account.submit_order(
                    code,
                    lots * 100,
                    price,
                    Direction::Buy,
                    None,
                    Some(bar.datetime),
                )?;
                account.apply_deal(&order)?;
            }
        }

        // Daily bars: every bar closes a trading day.
        account.settle();
    }

    Ok(account)
}

fn print_account_summary(account: &Account) {
    eprintln!("\n=== Account Summary ===");
    eprintln!("Initial Cash:   {:.2}", account.init_cash);
    eprintln!("Available Cash: {:.2}", account.available_cash);
    eprintln!("Frozen Cash:    {:.2}", account.frozen_cash());
    eprintln!("Market Value:   {:.2}", account.total_market_value());
    eprintln!("Total Assets:   {:.2}", account.total_assets());
    eprintln!("Float Profit:   {:.2}", account.float_profit());
    eprintln!("Profit Ratio:   {:.2}%", account.profit_ratio());
    eprintln!("Orders:         {}", account.orders.len());
}
