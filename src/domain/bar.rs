//! Price bar representation supplied by the market-data port.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// Bar frequency label used by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Minute,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Minute => write!(f, "minute"),
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Frequency::Daily),
            "minute" | "min" | "1min" => Ok(Frequency::Minute),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub code: String,
    pub datetime: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub amount: f64,
}

impl Bar {
    /// The only field the ledger core consumes: the latest trade price.
    pub fn last_price(&self) -> f64 {
        self.close
    }
}
