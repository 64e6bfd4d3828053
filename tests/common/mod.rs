#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
pub use quantledger::domain::bar::{Bar, Frequency};
use quantledger::domain::error::LedgerError;
use quantledger::ports::data_port::MarketDataPort;
use std::collections::HashMap;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn dt(date_str: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(15, 0, 0)
        .unwrap()
}

pub fn make_bar(code: &str, date_str: &str, close: f64) -> Bar {
    Bar {
        code: code.to_string(),
        datetime: dt(date_str),
        open: close - 0.5,
        high: close + 0.5,
        low: close - 1.0,
        close,
        volume: 10_000,
        amount: close * 10_000.0,
    }
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    fn codes_or_all(&self, codes: &[String]) -> Vec<String> {
        if codes.is_empty() {
            let mut all: Vec<String> = self.data.keys().cloned().collect();
            all.sort();
            all
        } else {
            codes.to_vec()
        }
    }

    fn bars_for(&self, code: &str) -> Result<Vec<Bar>, LedgerError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(LedgerError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(code).cloned().unwrap_or_default())
    }
}

impl MarketDataPort for MockDataPort {
    fn query_bars(
        &self,
        codes: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
        _frequency: Frequency,
        _source: &str,
    ) -> Result<Vec<Bar>, LedgerError> {
        let mut result = Vec::new();
        for code in self.codes_or_all(codes) {
            result.extend(
                self.bars_for(&code)?
                    .into_iter()
                    .filter(|b| b.datetime >= start && b.datetime <= end),
            );
        }
        result.sort_by(|a, b| (a.datetime, a.code.clone()).cmp(&(b.datetime, b.code.clone())));
        Ok(result)
    }

    fn query_last_bars(
        &self,
        count: usize,
        codes: &[String],
        end: NaiveDateTime,
        _frequency: Frequency,
        _source: &str,
    ) -> Result<Vec<Bar>, LedgerError> {
        let mut result = Vec::new();
        for code in self.codes_or_all(codes) {
            let bars: Vec<Bar> = self
                .bars_for(&code)?
                .into_iter()
                .filter(|b| b.datetime <= end)
                .collect();
            let skip = bars.len().saturating_sub(count);
            result.extend(bars.into_iter().skip(skip));
        }
        Ok(result)
    }

    fn data_range(
        &self,
        code: &str,
        _frequency: Frequency,
        _source: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, LedgerError> {
        let bars = self.bars_for(code)?;
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.datetime, last.datetime, bars.len()))),
            _ => Ok(None),
        }
    }
}
