//! Market-data access port trait.

use crate::domain::bar::{Bar, Frequency};
use crate::domain::error::LedgerError;
use chrono::NaiveDateTime;

pub trait MarketDataPort {
    /// Bars for the given codes between `start` and `end` inclusive,
    /// ordered by (datetime, code). An empty code list means all codes.
    fn query_bars(
        &self,
        codes: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
        source: &str,
    ) -> Result<Vec<Bar>, LedgerError>;

    /// The most recent `count` bars at or before `end` for each of the
    /// given codes, ascending by datetime within each code.
    fn query_last_bars(
        &self,
        count: usize,
        codes: &[String],
        end: NaiveDateTime,
        frequency: Frequency,
        source: &str,
    ) -> Result<Vec<Bar>, LedgerError>;

    /// Min/max datetime and bar count for one code, or None if absent.
    fn data_range(
        &self,
        code: &str,
        frequency: Frequency,
        source: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, LedgerError>;
}
