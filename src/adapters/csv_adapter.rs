//! CSV file bar adapter.
//!
//! One file per instrument and frequency, `{code}_{frequency}.csv`,
//! columns: datetime, open, high, low, close, volume, amount. The
//! source label is ignored here; CSV files carry no provenance.

use crate::domain::bar::{Bar, Frequency};
use crate::domain::error::LedgerError;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDateTime;
use std::fs;
use std::path::PathBuf;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str, frequency: Frequency) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", code, frequency))
    }

    /// Codes with a bar file present for the given frequency.
    pub fn list_codes(&self, frequency: Frequency) -> Result<Vec<String>, LedgerError> {
        let suffix = format!("_{}.csv", frequency);
        let mut codes = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(code) = name.strip_suffix(&suffix) {
                codes.push(code.to_string());
            }
        }
        codes.sort();
        Ok(codes)
    }

    fn read_all(&self, code: &str, frequency: Frequency) -> Result<Vec<Bar>, LedgerError> {
        let path = self.csv_path(code, frequency);
        let content = fs::read_to_string(&path).map_err(|e| LedgerError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| LedgerError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;

            let field = |idx: usize, name: &str| -> Result<&str, LedgerError> {
                record.get(idx).ok_or_else(|| LedgerError::Database {
                    reason: format!("missing {name} column in {}", path.display()),
                })
            };

            let datetime = NaiveDateTime::parse_from_str(field(0, "datetime")?, DATETIME_FORMAT)
                .map_err(|e| LedgerError::Database {
                    reason: format!("invalid datetime format: {}", e),
                })?;

            let num = |idx: usize, name: &str| -> Result<f64, LedgerError> {
                field(idx, name)?
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| LedgerError::Database {
                        reason: format!("invalid {name} value: {}", e),
                    })
            };

            bars.push(Bar {
                code: code.to_string(),
                datetime,
                open: num(1, "open")?,
                high: num(2, "high")?,
                low: num(3, "low")?,
                close: num(4, "close")?,
                volume: num(5, "volume")? as i64,
                amount: num(6, "amount")?,
            });
        }

        bars.sort_by_key(|b| b.datetime);
        Ok(bars)
    }
}

impl MarketDataPort for CsvAdapter {
    fn query_bars(
        &self,
        codes: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
        _source: &str,
    ) -> Result<Vec<Bar>, LedgerError> {
        let codes: Vec<String> = if codes.is_empty() {
            self.list_codes(frequency)?
        } else {
            codes.to_vec()
        };

        let mut result = Vec::new();
        for code in &codes {
            let bars = self.read_all(code, frequency)?;
            result.extend(
                bars.into_iter()
                    .filter(|b| b.datetime >= start && b.datetime <= end),
            );
        }
        result.sort_by(|a, b| (a.datetime, &a.code).cmp(&(b.datetime, &b.code)));
        Ok(result)
    }

    fn query_last_bars(
        &self,
        count: usize,
        codes: &[String],
        end: NaiveDateTime,
        frequency: Frequency,
        _source: &str,
    ) -> Result<Vec<Bar>, LedgerError> {
        let codes: Vec<String> = if codes.is_empty() {
            self.list_codes(frequency)?
        } else {
            codes.to_vec()
        };

        let mut result = Vec::new();
        for code in &codes {
            let bars: Vec<Bar> = self
                .read_all(code, frequency)?
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
        frequency: Frequency,
        _source: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, LedgerError> {
        if !self.csv_path(code, frequency).exists() {
            return Ok(None);
        }
        let bars = self.read_all(code, frequency)?;
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.datetime, last.datetime, bars.len()))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    const SAMPLE: &str = "\
datetime,open,high,low,close,volume,amount
2020-06-01 15:00:00,11.8,12.2,11.6,12.0,10000,120000
2020-06-02 15:00:00,12.0,12.8,12.0,12.5,12000,150000
2020-06-03 15:00:00,12.5,13.1,12.4,13.0,9000,117000
";

    fn dt(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 6, day)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn sample_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("000001_daily.csv")).unwrap();
        write!(file, "{}", SAMPLE).unwrap();
        dir
    }

    #[test]
    fn reads_bars_in_range() {
        let dir = sample_dir();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let bars = adapter
            .query_bars(
                &["000001".to_string()],
                dt(1),
                dt(2),
                Frequency::Daily,
                "csv",
            )
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert!((bars[1].close - 12.5).abs() < f64::EPSILON);
        assert_eq!(bars[0].volume, 10_000);
    }

    #[test]
    fn empty_code_list_discovers_files() {
        let dir = sample_dir();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let bars = adapter
            .query_bars(&[], dt(1), dt(3), Frequency::Daily, "csv")
            .unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].code, "000001");
    }

    #[test]
    fn last_bars_tail_of_series() {
        let dir = sample_dir();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let bars = adapter
            .query_last_bars(2, &["000001".to_string()], dt(3), Frequency::Daily, "csv")
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert!((bars[0].close - 12.5).abs() < f64::EPSILON);
        assert!((bars[1].close - 13.0).abs() < f64::EPSILON);
    }

    #[test]
    fn data_range_counts_rows() {
        let dir = sample_dir();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let range = adapter
            .data_range("000001", Frequency::Daily, "csv")
            .unwrap()
            .unwrap();
        assert_eq!(range.0, dt(1));
        assert_eq!(range.1, dt(3));
        assert_eq!(range.2, 3);

        assert!(adapter
            .data_range("999999", Frequency::Daily, "csv")
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_file_is_an_error_when_named() {
        let dir = sample_dir();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let err = adapter
            .query_bars(
                &["999999".to_string()],
                dt(1),
                dt(3),
                Frequency::Daily,
                "csv",
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Database { .. }));
    }

    #[test]
    fn malformed_row_is_an_error() {
        let dir = sample_dir();
        let mut file = fs::File::create(dir.path().join("000002_daily.csv")).unwrap();
        write!(
            file,
            "datetime,open,high,low,close,volume,amount\nnot-a-date,1,2,3,4,5,6\n"
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let err = adapter
            .query_bars(
                &["000002".to_string()],
                dt(1),
                dt(3),
                Frequency::Daily,
                "csv",
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Database { .. }));
    }
}
