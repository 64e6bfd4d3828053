//! SQLite bar-warehouse adapter.

use crate::domain::bar::{Bar, Frequency};
use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDateTime;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        let db_path =
            config
                .get_string("warehouse", "path")
                .ok_or_else(|| LedgerError::ConfigMissing {
                    section: "warehouse".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("warehouse", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| LedgerError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| LedgerError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bars (
                code TEXT NOT NULL,
                datetime TEXT NOT NULL,
                frequency TEXT NOT NULL,
                source TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                amount REAL NOT NULL,
                PRIMARY KEY (code, datetime, frequency, source)
            );
            CREATE INDEX IF NOT EXISTS idx_bars_code ON bars(code, frequency, source);
            CREATE INDEX IF NOT EXISTS idx_bars_datetime ON bars(datetime);",
        )
        .map_err(query_err)?;
        Ok(())
    }

    pub fn insert_bars(
        &self,
        bars: &[Bar],
        frequency: Frequency,
        source: &str,
    ) -> Result<usize, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO bars
                     (code, datetime, frequency, source, open, high, low, close, volume, amount)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .map_err(query_err)?;
            for bar in bars {
                inserted += stmt
                    .execute(params![
                        bar.code,
                        bar.datetime.format(DATETIME_FORMAT).to_string(),
                        frequency.to_string(),
                        source,
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume,
                        bar.amount,
                    ])
                    .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(inserted)
    }

    pub fn list_codes(
        &self,
        frequency: Frequency,
        source: &str,
    ) -> Result<Vec<String>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT code FROM bars
                 WHERE frequency = ?1 AND source = ?2 ORDER BY code",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![frequency.to_string(), source], |row| {
                row.get::<_, String>(0)
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, LedgerError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| LedgerError::Database {
                reason: e.to_string(),
            })
    }
}

fn query_err(e: rusqlite::Error) -> LedgerError {
    LedgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn row_to_bar(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bar> {
    let datetime_str: String = row.get(1)?;
    let datetime =
        NaiveDateTime::parse_from_str(&datetime_str, DATETIME_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
    Ok(Bar {
        code: row.get(0)?,
        datetime,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        volume: row.get(6)?,
        amount: row.get(7)?,
    })
}

impl MarketDataPort for SqliteAdapter {
    fn query_bars(
        &self,
        codes: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
        source: &str,
    ) -> Result<Vec<Bar>, LedgerError> {
        let conn = self.conn()?;

        let mut sql = String::from(
            "SELECT code, datetime, open, high, low, close, volume, amount FROM bars
             WHERE frequency = ?1 AND source = ?2 AND datetime >= ?3 AND datetime <= ?4",
        );
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(frequency.to_string()),
            Box::new(source.to_string()),
            Box::new(start.format(DATETIME_FORMAT).to_string()),
            Box::new(end.format(DATETIME_FORMAT).to_string()),
        ];
        if !codes.is_empty() {
            let placeholders: Vec<String> = (0..codes.len())
                .map(|i| format!("?{}", i + 5))
                .collect();
            sql.push_str(&format!(" AND code IN ({})", placeholders.join(", ")));
            for code in codes {
                values.push(Box::new(code.clone()));
            }
        }
        sql.push_str(" ORDER BY datetime, code");

        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
                |row| row_to_bar(row),
            )
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn query_last_bars(
        &self,
        count: usize,
        codes: &[String],
        end: NaiveDateTime,
        frequency: Frequency,
        source: &str,
    ) -> Result<Vec<Bar>, LedgerError> {
        let codes: Vec<String> = if codes.is_empty() {
            self.list_codes(frequency, source)?
        } else {
            codes.to_vec()
        };

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT code, datetime, open, high, low, close, volume, amount FROM bars
                 WHERE code = ?1 AND frequency = ?2 AND source = ?3 AND datetime <= ?4
                 ORDER BY datetime DESC LIMIT ?5",
            )
            .map_err(query_err)?;

        let end_str = end.format(DATETIME_FORMAT).to_string();
        let mut result = Vec::new();
        for code in &codes {
            let rows = stmt
                .query_map(
                    params![code, frequency.to_string(), source, end_str, count as i64],
                    |row| row_to_bar(row),
                )
                .map_err(query_err)?;
            let mut bars = rows.collect::<Result<Vec<_>, _>>().map_err(query_err)?;
            bars.reverse();
            result.extend(bars);
        }
        Ok(result)
    }

    fn data_range(
        &self,
        code: &str,
        frequency: Frequency,
        source: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT MIN(datetime), MAX(datetime), COUNT(*) FROM bars
                 WHERE code = ?1 AND frequency = ?2 AND source = ?3",
            )
            .map_err(query_err)?;

        let row: (Option<String>, Option<String>, usize) = stmt
            .query_row(params![code, frequency.to_string(), source], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(query_err)?;

        match row {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = NaiveDateTime::parse_from_str(&min_str, DATETIME_FORMAT)
                    .map_err(|e| LedgerError::Database {
                        reason: format!("invalid datetime in warehouse: {e}"),
                    })?;
                let max = NaiveDateTime::parse_from_str(&max_str, DATETIME_FORMAT)
                    .map_err(|e| LedgerError::Database {
                        reason: format!("invalid datetime in warehouse: {e}"),
                    })?;
                Ok(Some((min, max, count)))
            }
            _ => Ok(None),
        }
    }
}
