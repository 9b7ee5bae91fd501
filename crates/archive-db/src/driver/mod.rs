//! Backend drivers.
//!
//! Each driver owns at most one live connection. Statements run inside an
//! implicit transaction that stays open until [`Driver::commit`] or
//! [`Driver::rollback`]; the DAO commits when it closes.

mod mysql;
mod sqlite;

pub use self::mysql::MysqlDriver;
pub use self::sqlite::SqliteDriver;

use crate::config::BackendKind;
use crate::error::DbError;
use crate::models::{Row, SqlValue};

/// SQL flavour spoken by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Mysql,
}

impl Dialect {
    /// Insert a row into `table`, overwriting the row that shares its `keys`.
    ///
    /// MySQL runs `REPLACE` as delete-then-insert, which trips the foreign
    /// keys `members` holds on users and channels, so it updates in place.
    pub fn upsert(self, table: &str, columns: &[&str], keys: &[&str]) -> String {
        let placeholders = vec!["?"; columns.len()].join(", ");
        match self {
            Dialect::Sqlite => format!(
                "INSERT OR REPLACE INTO {table} ({}) VALUES ({placeholders})",
                columns.join(", ")
            ),
            Dialect::Mysql => {
                let mut updates: Vec<String> = columns
                    .iter()
                    .filter(|c| !keys.contains(*c))
                    .map(|c| format!("`{c}` = VALUES(`{c}`)"))
                    .collect();
                if updates.is_empty() {
                    updates = keys.iter().map(|k| format!("`{k}` = `{k}`")).collect();
                }
                let columns: Vec<String> = columns.iter().map(|c| format!("`{c}`")).collect();
                format!(
                    "INSERT INTO {table} ({}) VALUES ({placeholders}) ON DUPLICATE KEY UPDATE {}",
                    columns.join(", "),
                    updates.join(", ")
                )
            }
        }
    }
}

pub trait Driver: Send {
    fn kind(&self) -> BackendKind;

    fn dialect(&self) -> Dialect;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;

    fn is_connected(&self) -> bool;

    /// Open the connection. No-op when already connected.
    fn connect(&mut self) -> Result<(), DbError>;

    /// Run a statement, returning the affected row count.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError>;

    /// Run one statement once per parameter row.
    fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, DbError> {
        let mut affected = 0;
        for params in rows {
            affected += self.execute(sql, params)?;
        }
        Ok(affected)
    }

    /// Run a query and buffer its whole result set.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    fn rollback(&mut self) -> Result<(), DbError>;

    /// Drop the connection without committing.
    fn close(&mut self) -> Result<(), DbError>;

    /// Column names of `table`, in declaration order. Empty if the table is missing.
    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DbError>;
}
