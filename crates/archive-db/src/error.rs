//! Errors surfaced by the data-access layer.
//!
//! Driver errors are wrapped, never translated, so callers can still match on
//! the underlying rusqlite / mysql error.

use thiserror::Error;

/// MySQL `ER_DUP_FIELDNAME`.
const MYSQL_DUPLICATE_COLUMN: u16 = 1060;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("mysql error: {0}")]
    Mysql(#[from] mysql::Error),

    #[error("invalid mysql url: {0}")]
    MysqlUrl(#[from] mysql::UrlError),

    /// An operation was attempted before `connect()` or after `close()`.
    #[error("database is not connected")]
    NotConnected,

    #[error("invalid database config: {0}")]
    Config(String),

    #[error("{0}")]
    NotFound(String),

    #[error("column {index}: expected {expected}, found {found}")]
    Conversion {
        index: usize,
        expected: &'static str,
        found: String,
    },
}

impl DbError {
    /// True when the backend rejected an `ADD COLUMN` because the column exists.
    pub fn is_duplicate_column(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(_, Some(msg))) => {
                msg.starts_with("duplicate column name")
            }
            DbError::Mysql(mysql::Error::MySqlError(e)) => e.code == MYSQL_DUPLICATE_COLUMN,
            _ => false,
        }
    }
}
