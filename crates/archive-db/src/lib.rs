//! Data-access layer for the chat archive.
//!
//! A [`Database`] wraps one backend [`Driver`] (embedded SQLite or a MySQL
//! server) and one cursor. Acquire it through [`Database::session`] or
//! [`Database::with_session`] so the pending transaction is committed and the
//! connection closed on every exit path.

pub mod config;
pub mod driver;
pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod search;
pub mod selector;
pub mod session;

use std::collections::VecDeque;

use tracing::{debug, info, warn};

pub use config::{BackendKind, DbConfig};
pub use driver::{Dialect, Driver, MysqlDriver, SqliteDriver};
pub use error::DbError;
pub use models::{FromSqlValue, Row, SqlValue};
pub use selector::select_backend;
pub use session::Session;

/// Convenience for statements without parameters.
pub const NO_ARGS: [SqlValue; 0] = [];

/// Result set of the last query, drained by the fetch calls.
#[derive(Debug, Default)]
struct Cursor {
    rows: VecDeque<Row>,
    rowcount: u64,
}

pub struct Database {
    driver: Box<dyn Driver>,
    cursor: Option<Cursor>,
    savepoints: usize,
}

impl Database {
    /// Wrap a driver. Nothing is opened until [`Database::connect`].
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self {
            driver,
            cursor: None,
            savepoints: 0,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.driver.kind()
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    pub fn is_connected(&self) -> bool {
        self.cursor.is_some() && self.driver.is_connected()
    }

    /// Open the connection if needed, then a fresh cursor.
    pub fn connect(&mut self) -> Result<(), DbError> {
        if !self.driver.is_connected() {
            self.driver.connect()?;
            info!("Connected to {} database {}", self.driver.kind(), self.driver.describe());
        }
        self.cursor = Some(Cursor::default());
        self.savepoints = 0;
        Ok(())
    }

    /// Close the cursor and commit, then close the connection.
    ///
    /// The connection is closed even when the commit fails; the commit error
    /// is the one returned.
    pub fn close(&mut self) -> Result<(), DbError> {
        let committed = match self.cursor.take() {
            Some(_) if self.driver.is_connected() => self.driver.commit(),
            _ => Ok(()),
        };
        if let Err(e) = &committed {
            warn!("Commit failed while closing {}: {}", self.driver.describe(), e);
        }

        let closed = if self.driver.is_connected() {
            self.driver.close()
        } else {
            Ok(())
        };
        self.savepoints = 0;

        committed?;
        closed?;
        debug!("Closed {} database {}", self.driver.kind(), self.driver.describe());
        Ok(())
    }

    /// Driver behind an open cursor.
    pub(crate) fn live(&mut self) -> Result<&mut dyn Driver, DbError> {
        if !self.is_connected() {
            return Err(DbError::NotConnected);
        }
        Ok(self.driver.as_mut())
    }

    fn cursor_mut(&mut self) -> Result<&mut Cursor, DbError> {
        if !self.driver.is_connected() {
            return Err(DbError::NotConnected);
        }
        self.cursor.as_mut().ok_or(DbError::NotConnected)
    }

    // -- Pass-through statements --

    /// Run a statement; `?` placeholders bind `args` in order.
    /// Returns the number of affected rows.
    pub fn execute<I>(&mut self, sql: &str, args: I) -> Result<u64, DbError>
    where
        I: IntoIterator,
        I::Item: Into<SqlValue>,
    {
        let args: Vec<SqlValue> = args.into_iter().map(Into::into).collect();
        let affected = self.live()?.execute(sql, &args)?;

        let cursor = self.cursor_mut()?;
        cursor.rows.clear();
        cursor.rowcount = affected;
        Ok(affected)
    }

    /// Run a query and keep its rows for [`fetch_one`](Self::fetch_one) /
    /// [`fetch_many`](Self::fetch_many). Returns the number of rows buffered.
    pub fn query<I>(&mut self, sql: &str, args: I) -> Result<usize, DbError>
    where
        I: IntoIterator,
        I::Item: Into<SqlValue>,
    {
        let args: Vec<SqlValue> = args.into_iter().map(Into::into).collect();
        let rows = self.live()?.query(sql, &args)?;

        let cursor = self.cursor_mut()?;
        cursor.rowcount = rows.len() as u64;
        cursor.rows = rows.into();
        Ok(cursor.rows.len())
    }

    /// Next row of the last query, or `None` once exhausted.
    pub fn fetch_one(&mut self) -> Result<Option<Row>, DbError> {
        Ok(self.cursor_mut()?.rows.pop_front())
    }

    /// Up to `limit` rows of the last query, in backend order.
    pub fn fetch_many(&mut self, limit: usize) -> Result<Vec<Row>, DbError> {
        let rows = &mut self.cursor_mut()?.rows;
        let take = limit.min(rows.len());
        Ok(rows.drain(..take).collect())
    }

    pub fn fetch_all(&mut self) -> Result<Vec<Row>, DbError> {
        Ok(self.cursor_mut()?.rows.drain(..).collect())
    }

    /// Rows affected by the last `execute`, or returned by the last `query`.
    pub fn rowcount(&self) -> Option<u64> {
        self.cursor.as_ref().map(|c| c.rowcount)
    }

    // -- Transactions --

    pub fn commit(&mut self) -> Result<(), DbError> {
        self.live()?.commit()?;
        self.savepoints = 0;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), DbError> {
        self.live()?.rollback()?;
        self.savepoints = 0;
        Ok(())
    }

    /// Run `f` inside a savepoint: everything it wrote is undone if it fails.
    ///
    /// Savepoints nest inside the cursor's pending transaction, so a
    /// successful `f` is still only committed by `commit()` or `close()`.
    /// If `f` itself commits or rolls back, the savepoint is gone and `f`'s
    /// result is returned as is.
    pub fn transaction<F, T>(&mut self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut Database) -> Result<T, DbError>,
    {
        let depth = self.savepoints;
        let name = format!("archive_tx_{depth}");
        self.live()?.execute(&format!("SAVEPOINT {name}"), &[])?;
        self.savepoints += 1;

        let result = f(self);
        if self.savepoints != depth + 1 {
            debug!("Transaction ended inside {}", name);
            return result;
        }
        self.savepoints = depth;

        match result {
            Ok(value) => {
                self.live()?.execute(&format!("RELEASE SAVEPOINT {name}"), &[])?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback_to(&name) {
                    warn!("Rollback to {} failed: {}", name, rollback_err);
                }
                Err(e)
            }
        }
    }

    fn rollback_to(&mut self, name: &str) -> Result<(), DbError> {
        let driver = self.live()?;
        driver.execute(&format!("ROLLBACK TO SAVEPOINT {name}"), &[])?;
        driver.execute(&format!("RELEASE SAVEPOINT {name}"), &[])?;
        debug!("Rolled back {}", name);
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.driver.kind())
            .field("target", &self.driver.describe())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
