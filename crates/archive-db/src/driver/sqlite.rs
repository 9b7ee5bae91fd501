//! Embedded SQLite driver (rusqlite).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql, params_from_iter};
use tracing::{debug, info};

use super::{Dialect, Driver};
use crate::config::{BackendKind, DbConfig};
use crate::error::DbError;
use crate::models::{Row, SqlValue};

pub struct SqliteDriver {
    path: PathBuf,
    foreign_keys: bool,
    conn: Option<Connection>,
}

impl SqliteDriver {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            foreign_keys: false,
            conn: None,
        }
    }

    pub fn from_config(config: &DbConfig) -> Result<Self, DbError> {
        let path = config.require_any(&["database", "path"])?;
        let mut driver = Self::new(path);
        driver.foreign_keys = config.flag("foreign_keys");
        Ok(driver)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn live(&self) -> Result<&Connection, DbError> {
        self.conn.as_ref().ok_or(DbError::NotConnected)
    }

    /// Like the DB-API sqlite module: the first statement opens a transaction.
    fn begin_if_needed(conn: &Connection) -> Result<(), DbError> {
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

impl Driver for SqliteDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connect(&mut self) -> Result<(), DbError> {
        if self.conn.is_some() {
            return Ok(());
        }

        let conn = Connection::open(&self.path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", if self.foreign_keys { "ON" } else { "OFF" })?;

        info!("SQLite database opened at {}", self.path.display());
        self.conn = Some(conn);
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError> {
        let conn = self.live()?;
        Self::begin_if_needed(conn)?;
        debug!(sql, "execute");
        let affected = conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, DbError> {
        let conn = self.live()?;
        Self::begin_if_needed(conn)?;
        debug!(sql, rows = rows.len(), "execute_many");

        let mut stmt = conn.prepare_cached(sql)?;
        let mut affected = 0u64;
        for params in rows {
            affected += stmt.execute(params_from_iter(params.iter()))? as u64;
        }
        Ok(affected)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        let conn = self.live()?;
        Self::begin_if_needed(conn)?;
        debug!(sql, "query");

        let mut stmt = conn.prepare(sql)?;
        let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get::<_, Value>(i).map(SqlValue::from))
                .collect::<Result<Vec<_>, _>>()?;
            out.push(Row::new(columns.clone(), values));
        }
        Ok(out)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        let conn = self.live()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        let conn = self.live()?;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| DbError::Sqlite(e))?;
            debug!("SQLite database closed at {}", self.path.display());
        }
        Ok(())
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DbError> {
        let conn = self.live()?;
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let names = stmt
            .query_map([table], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Integer(i),
            Value::Real(r) => SqlValue::Real(r),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Blob(b),
        }
    }
}
