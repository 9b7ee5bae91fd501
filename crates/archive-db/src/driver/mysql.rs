//! Networked MySQL driver (blocking `mysql` client).

use std::sync::Arc;

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, Params, Value};
use tracing::{debug, info};

use super::{Dialect, Driver};
use crate::config::{BackendKind, DbConfig};
use crate::error::DbError;
use crate::models::{Row, SqlValue};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;

pub struct MysqlDriver {
    opts: Opts,
    conn: Option<Conn>,
}

impl MysqlDriver {
    pub fn new(opts: Opts) -> Self {
        Self { opts, conn: None }
    }

    /// Build connection options without connecting.
    pub fn from_config(config: &DbConfig) -> Result<Self, DbError> {
        if let Some(url) = config.get("url") {
            return Ok(Self::new(Opts::from_url(url)?));
        }

        let port = match config.get("port") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| DbError::Config(format!("invalid port {port:?}")))?,
            None => DEFAULT_PORT,
        };

        let builder = OptsBuilder::new()
            .ip_or_hostname(Some(config.get("host").unwrap_or(DEFAULT_HOST)))
            .tcp_port(port)
            .user(config.get("user"))
            .pass(config.get_any(&["password", "passwd"]))
            .db_name(config.get_any(&["database", "db"]));

        Ok(Self::new(Opts::from(builder)))
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    fn live(&mut self) -> Result<&mut Conn, DbError> {
        self.conn.as_mut().ok_or(DbError::NotConnected)
    }
}

impl Driver for MysqlDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Networked
    }

    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn describe(&self) -> String {
        format!(
            "{}:{}/{}",
            self.opts.get_ip_or_hostname(),
            self.opts.get_tcp_port(),
            self.opts.get_db_name().unwrap_or("")
        )
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connect(&mut self) -> Result<(), DbError> {
        if self.conn.is_some() {
            return Ok(());
        }

        let mut conn = Conn::new(self.opts.clone())?;
        // Statements accumulate in one transaction until commit.
        conn.query_drop("SET autocommit = 0")?;

        info!("MySQL connection opened to {}", self.describe());
        self.conn = Some(conn);
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError> {
        let conn = self.live()?;
        debug!(sql, "execute");
        if params.is_empty() {
            // Text protocol: DDL and savepoint statements are not all preparable.
            conn.query_drop(sql)?;
        } else {
            conn.exec_drop(sql, to_params(params))?;
        }
        Ok(conn.affected_rows())
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let conn = self.live()?;
        debug!(sql, rows = rows.len(), "execute_many");
        let stmt = conn.prep(sql)?;
        let mut affected = 0;
        for params in rows {
            conn.exec_drop(&stmt, to_params(params))?;
            affected += conn.affected_rows();
        }
        Ok(affected)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError> {
        let conn = self.live()?;
        debug!(sql, "query");

        let rows: Vec<mysql::Row> = conn.exec(sql, to_params(params))?;
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Arc<[String]> = first
            .columns_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let values = row.unwrap().into_iter().map(SqlValue::from).collect();
                Row::new(columns.clone(), values)
            })
            .collect())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.live()?.query_drop("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.live()?.query_drop("ROLLBACK")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        // Dropping the handle sends COM_QUIT.
        if self.conn.take().is_some() {
            debug!("MySQL connection closed to {}", self.describe());
        }
        Ok(())
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DbError> {
        let conn = self.live()?;
        let names: Vec<String> = conn.exec(
            "SELECT COLUMN_NAME FROM information_schema.COLUMNS
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
             ORDER BY ORDINAL_POSITION",
            (table,),
        )?;
        Ok(names)
    }
}

fn to_params(params: &[SqlValue]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(Value::from).collect())
    }
}

impl From<&SqlValue> for Value {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => Value::NULL,
            SqlValue::Integer(i) => Value::Int(*i),
            SqlValue::Real(r) => Value::Double(*r),
            SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
            SqlValue::Blob(b) => Value::Bytes(b.clone()),
        }
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::NULL => SqlValue::Null,
            Value::Int(i) => SqlValue::Integer(i),
            Value::UInt(u) => i64::try_from(u)
                .map(SqlValue::Integer)
                .unwrap_or_else(|_| SqlValue::Text(u.to_string())),
            Value::Float(f) => SqlValue::Real(f.into()),
            Value::Double(d) => SqlValue::Real(d),
            Value::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(text) => SqlValue::Text(text),
                Err(e) => SqlValue::Blob(e.into_bytes()),
            },
            Value::Date(year, month, day, hour, minute, second, micros) => SqlValue::Text(format!(
                "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
            )),
            Value::Time(negative, days, hours, minutes, seconds, micros) => {
                let hours = u64::from(days) * 24 + u64::from(hours);
                let sign = if negative { "-" } else { "" };
                SqlValue::Text(format!(
                    "{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_options_from_keys() {
        let config = DbConfig::new()
            .with("host", "db.internal")
            .with("port", "3307")
            .with("user", "archivebot")
            .with("password", "secret")
            .with("db", "slack");
        let driver = MysqlDriver::from_config(&config).unwrap();

        assert_eq!(driver.opts().get_ip_or_hostname(), "db.internal");
        assert_eq!(driver.opts().get_tcp_port(), 3307);
        assert_eq!(driver.opts().get_user(), Some("archivebot"));
        assert_eq!(driver.opts().get_db_name(), Some("slack"));
        assert!(!driver.is_connected());
        assert_eq!(driver.describe(), "db.internal:3307/slack");
    }

    #[test]
    fn defaults_to_localhost() {
        let driver = MysqlDriver::from_config(&DbConfig::new()).unwrap();
        assert_eq!(driver.opts().get_ip_or_hostname(), DEFAULT_HOST);
        assert_eq!(driver.opts().get_tcp_port(), DEFAULT_PORT);
    }

    #[test]
    fn builds_options_from_url() {
        let config = DbConfig::new().with("url", "mysql://bot:pw@10.0.0.5:3310/archive");
        let driver = MysqlDriver::from_config(&config).unwrap();
        assert_eq!(driver.opts().get_tcp_port(), 3310);
        assert_eq!(driver.opts().get_db_name(), Some("archive"));
    }

    #[test]
    fn rejects_bad_config() {
        let bad_port = DbConfig::new().with("port", "not-a-port");
        assert!(matches!(MysqlDriver::from_config(&bad_port), Err(DbError::Config(_))));

        let bad_url = DbConfig::new().with("url", "postgres://nope");
        assert!(matches!(MysqlDriver::from_config(&bad_url), Err(DbError::MysqlUrl(_))));
    }

    #[test]
    fn unconnected_driver_rejects_statements() {
        let mut driver = MysqlDriver::from_config(&DbConfig::new()).unwrap();
        assert!(matches!(driver.query("SELECT 1", &[]), Err(DbError::NotConnected)));
        assert!(matches!(driver.commit(), Err(DbError::NotConnected)));
        driver.close().unwrap();
    }

    #[test]
    fn converts_wire_values() {
        assert_eq!(SqlValue::from(Value::Bytes(b"hi".to_vec())), SqlValue::from("hi"));
        assert_eq!(SqlValue::from(Value::Bytes(vec![0xff, 0xfe])), SqlValue::Blob(vec![0xff, 0xfe]));
        assert_eq!(SqlValue::from(Value::UInt(5)), SqlValue::Integer(5));
        assert_eq!(
            SqlValue::from(Value::UInt(u64::MAX)),
            SqlValue::Text(u64::MAX.to_string())
        );
        assert_eq!(
            SqlValue::from(Value::Date(2024, 1, 2, 3, 4, 5, 6)),
            SqlValue::from("2024-01-02 03:04:05.000006")
        );
        assert_eq!(Value::from(&SqlValue::from(true)), Value::Int(1));
        assert_eq!(Value::from(&SqlValue::from("x")), Value::Bytes(b"x".to_vec()));
    }
}
