use tracing::{debug, info};

use crate::Database;
use crate::driver::Dialect;
use crate::error::DbError;

pub const TABLES: [&str; 4] = ["messages", "users", "channels", "members"];

const SQLITE_SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS messages (
        message     TEXT,
        user        TEXT,
        channel     TEXT,
        timestamp   TEXT,
        UNIQUE(channel, timestamp) ON CONFLICT REPLACE
    )",
    "CREATE TABLE IF NOT EXISTS users (
        name        TEXT,
        id          TEXT,
        avatar      TEXT,
        UNIQUE(id) ON CONFLICT REPLACE
    )",
    "CREATE TABLE IF NOT EXISTS channels (
        name        TEXT,
        id          TEXT,
        is_private  BOOLEAN NOT NULL CHECK (is_private IN (0,1)),
        UNIQUE(id) ON CONFLICT REPLACE
    )",
    "CREATE TABLE IF NOT EXISTS members (
        channel     TEXT,
        user        TEXT,
        FOREIGN KEY (channel) REFERENCES channels(id),
        FOREIGN KEY (user) REFERENCES users(id)
    )",
];

// MySQL can't put unbounded TEXT in a unique key, and has no ON CONFLICT
// clause; replace semantics come from REPLACE INTO instead.
const MYSQL_SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS messages (
        message     TEXT,
        `user`      VARCHAR(255),
        channel     VARCHAR(255),
        `timestamp` VARCHAR(255),
        UNIQUE KEY uniq_messages_channel_timestamp (channel, `timestamp`)
    )",
    "CREATE TABLE IF NOT EXISTS users (
        name        TEXT,
        id          VARCHAR(255),
        avatar      TEXT,
        UNIQUE KEY uniq_users_id (id)
    )",
    "CREATE TABLE IF NOT EXISTS channels (
        name        TEXT,
        id          VARCHAR(255),
        is_private  BOOLEAN NOT NULL CHECK (is_private IN (0,1)),
        UNIQUE KEY uniq_channels_id (id)
    )",
    "CREATE TABLE IF NOT EXISTS members (
        channel     VARCHAR(255),
        `user`      VARCHAR(255),
        FOREIGN KEY (channel) REFERENCES channels(id),
        FOREIGN KEY (`user`) REFERENCES users(id)
    )",
];

/// Channels tables from before private channels were tracked lack this
/// column. Existing rows become private (1).
const SQLITE_ADD_IS_PRIVATE: &str = "ALTER TABLE channels
    ADD COLUMN is_private BOOLEAN DEFAULT 1
    NOT NULL CHECK (is_private IN (0,1))";

const MYSQL_ADD_IS_PRIVATE: &str = "ALTER TABLE channels
    ADD COLUMN is_private BOOLEAN NOT NULL DEFAULT 1
    CHECK (is_private IN (0,1))";

impl Dialect {
    pub fn schema(self) -> &'static [&'static str] {
        match self {
            Dialect::Sqlite => &SQLITE_SCHEMA,
            Dialect::Mysql => &MYSQL_SCHEMA,
        }
    }

    pub fn add_is_private(self) -> &'static str {
        match self {
            Dialect::Sqlite => SQLITE_ADD_IS_PRIVATE,
            Dialect::Mysql => MYSQL_ADD_IS_PRIVATE,
        }
    }
}

impl Database {
    /// Create any missing tables, then add `channels.is_private` to
    /// databases that predate it. Safe to run on every start.
    pub fn migrate_schema(&mut self) -> Result<(), DbError> {
        let dialect = self.dialect();
        let driver = self.live()?;

        for statement in dialect.schema() {
            driver.execute(statement, &[])?;
        }

        match driver.execute(dialect.add_is_private(), &[]) {
            Ok(_) => info!("Added is_private column to channels"),
            Err(e) if e.is_duplicate_column() => debug!("channels.is_private already present"),
            Err(e) => return Err(e),
        }

        info!("Database migrations complete");
        Ok(())
    }
}
