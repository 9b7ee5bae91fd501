use archive_db::{BackendKind, DbConfig};
use clap::{Args, ValueEnum};

/// Database selection. Every flag can also come from the environment or `.env`.
#[derive(Args, Debug)]
pub struct DbArgs {
    /// `sql` for a MySQL server; anything else uses an SQLite file
    #[arg(long, env = "ARCHIVE_DB_TYPE", default_value = "sqlite")]
    pub db_type: String,

    /// Path to the SQLite database
    #[arg(short = 'd', long, env = "ARCHIVE_DB_PATH", default_value = "slack.sqlite")]
    pub database_path: String,

    /// MySQL host
    #[arg(long, env = "ARCHIVE_DB_HOST")]
    pub db_host: Option<String>,

    /// MySQL port
    #[arg(long, env = "ARCHIVE_DB_PORT")]
    pub db_port: Option<u16>,

    /// MySQL user
    #[arg(long, env = "ARCHIVE_DB_USER")]
    pub db_user: Option<String>,

    /// MySQL password
    #[arg(long, env = "ARCHIVE_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// MySQL database name
    #[arg(long, env = "ARCHIVE_DB_NAME")]
    pub db_name: Option<String>,
}

impl DbArgs {
    pub fn to_config(&self) -> DbConfig {
        match BackendKind::from_designator(&self.db_type) {
            BackendKind::Embedded => DbConfig::sqlite(&self.database_path),
            BackendKind::Networked => {
                let mut config = DbConfig::new();
                let port = self.db_port.map(|p| p.to_string());
                let entries = [
                    ("host", self.db_host.as_ref()),
                    ("port", port.as_ref()),
                    ("user", self.db_user.as_ref()),
                    ("password", self.db_password.as_ref()),
                    ("database", self.db_name.as_ref()),
                ];
                for (key, value) in entries {
                    if let Some(value) = value {
                        config.set(key, value.as_str());
                    }
                }
                config
            }
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    #[value(alias = "critical")]
    Error,
    #[value(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive for this binary and the database layer.
    pub fn directive(self) -> String {
        let level = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        format!("archivebot={level},archive_db={level}")
    }
}
