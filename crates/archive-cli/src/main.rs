//! archivebot - maintenance and search for a chat message archive.
//!
//! Works against an SQLite file or a MySQL server, chosen with `--db-type`.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::{DbArgs, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "archivebot", version, about = "Chat message archive: migrate, import and search")]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// Log level (ignored when RUST_LOG is set)
    #[arg(
        short = 'l',
        long,
        env = "ARCHIVE_LOG",
        value_enum,
        ignore_case = true,
        default_value = "debug",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create missing tables and columns
    Migrate,
    /// Load users, channels, members and messages from a JSON export
    Import {
        /// JSON file with `users`, `channels`, `members` and `messages` arrays
        file: PathBuf,
    },
    /// Search messages: <text> from:<user> in:<channel> sort:asc|desc limit:<n>
    Search {
        /// User id the search runs as; private channels need membership
        #[arg(long = "as", value_name = "USER_ID")]
        requester: String,

        /// Query words and filters
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Print the columns of the archive tables
    Inspect {
        /// Only this table
        table: Option<String>,
    },
}

fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.directive())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.db.to_config();
    let mut db = archive_db::select_backend(&cli.db.db_type, &config)?;
    info!("Using {} backend", db.backend());

    match cli.command {
        Commands::Migrate => commands::migrate(&mut db),
        Commands::Import { file } => commands::import(&mut db, &file),
        Commands::Search { requester, text } => commands::search(&mut db, &text, &requester),
        Commands::Inspect { table } => commands::inspect(&mut db, table.as_deref()),
    }
}
