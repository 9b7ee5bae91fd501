use std::path::Path;

use anyhow::{Context, Result};
use archive_db::Database;
use archive_db::migrations::TABLES;
use archive_types::{ArchiveDump, SearchQuery};
use serde_json::json;
use tracing::{info, warn};

pub fn migrate(db: &mut Database) -> Result<()> {
    db.with_session(|db| db.migrate_schema().context("Schema migration failed"))?;
    println!("Schema is up to date");
    Ok(())
}

/// Load a JSON export and write it. Users, channels and members, then messages.
pub fn import(db: &mut Database, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let dump: ArchiveDump = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    db.with_session(|db| -> Result<()> {
        db.migrate_schema()?;
        db.insert_users(&dump.users).context("Failed to store users")?;
        db.insert_channels_and_members(&dump.channels, &dump.members)
            .context("Failed to store channels")?;
        db.insert_messages(&dump.messages)
            .context("Failed to store messages")?;
        Ok(())
    })?;

    info!(
        users = dump.users.len(),
        channels = dump.channels.len(),
        members = dump.members.len(),
        messages = dump.messages.len(),
        "Import complete"
    );
    println!(
        "Imported {} users, {} channels, {} members, {} messages",
        dump.users.len(),
        dump.channels.len(),
        dump.members.len(),
        dump.messages.len()
    );
    Ok(())
}

/// Run a search as `requester` and print one JSON object per hit.
pub fn search(db: &mut Database, text: &[String], requester: &str) -> Result<()> {
    let query = SearchQuery::parse(&text.join(" "))?;
    info!(?query, requester, "Searching archive");

    let hits = db.with_session(|db| db.search(&query, requester))?;
    if hits.is_empty() {
        println!("No results found");
        return Ok(());
    }

    for hit in &hits {
        let line = json!({
            "channel": hit.channel,
            "user": hit.user,
            "timestamp": hit.timestamp,
            "sent_at": hit.sent_at().map(|t| t.to_rfc3339()),
            "message": hit.message,
        });
        println!("{line}");
    }
    Ok(())
}

pub fn inspect(db: &mut Database, table: Option<&str>) -> Result<()> {
    let tables: Vec<&str> = match table {
        Some(table) => vec![table],
        None => TABLES.to_vec(),
    };

    db.with_session(|db| -> Result<()> {
        for table in tables {
            let columns = db.table_columns(table)?;
            if columns.is_empty() {
                warn!("Table {} does not exist", table);
                println!("{table}: (missing)");
            } else {
                println!("{table}: {}", columns.join(", "));
            }
        }
        Ok(())
    })
}
