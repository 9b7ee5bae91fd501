use archive_types::{Channel, Member, Message, User};
use tracing::debug;

use crate::Database;
use crate::error::DbError;
use crate::models::SqlValue;

const USER_COLUMNS: [&str; 3] = ["name", "id", "avatar"];
const CHANNEL_COLUMNS: [&str; 3] = ["name", "id", "is_private"];
const MESSAGE_COLUMNS: [&str; 4] = ["message", "user", "channel", "timestamp"];

impl Database {
    // -- Users --

    /// Insert users, replacing any row with the same id.
    pub fn insert_users(&mut self, users: &[User]) -> Result<(), DbError> {
        let sql = self.dialect().upsert("users", &USER_COLUMNS, &["id"]);
        let rows: Vec<Vec<SqlValue>> = users
            .iter()
            .map(|u| vec![(&u.name).into(), (&u.id).into(), (&u.avatar).into()])
            .collect();

        self.live()?.execute_many(&sql, &rows)?;
        debug!("Stored {} users", users.len());
        Ok(())
    }

    pub fn rename_user(&mut self, id: &str, new_name: &str) -> Result<u64, DbError> {
        self.live()?.execute(
            "UPDATE users SET name = ? WHERE id = ?",
            &[new_name.into(), id.into()],
        )
    }

    /// Id of the user whose name matches `name`, ignoring case.
    pub fn user_id_by_name(&mut self, name: &str) -> Result<Option<String>, DbError> {
        self.lookup_id("SELECT id FROM users WHERE LOWER(name) = LOWER(?)", name)
    }

    // -- Channels --

    pub fn insert_channel(&mut self, id: &str, name: &str, is_private: bool) -> Result<(), DbError> {
        let sql = self.dialect().upsert("channels", &CHANNEL_COLUMNS, &["id"]);
        self.live()?
            .execute(&sql, &[name.into(), id.into(), is_private.into()])?;
        Ok(())
    }

    /// Insert channels and their members as one unit: if either write fails,
    /// neither is kept.
    pub fn insert_channels_and_members(
        &mut self,
        channels: &[Channel],
        members: &[Member],
    ) -> Result<(), DbError> {
        let sql = self.dialect().upsert("channels", &CHANNEL_COLUMNS, &["id"]);
        let rows: Vec<Vec<SqlValue>> = channels
            .iter()
            .map(|c| vec![(&c.name).into(), (&c.id).into(), c.is_private.into()])
            .collect();

        self.transaction(|db| {
            db.live()?.execute_many(&sql, &rows)?;
            db.insert_members(members)
        })?;

        debug!("Stored {} channels and {} members", channels.len(), members.len());
        Ok(())
    }

    pub fn rename_channel(&mut self, id: &str, new_name: &str) -> Result<u64, DbError> {
        self.live()?.execute(
            "UPDATE channels SET name = ? WHERE id = ?",
            &[new_name.into(), id.into()],
        )
    }

    pub fn channel_id_by_name(&mut self, name: &str) -> Result<Option<String>, DbError> {
        self.lookup_id("SELECT id FROM channels WHERE LOWER(name) = LOWER(?)", name)
    }

    // -- Members --

    /// Plain insert; the same (channel, user) pair may be stored more than once.
    pub fn insert_members(&mut self, members: &[Member]) -> Result<(), DbError> {
        let rows: Vec<Vec<SqlValue>> = members
            .iter()
            .map(|m| vec![(&m.channel).into(), (&m.user).into()])
            .collect();

        self.live()?
            .execute_many("INSERT INTO members (channel, user) VALUES (?, ?)", &rows)?;
        Ok(())
    }

    // -- Messages --

    /// Insert messages. A message with the same (channel, timestamp) as an
    /// existing one replaces it.
    pub fn insert_messages(&mut self, messages: &[Message]) -> Result<(), DbError> {
        let sql = self.dialect().upsert("messages", &MESSAGE_COLUMNS, &["channel", "timestamp"]);
        let rows: Vec<Vec<SqlValue>> = messages
            .iter()
            .map(|m| {
                vec![
                    (&m.message).into(),
                    (&m.user).into(),
                    (&m.channel).into(),
                    (&m.timestamp).into(),
                ]
            })
            .collect();

        self.live()?.execute_many(&sql, &rows)?;
        debug!("Stored {} messages", messages.len());
        Ok(())
    }

    // -- Introspection --

    pub fn table_columns(&mut self, table: &str) -> Result<Vec<String>, DbError> {
        self.live()?.table_columns(table)
    }

    fn lookup_id(&mut self, sql: &str, name: &str) -> Result<Option<String>, DbError> {
        let rows = self.live()?.query(sql, &[name.into()])?;
        rows.first().map(|row| row.get::<String>(0)).transpose()
    }
}
