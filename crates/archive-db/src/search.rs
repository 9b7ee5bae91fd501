//! Archive search.
//!
//! Resolves the names in a [`SearchQuery`] to ids, runs the message query,
//! and hides results from private channels the requester isn't a member of.

use archive_types::{Message, SearchQuery};
use tracing::debug;

use crate::Database;
use crate::error::DbError;
use crate::models::SqlValue;

impl Database {
    /// Whether `user_id` may read `channel_id`: public channels are open to
    /// everyone, private ones only to members. Unknown channels are closed.
    pub fn can_read_channel(&mut self, channel_id: &str, user_id: &str) -> Result<bool, DbError> {
        let rows = self
            .live()?
            .query("SELECT is_private FROM channels WHERE id = ?", &[channel_id.into()])?;
        let Some(row) = rows.first() else {
            return Ok(false);
        };
        if !row.get::<bool>(0)? {
            return Ok(true);
        }

        let rows = self.live()?.query(
            "SELECT COUNT(*) FROM members WHERE channel = ? AND user = ?",
            &[channel_id.into(), user_id.into()],
        )?;
        let count = match rows.first() {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count > 0)
    }

    /// Messages matching `query` that `requester` is allowed to see.
    ///
    /// The limit applies before the visibility filter, so fewer than
    /// `query.limit` messages may come back.
    pub fn search(&mut self, query: &SearchQuery, requester: &str) -> Result<Vec<Message>, DbError> {
        let mut sql =
            String::from("SELECT message, user, timestamp, channel FROM messages WHERE message LIKE ?");
        let mut args = vec![SqlValue::from(query.like_pattern())];

        if let Some(name) = &query.from {
            let user = self
                .user_id_by_name(name)?
                .ok_or_else(|| DbError::NotFound(format!("User {name} not found")))?;
            sql.push_str(" AND user = ?");
            args.push(user.into());
        }
        if let Some(name) = &query.channel {
            let channel = self.channel_id_by_name(name)?.ok_or_else(|| {
                DbError::NotFound(format!(
                    "Channel {name} not found. Either {name} does not exist or the archive is not a member of {name}."
                ))
            })?;
            sql.push_str(" AND channel = ?");
            args.push(channel.into());
        }
        if let Some(order) = query.sort {
            sql.push_str(" ORDER BY timestamp ");
            sql.push_str(order.as_sql());
        }

        debug!(sql = %sql, "search");
        self.query(&sql, args)?;

        let mut hits = Vec::new();
        for row in self.fetch_many(query.limit)? {
            let message = Message {
                message: row.get(0)?,
                user: row.get(1)?,
                timestamp: row.get(2)?,
                channel: row.get(3)?,
            };
            if self.can_read_channel(&message.channel, requester)? {
                hits.push(message);
            }
        }
        Ok(hits)
    }
}
