use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
}

/// A (channel, user) membership row. The archive keeps duplicates as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub channel: String,
    pub user: String,
}

/// An archived chat message.
///
/// `timestamp` is kept exactly as the chat platform sent it
/// (`"<seconds>.<micros>"`); together with `channel` it identifies the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
    pub user: String,
    pub channel: String,
    pub timestamp: String,
}

impl Message {
    /// Parse the platform timestamp into a UTC instant.
    /// Returns `None` for anything that is not `<seconds>[.<fraction>]`.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        let (secs, frac) = match self.timestamp.split_once('.') {
            Some((secs, frac)) => (secs, frac),
            None => (self.timestamp.as_str(), ""),
        };
        let secs: i64 = secs.parse().ok()?;

        let nanos = if frac.is_empty() {
            0
        } else {
            if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let digits: u32 = frac.parse().ok()?;
            digits * 10u32.pow(9 - frac.len() as u32)
        };

        DateTime::from_timestamp(secs, nanos)
    }
}

/// A full export of an archive, used for bulk imports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveDump {
    pub users: Vec<User>,
    pub channels: Vec<Channel>,
    pub members: Vec<Member>,
    pub messages: Vec<Message>,
}
