//! Shared types for the chat archive: the rows the archive stores and the
//! grammar users type when they search it.

pub mod models;
pub mod search;

pub use models::{ArchiveDump, Channel, Member, Message, User};
pub use search::{SearchParseError, SearchQuery, SortOrder};
