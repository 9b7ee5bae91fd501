//! Search grammar for archive queries.
//!
//! ```text
//! <text> from:<user> in:<channel> sort:asc|desc limit:<number>
//! ```
//!
//! Input is lower-cased and split on whitespace. `:emoji:` tokens count as
//! search text. `from:` and `in:` hold *names*; resolving them to ids is up
//! to the caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = SearchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(SearchParseError::InvalidSort(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchParseError {
    #[error("Invalid sort order {0}")]
    InvalidSort(String),

    #[error("{0} not a valid number")]
    InvalidLimit(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    /// User *name* to restrict to.
    pub from: Option<String>,
    /// Channel *name* to restrict to.
    pub channel: Option<String>,
    pub sort: Option<SortOrder>,
    pub limit: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            from: None,
            channel: None,
            sort: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchQuery {
    pub fn parse(input: &str) -> Result<Self, SearchParseError> {
        let mut query = SearchQuery::default();
        let mut text = Vec::new();

        for token in input.to_lowercase().split_whitespace() {
            if is_emoji(token) {
                text.push(token.to_string());
                continue;
            }

            // Tokens with a colon are filters; unknown keys and tokens with
            // more than one colon are dropped.
            let parts: Vec<&str> = token.split(':').collect();
            match parts.as_slice() {
                [word] => text.push(word.to_string()),
                ["from", name] => {
                    query.from = Some(name.trim_start_matches('@').to_string());
                }
                ["in", name] => {
                    query.channel = Some(name.trim_start_matches('#').to_string());
                }
                ["sort", order] => query.sort = Some(order.parse()?),
                ["limit", n] => {
                    query.limit = n
                        .parse()
                        .map_err(|_| SearchParseError::InvalidLimit(n.to_string()))?;
                }
                _ => {}
            }
        }

        query.text = text.join(" ");
        Ok(query)
    }

    /// `LIKE` pattern matching the search text anywhere in a message.
    pub fn like_pattern(&self) -> String {
        format!("%{}%", self.text)
    }
}

fn is_emoji(token: &str) -> bool {
    token.len() > 2 && token.starts_with(':') && token.ends_with(':')
}
