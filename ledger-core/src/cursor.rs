//! Cursor pagination (C6): an opaque, base-64 resumption token over a
//! stable secondary sort key. Journals sort by (journal_date DESC,
//! created_at DESC); transactions-by-account sort by (journal_date
//! DESC, transaction created_at DESC) — both shapes encode to the
//! same token format, so one codec serves both listings.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::Error;

/// The decoded (date, created_at) pair a cursor resumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Cursor {
    pub fn new(date: DateTime<Utc>, created_at: DateTime<Utc>) -> Self {
        Self { date, created_at }
    }

    /// Encode as "`<date-RFC3339Nano>|<created_at-RFC3339Nano>`", then
    /// standard base-64.
    pub fn encode(&self) -> String {
        let raw = format!(
            "{}|{}",
            self.date.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        );
        BASE64.encode(raw)
    }

    /// Decode a token produced by `encode`. Any malformed token — bad
    /// base-64, missing separator, unparsable timestamp — is a
    /// Validation error; the server never silently resets pagination.
    pub fn decode(token: &str) -> Result<Self, Error> {
        let raw = BASE64
            .decode(token)
            .map_err(|e| Error::Validation(format!("invalid cursor encoding: {e}")))?;
        let raw = String::from_utf8(raw)
            .map_err(|e| Error::Validation(format!("invalid cursor bytes: {e}")))?;
        let (date_part, created_part) = raw
            .split_once('|')
            .ok_or_else(|| Error::Validation("invalid cursor: missing separator".to_string()))?;
        let date = DateTime::parse_from_rfc3339(date_part)
            .map_err(|e| Error::Validation(format!("invalid cursor date: {e}")))?
            .with_timezone(&Utc);
        let created_at = DateTime::parse_from_rfc3339(created_part)
            .map_err(|e| Error::Validation(format!("invalid cursor created_at: {e}")))?
            .with_timezone(&Utc);
        Ok(Cursor { date, created_at })
    }
}

/// A page of results plus an optional cursor for the next page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Given up to `limit + 1` rows already sorted by the listing's sort
/// key, split into the page to return and the next cursor, dropping
/// the lookahead row. `key_of` extracts the (date, created_at) pair
/// used to build the cursor token.
pub fn paginate<T>(
    mut rows: Vec<T>,
    limit: usize,
    key_of: impl Fn(&T) -> (DateTime<Utc>, DateTime<Utc>),
) -> Page<T> {
    if rows.len() > limit {
        rows.truncate(limit);
        let next_cursor = rows.last().map(|row| {
            let (date, created_at) = key_of(row);
            Cursor::new(date, created_at).encode()
        });
        Page {
            items: rows,
            next_cursor,
        }
    } else {
        Page {
            items: rows,
            next_cursor: None,
        }
    }
}
