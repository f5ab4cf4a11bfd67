//! Log entry record.
//!
//! # Invariants
//! - `ts` compares by instant; an unset timestamp never equals a set one.
//! - Query-value parsing fails synchronously and leaves fields it could not
//!   parse untouched.

use crate::model::record::{Record, RecordId};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Collection holding log entries.
pub const LOG_COLLECTION: &str = "logs";

const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Identifier of a stored log entry.
pub type LogId = RecordId;

/// One entry in the log store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LogId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<FixedOffset>>,
    /// Arbitrary embedded payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<Value>,
}

impl LogEntry {
    /// Creates an unsaved entry stamped with the current local time.
    pub fn new(entry: impl Into<Value>) -> Self {
        Self {
            id: None,
            ts: Some(Local::now().into()),
            entry: Some(entry.into()),
        }
    }

    /// Populates `id` and `ts` from query-string values.
    ///
    /// - `id`: hyphenated or simple UUID text.
    /// - `ts`: `YYYY-MM-DD`, interpreted as local midnight.
    ///
    /// Empty values are ignored.
    pub fn from_query_values(
        &mut self,
        values: &HashMap<String, String>,
    ) -> Result<(), QueryValueError> {
        if let Some(raw) = non_empty(values, "id") {
            let id = Uuid::parse_str(raw).map_err(|source| QueryValueError::InvalidId {
                value: raw.to_string(),
                source,
            })?;
            self.id = Some(id);
        }

        if let Some(raw) = non_empty(values, "ts") {
            self.ts = Some(parse_local_date(raw)?);
        }

        Ok(())
    }
}

impl Record for LogEntry {
    const COLLECTION: &'static str = LOG_COLLECTION;

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }
}

impl Display for LogEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serde_json::to_string(self).unwrap_or_default())
    }
}

/// Error returned when query-string values cannot populate a record.
#[derive(Debug)]
pub enum QueryValueError {
    InvalidId {
        value: String,
        source: uuid::Error,
    },
    InvalidDate {
        value: String,
        source: chrono::ParseError,
    },
    /// The date has no representable local midnight (e.g. a DST gap).
    NonexistentLocalTime(String),
}

impl Display for QueryValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId { value, source } => write!(f, "invalid id `{value}`: {source}"),
            Self::InvalidDate { value, source } => {
                write!(f, "invalid date `{value}`, expected YYYY-MM-DD: {source}")
            }
            Self::NonexistentLocalTime(value) => {
                write!(f, "date `{value}` has no local midnight")
            }
        }
    }
}

impl Error for QueryValueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidId { source, .. } => Some(source),
            Self::InvalidDate { source, .. } => Some(source),
            Self::NonexistentLocalTime(_) => None,
        }
    }
}

/// Parses `YYYY-MM-DD` into local midnight.
pub fn parse_local_date(raw: &str) -> Result<DateTime<FixedOffset>, QueryValueError> {
    let date = NaiveDate::parse_from_str(raw, QUERY_DATE_FORMAT).map_err(|source| {
        QueryValueError::InvalidDate {
            value: raw.to_string(),
            source,
        }
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| QueryValueError::NonexistentLocalTime(raw.to_string()))?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(Into::into)
        .ok_or_else(|| QueryValueError::NonexistentLocalTime(raw.to_string()))
}

fn non_empty<'a>(values: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    values
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}
