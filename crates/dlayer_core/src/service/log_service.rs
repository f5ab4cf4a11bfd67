//! Log use-case service.
//!
//! # Invariants
//! - Query-value errors surface before any repository task is spawned.
//! - The service never talks to a driver directly.

use crate::driver::Filter;
use crate::model::log_entry::{LogEntry, LogId, QueryValueError};
use crate::repo::log_repo::LogAccessor;
use crate::repo::stream::ResultStream;
use chrono::SecondsFormat;
use serde_json::Value;
use std::collections::HashMap;

/// Use-case wrapper over a `LogAccessor`.
pub struct LogService<A: LogAccessor> {
    accessor: A,
}

impl<A: LogAccessor> LogService<A> {
    pub fn new(accessor: A) -> Self {
        Self { accessor }
    }

    /// Saves a new entry stamped with the current time.
    pub fn record(&self, entry: impl Into<Value>) -> ResultStream<LogEntry> {
        self.accessor.save_log(LogEntry::new(entry))
    }

    /// Saves `entry` as given, replacing any entry with the same id.
    pub fn save(&self, entry: LogEntry) -> ResultStream<LogEntry> {
        self.accessor.save_log(entry)
    }

    pub fn get(&self, id: LogId) -> ResultStream<LogEntry> {
        self.accessor.get_log_by_id(id)
    }

    /// Newest entries first; `limit == 0` streams everything.
    pub fn recent(&self, limit: usize) -> ResultStream<LogEntry> {
        self.accessor.get_logs(Filter::All, limit)
    }

    /// Streams entries selected by query-string values (`id`, `ts`).
    ///
    /// # Errors
    /// Returns `QueryValueError` synchronously when a value is malformed.
    pub fn search(
        &self,
        values: &HashMap<String, String>,
        limit: usize,
    ) -> Result<ResultStream<LogEntry>, QueryValueError> {
        let filter = log_filter(values)?;
        Ok(self.accessor.get_logs(filter, limit))
    }
}

/// Builds a log filter from query-string values.
pub fn log_filter(values: &HashMap<String, String>) -> Result<Filter, QueryValueError> {
    let mut probe = LogEntry::default();
    probe.from_query_values(values)?;

    let filter = probe.id.map_or(Filter::All, Filter::Id);
    Ok(match probe.ts {
        // Same text form serde uses when the entry is stored.
        Some(ts) => filter.field("ts", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        None => filter,
    })
}
