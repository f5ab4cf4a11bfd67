//! Log entry repository.

use crate::driver::{Database, DriverResult, Filter, IndexSpec};
use crate::model::log_entry::{LogEntry, LogId, LOG_COLLECTION};
use crate::repo::record_repo::Repository;
use crate::repo::stream::ResultStream;
use std::sync::Arc;

/// Types giving asynchronous access to stored log entries.
pub trait LogAccessor: Send + Sync {
    /// Streams log entries matching `filter`, newest first. `limit == 0`
    /// returns all of them.
    fn get_logs(&self, filter: Filter, limit: usize) -> ResultStream<LogEntry>;

    fn get_log_by_id(&self, id: LogId) -> ResultStream<LogEntry>;

    fn save_log(&self, entry: LogEntry) -> ResultStream<LogEntry>;
}

/// Driver-backed `LogAccessor`.
#[derive(Clone)]
pub struct LogRepository {
    db: Arc<dyn Database>,
    records: Repository<LogEntry>,
}

impl LogRepository {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            records: Repository::new(Arc::clone(&db)),
            db,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.records = self.records.with_capacity(capacity);
        self
    }

    /// Creates the timestamp index on the `logs` collection.
    ///
    /// Synchronous; call it at startup, outside latency-sensitive paths.
    pub fn ensure_indexes(&self) -> DriverResult<()> {
        self.db
            .collection(LOG_COLLECTION)
            .ensure_index(&IndexSpec::new(["ts"]))
    }
}

impl LogAccessor for LogRepository {
    fn get_logs(&self, filter: Filter, limit: usize) -> ResultStream<LogEntry> {
        self.records.find_many(filter, limit)
    }

    fn get_log_by_id(&self, id: LogId) -> ResultStream<LogEntry> {
        self.records.find_by_id(id)
    }

    fn save_log(&self, entry: LogEntry) -> ResultStream<LogEntry> {
        self.records.save(entry)
    }
}
