//! Asynchronous, driver-agnostic data access.
//!
//! Repositories turn entity operations into tasks that stream `OpResult`
//! envelopes back over a bounded channel, while the storage backend stays
//! behind the `driver` traits so it can be swapped for a fake.

pub mod config;
pub mod db;
pub mod driver;
pub mod envelope;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use driver::memory::{MemoryDatabase, MemorySession};
pub use driver::sqlite::SqliteSession;
pub use driver::{
    ChangeInfo, Collection, Cursor, Database, Document, DriverError, DriverResult, Filter,
    IndexSpec, Query, Session,
};
pub use envelope::{AccessError, OpResult, StatusError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::log_entry::{LogEntry, LogId, QueryValueError};
pub use model::record::{Record, RecordId};
pub use repo::log_repo::{LogAccessor, LogRepository};
pub use repo::record_repo::{Repository, DEFAULT_STREAM_CAPACITY};
pub use repo::stream::ResultStream;
pub use service::info::ServiceInfo;
pub use service::log_service::LogService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
