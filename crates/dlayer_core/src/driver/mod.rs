//! Storage driver capability traits.
//!
//! # Responsibility
//! - Hide the concrete storage client behind `Session`/`Database`/
//!   `Collection`/`Query`/`Cursor` so repositories never name a backend.
//! - Define the vocabulary shared by every backend: documents, filters,
//!   sort keys, index specs and driver errors.
//!
//! # Invariants
//! - `Query` calls have no side effect on the store until `iterate`.
//! - Sort and limit apply before iteration begins; a limit of 0 is unbounded.
//! - Shared handles (`Session`, `Database`, `Collection`) are safe to use from
//!   several tasks at once; a `Cursor` belongs to one task.
//!
//! ```text
//!  Session ──database(name)──▶ Database ──collection(name)──▶ Collection
//!                                                              │
//!                                         find / find_by_id ───┘
//!                                                 ▼
//!                                   Query ─sort─▶ Query ─limit─▶ Query
//!                                                 │ iterate
//!                                                 ▼
//!                                               Cursor
//! ```

use crate::db::DbError;
use crate::model::record::RecordId;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod filter;
pub mod memory;
pub mod sqlite;

pub use filter::{Filter, IndexSpec, SortDirection, SortField};

/// Schemaless record as stored by a driver.
pub type Document = Map<String, Value>;

pub type DriverResult<T> = Result<T, DriverError>;

/// Errors raised by storage drivers.
#[derive(Debug)]
pub enum DriverError {
    /// SQLite transport or schema failure.
    Db(DbError),
    /// A stored document could not be decoded into a record (or encoded).
    Decode(serde_json::Error),
    /// Insert would violate the primary key or a unique index.
    DuplicateKey { collection: String, key: String },
    /// Sort key, filter field or index key is not a valid field path.
    InvalidField(String),
    /// The session was closed before or during the call.
    SessionClosed,
    /// Free-form failure reported by another backend.
    Backend(String),
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Decode(err) => write!(f, "document decode failed: {err}"),
            Self::DuplicateKey { collection, key } => {
                write!(f, "duplicate key `{key}` in collection `{collection}`")
            }
            Self::InvalidField(field) => write!(f, "invalid field path `{field}`"),
            Self::SessionClosed => write!(f, "session is closed"),
            Self::Backend(message) => write!(f, "{message}"),
        }
    }
}

impl Error for DriverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::DuplicateKey { .. }
            | Self::InvalidField(_)
            | Self::SessionClosed
            | Self::Backend(_) => None,
        }
    }
}

impl From<DbError> for DriverError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value)
    }
}

/// Outcome of a remove operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeInfo {
    pub removed: usize,
}

/// Iteration handle over a query's result set.
///
/// Must be closed exactly once. Repositories wrap it in a guard that closes
/// it on drop.
pub trait Cursor: Send {
    fn close(&mut self) -> DriverResult<()>;

    /// Returns `true` when a following `advance` is guaranteed to fail.
    fn done(&self) -> bool;

    /// Decodes the next document into `into`.
    ///
    /// Returns `false` when the set is exhausted or on error; check
    /// `take_err` afterwards.
    fn advance(&mut self, into: &mut Document) -> bool;

    /// Takes the terminal error, meaningful once `advance` returned `false`
    /// or `done` reported `true`. Later calls return `None`.
    fn take_err(&mut self) -> Option<DriverError>;
}

/// Lazily evaluated query builder.
pub trait Query: Send {
    fn sort(self: Box<Self>, fields: &[&str]) -> Box<dyn Query>;

    fn limit(self: Box<Self>, n: usize) -> Box<dyn Query>;

    fn iterate(self: Box<Self>) -> Box<dyn Cursor>;
}

pub trait Collection: Send + Sync {
    fn find(&self, filter: &Filter) -> Box<dyn Query>;

    fn find_by_id(&self, id: RecordId) -> Box<dyn Query>;

    fn insert(&self, docs: &[Document]) -> DriverResult<()>;

    fn remove_all(&self, filter: &Filter) -> DriverResult<ChangeInfo>;

    /// Removing an id that is not stored succeeds with `removed == 0`.
    fn remove_by_id(&self, id: RecordId) -> DriverResult<ChangeInfo>;

    fn ensure_index(&self, index: &IndexSpec) -> DriverResult<()>;
}

pub trait Database: Send + Sync {
    fn collection(&self, name: &str) -> Box<dyn Collection>;
}

pub trait Session: Send + Sync {
    fn database(&self, name: &str) -> Arc<dyn Database>;

    /// Releases the underlying client. Later calls fail with `SessionClosed`.
    fn close(&self);

    fn ping(&self) -> DriverResult<()>;
}
