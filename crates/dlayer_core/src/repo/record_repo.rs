//! Generic asynchronous repository for any `Record` type.
//!
//! # Invariants
//! - `find_many` sorts newest first (`-$natural`) and only applies a limit
//!   when it is positive.
//! - `save` is an upsert by replace: remove any stored record with the same
//!   id, then insert. The insert is skipped when the removal fails.

use crate::driver::{Cursor, Database, Document, DriverError, Filter};
use crate::envelope::{AccessError, OpResult};
use crate::model::record::{new_id, valid_id, Record, RecordId};
use crate::repo::stream::ResultStream;
use log::{debug, info, warn};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Default number of results buffered before the producer blocks.
pub const DEFAULT_STREAM_CAPACITY: usize = 256;

/// Sort key for most-recently-inserted first.
pub const NEWEST_FIRST: &str = "-$natural";

/// Asynchronous accessor for records of type `R`.
///
/// Operations must be called from within a Tokio runtime.
pub struct Repository<R> {
    db: Arc<dyn Database>,
    capacity: usize,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            capacity: self.capacity,
            _record: PhantomData,
        }
    }
}

impl<R: Record> Repository<R> {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            capacity: DEFAULT_STREAM_CAPACITY,
            _record: PhantomData,
        }
    }

    /// Overrides the stream buffer size (minimum 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Streams every record matching `filter`, newest first.
    ///
    /// Emits one not-found error when nothing matches, one value per record
    /// otherwise, and a trailing error if the cursor fails.
    pub fn find_many(&self, filter: Filter, limit: usize) -> ResultStream<R> {
        self.spawn("find_many", move |db, emitter| {
            let mut query = db
                .collection(R::COLLECTION)
                .find(&filter)
                .sort(&[NEWEST_FIRST]);
            if limit > 0 {
                query = query.limit(limit);
            }

            let mut cursor = CursorGuard::new(query.iterate());
            if cursor.done() {
                emitter.fail(empty_cursor_error(&mut cursor));
                return;
            }

            let mut slot = Document::new();
            while cursor.advance(&mut slot) {
                match R::from_document(std::mem::take(&mut slot)) {
                    Ok(record) => {
                        if !emitter.emit(OpResult::from_value(record)) {
                            return;
                        }
                    }
                    Err(err) => {
                        emitter.fail(err.into());
                        return;
                    }
                }
            }

            if let Some(err) = cursor.take_err() {
                emitter.fail(err.into());
            }
        })
    }

    /// Streams the single record stored under `id`, or one not-found error.
    pub fn find_by_id(&self, id: RecordId) -> ResultStream<R> {
        self.spawn("find_by_id", move |db, emitter| {
            let mut cursor = CursorGuard::new(db.collection(R::COLLECTION).find_by_id(id).iterate());
            if cursor.done() {
                emitter.fail(empty_cursor_error(&mut cursor));
                return;
            }

            let mut slot = Document::new();
            if !cursor.advance(&mut slot) {
                emitter.fail(empty_cursor_error(&mut cursor));
                return;
            }

            match R::from_document(slot) {
                Ok(record) => {
                    emitter.emit(OpResult::from_value(record));
                }
                Err(err) => emitter.fail(err.into()),
            }
        })
    }

    /// Persists `record`, assigning an id when it has none.
    ///
    /// Emits the saved record (with its id) or a single error.
    pub fn save(&self, mut record: R) -> ResultStream<R> {
        self.spawn("save", move |db, emitter| {
            let existing = valid_id(record.id());
            if existing.is_none() {
                record.set_id(new_id());
            }

            let doc = match record.to_document() {
                Ok(doc) => doc,
                Err(err) => {
                    emitter.fail(err.into());
                    return;
                }
            };

            let collection = db.collection(R::COLLECTION);
            if let Some(id) = existing {
                if let Err(err) = collection.remove_by_id(id) {
                    emitter.fail(err.into());
                    return;
                }
            }
            if let Err(err) = collection.insert(&[doc]) {
                emitter.fail(err.into());
                return;
            }

            emitter.emit(OpResult::from_value(record));
        })
    }

    fn spawn<F>(&self, op: &'static str, task: F) -> ResultStream<R>
    where
        F: FnOnce(&dyn Database, &mut Emitter<R>) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.capacity);
        let db = Arc::clone(&self.db);

        tokio::task::spawn_blocking(move || {
            let started_at = Instant::now();
            debug!(
                "event=repo_op module=repo op={op} collection={} status=start",
                R::COLLECTION
            );

            let mut emitter = Emitter {
                tx,
                op,
                emitted: 0,
                failed: false,
                abandoned: false,
            };
            task(db.as_ref(), &mut emitter);

            if !emitter.abandoned {
                debug!(
                    "event=repo_op module=repo op={op} collection={} status={} emitted={} duration_ms={}",
                    R::COLLECTION,
                    if emitter.failed { "error" } else { "ok" },
                    emitter.emitted,
                    started_at.elapsed().as_millis()
                );
            }
        });

        ResultStream::new(rx)
    }
}

/// Producer side of a result stream.
struct Emitter<R> {
    tx: mpsc::Sender<OpResult<R>>,
    op: &'static str,
    emitted: usize,
    failed: bool,
    abandoned: bool,
}

impl<R: Record> Emitter<R> {
    /// Sends one result, blocking while the buffer is full.
    ///
    /// Returns `false` once the consumer has gone away.
    fn emit(&mut self, result: OpResult<R>) -> bool {
        if self.tx.blocking_send(result).is_err() {
            self.abandoned = true;
            info!(
                "event=repo_op module=repo op={} collection={} status=abandoned emitted={}",
                self.op,
                R::COLLECTION,
                self.emitted
            );
            return false;
        }
        self.emitted += 1;
        true
    }

    fn fail(&mut self, err: AccessError) {
        self.failed = true;
        if err.is_not_found() {
            debug!(
                "event=repo_op module=repo op={} collection={} status=not_found",
                self.op,
                R::COLLECTION
            );
        } else {
            warn!(
                "event=repo_op module=repo op={} collection={} status=error error_code={} error={}",
                self.op,
                R::COLLECTION,
                err.code(),
                err
            );
        }
        self.emit(OpResult::from_error(err));
    }
}

/// Owns a cursor and closes it when dropped.
struct CursorGuard {
    cursor: Box<dyn Cursor>,
}

impl CursorGuard {
    fn new(cursor: Box<dyn Cursor>) -> Self {
        Self { cursor }
    }
}

impl Deref for CursorGuard {
    type Target = dyn Cursor;

    fn deref(&self) -> &Self::Target {
        self.cursor.as_ref()
    }
}

impl DerefMut for CursorGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.cursor.as_mut()
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        if let Err(err) = self.cursor.close() {
            warn!("event=cursor_close module=repo status=error error={err}");
        }
    }
}

/// Error for a cursor that produced nothing: its terminal error if any,
/// otherwise not found.
fn empty_cursor_error(cursor: &mut CursorGuard) -> AccessError {
    cursor
        .take_err()
        .map_or_else(AccessError::not_found, |err: DriverError| err.into())
}
