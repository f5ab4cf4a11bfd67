//! In-process document store implementing the driver traits.
//!
//! Useful for tests and for embedders that do not need persistence. Every
//! collection is a vector of documents tagged with an insertion sequence
//! number, which backs the `$natural` sort key.

use crate::driver::filter::{compare_values, lookup, SortDirection, SortField, SortKey};
use crate::driver::{
    ChangeInfo, Collection, Cursor, Database, Document, DriverError, DriverResult, Filter,
    IndexSpec, Query, Session,
};
use crate::model::record::{document_id, new_id, RecordId, ID_FIELD};
use log::debug;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type SharedCollection = Arc<Mutex<CollectionState>>;

#[derive(Debug, Default)]
struct CollectionState {
    docs: Vec<StoredDoc>,
    next_seq: u64,
    indexes: Vec<IndexSpec>,
}

#[derive(Debug, Clone)]
struct StoredDoc {
    seq: u64,
    doc: Document,
}

/// Session over a set of in-memory databases.
pub struct MemorySession {
    closed: Arc<AtomicBool>,
    databases: Mutex<HashMap<String, Arc<MemoryDatabase>>>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(false)),
            databases: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for MemorySession {
    fn database(&self, name: &str) -> Arc<dyn Database> {
        let mut databases = self.databases.lock();
        let database = databases.entry(name.to_string()).or_insert_with(|| {
            Arc::new(MemoryDatabase::with_flag(Arc::clone(&self.closed)))
        });
        Arc::clone(database) as Arc<dyn Database>
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        debug!("event=session_close module=driver backend=memory status=ok");
    }

    fn ping(&self) -> DriverResult<()> {
        ensure_open(&self.closed)
    }
}

/// A single in-memory database.
pub struct MemoryDatabase {
    closed: Arc<AtomicBool>,
    collections: Mutex<HashMap<String, SharedCollection>>,
}

impl MemoryDatabase {
    /// Creates a standalone database not owned by any session.
    #[must_use]
    pub fn new() -> Self {
        Self::with_flag(Arc::new(AtomicBool::new(false)))
    }

    fn with_flag(closed: Arc<AtomicBool>) -> Self {
        Self {
            closed,
            collections: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for MemoryDatabase {
    fn collection(&self, name: &str) -> Box<dyn Collection> {
        let state = Arc::clone(
            self.collections
                .lock()
                .entry(name.to_string())
                .or_default(),
        );
        Box::new(MemoryCollection {
            name: name.to_string(),
            closed: Arc::clone(&self.closed),
            state,
        })
    }
}

struct MemoryCollection {
    name: String,
    closed: Arc<AtomicBool>,
    state: SharedCollection,
}

impl MemoryCollection {
    fn query(&self, filter: Filter) -> Box<dyn Query> {
        Box::new(MemoryQuery {
            closed: Arc::clone(&self.closed),
            state: Arc::clone(&self.state),
            filter,
            sort: Vec::new(),
            limit: 0,
        })
    }
}

impl Collection for MemoryCollection {
    fn find(&self, filter: &Filter) -> Box<dyn Query> {
        self.query(filter.clone())
    }

    fn find_by_id(&self, id: RecordId) -> Box<dyn Query> {
        self.query(Filter::Id(id))
    }

    fn insert(&self, docs: &[Document]) -> DriverResult<()> {
        ensure_open(&self.closed)?;
        let mut state = self.state.lock();

        let mut pending: Vec<Document> = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut doc = doc.clone();
            if document_id(&doc).is_none() {
                doc.insert(ID_FIELD.to_string(), Value::String(new_id().to_string()));
            }
            check_unique(&self.name, &state, &pending, &doc)?;
            pending.push(doc);
        }

        for doc in pending {
            let seq = state.next_seq;
            state.next_seq += 1;
            state.docs.push(StoredDoc { seq, doc });
        }
        Ok(())
    }

    fn remove_all(&self, filter: &Filter) -> DriverResult<ChangeInfo> {
        ensure_open(&self.closed)?;
        filter.validate()?;
        let mut state = self.state.lock();
        let before = state.docs.len();
        state.docs.retain(|stored| !filter.matches(&stored.doc));
        Ok(ChangeInfo {
            removed: before - state.docs.len(),
        })
    }

    fn remove_by_id(&self, id: RecordId) -> DriverResult<ChangeInfo> {
        self.remove_all(&Filter::Id(id))
    }

    fn ensure_index(&self, index: &IndexSpec) -> DriverResult<()> {
        ensure_open(&self.closed)?;
        index.fields()?;
        let mut state = self.state.lock();
        if state.indexes.iter().any(|existing| existing.name() == index.name()) {
            return Ok(());
        }
        if index.unique {
            let mut seen: Vec<Vec<Option<Value>>> = Vec::new();
            for stored in &state.docs {
                let key = index_key(index, &stored.doc);
                if seen.contains(&key) {
                    return Err(duplicate(&self.name, index, &key));
                }
                seen.push(key);
            }
        }
        state.indexes.push(index.clone());
        Ok(())
    }
}

struct MemoryQuery {
    closed: Arc<AtomicBool>,
    state: SharedCollection,
    filter: Filter,
    sort: Vec<String>,
    limit: usize,
}

impl MemoryQuery {
    fn snapshot(&self) -> DriverResult<VecDeque<Document>> {
        ensure_open(&self.closed)?;
        self.filter.validate()?;
        let order = self
            .sort
            .iter()
            .map(|key| SortField::parse(key))
            .collect::<DriverResult<Vec<_>>>()?;

        let mut matched: Vec<StoredDoc> = self
            .state
            .lock()
            .docs
            .iter()
            .filter(|stored| self.filter.matches(&stored.doc))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            for field in &order {
                let ordering = match &field.key {
                    SortKey::Natural => a.seq.cmp(&b.seq),
                    SortKey::Field(path) => {
                        compare_values(lookup(&a.doc, path), lookup(&b.doc, path))
                    }
                };
                let ordering = match field.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });

        if self.limit > 0 {
            matched.truncate(self.limit);
        }
        Ok(matched.into_iter().map(|stored| stored.doc).collect())
    }
}

impl Query for MemoryQuery {
    fn sort(mut self: Box<Self>, fields: &[&str]) -> Box<dyn Query> {
        self.sort = fields.iter().map(|field| (*field).to_string()).collect();
        self
    }

    fn limit(mut self: Box<Self>, n: usize) -> Box<dyn Query> {
        self.limit = n;
        self
    }

    fn iterate(self: Box<Self>) -> Box<dyn Cursor> {
        match self.snapshot() {
            Ok(docs) => Box::new(MemoryCursor {
                docs,
                err: None,
                closed: false,
            }),
            Err(err) => Box::new(MemoryCursor {
                docs: VecDeque::new(),
                err: Some(err),
                closed: false,
            }),
        }
    }
}

struct MemoryCursor {
    docs: VecDeque<Document>,
    err: Option<DriverError>,
    closed: bool,
}

impl Cursor for MemoryCursor {
    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        self.docs.clear();
        Ok(())
    }

    fn done(&self) -> bool {
        self.closed || self.docs.is_empty()
    }

    fn advance(&mut self, into: &mut Document) -> bool {
        if self.closed {
            return false;
        }
        match self.docs.pop_front() {
            Some(doc) => {
                *into = doc;
                true
            }
            None => false,
        }
    }

    fn take_err(&mut self) -> Option<DriverError> {
        self.err.take()
    }
}

fn ensure_open(closed: &AtomicBool) -> DriverResult<()> {
    if closed.load(Ordering::SeqCst) {
        Err(DriverError::SessionClosed)
    } else {
        Ok(())
    }
}

fn check_unique(
    collection: &str,
    state: &CollectionState,
    pending: &[Document],
    doc: &Document,
) -> DriverResult<()> {
    let id = document_id(doc);
    let stored = state.docs.iter().map(|stored| &stored.doc);
    if stored
        .clone()
        .chain(pending.iter())
        .any(|existing| document_id(existing) == id)
    {
        return Err(DriverError::DuplicateKey {
            collection: collection.to_string(),
            key: format!("{ID_FIELD}: {}", id.map(|id| id.to_string()).unwrap_or_default()),
        });
    }

    for index in state.indexes.iter().filter(|index| index.unique) {
        let key = index_key(index, doc);
        if stored
            .clone()
            .chain(pending.iter())
            .any(|existing| index_key(index, existing) == key)
        {
            return Err(duplicate(collection, index, &key));
        }
    }
    Ok(())
}

fn index_key(index: &IndexSpec, doc: &Document) -> Vec<Option<Value>> {
    index
        .keys
        .iter()
        .map(|key| {
            let path = key.trim().trim_start_matches(['-', '+']);
            lookup(doc, path).cloned()
        })
        .collect()
}

fn duplicate(collection: &str, index: &IndexSpec, key: &[Option<Value>]) -> DriverError {
    let values = key
        .iter()
        .map(|value| value.as_ref().map_or_else(|| "null".to_string(), Value::to_string))
        .collect::<Vec<_>>()
        .join(", ");
    DriverError::DuplicateKey {
        collection: collection.to_string(),
        key: format!("{}: {values}", index.name()),
    }
}
