//! Scriptable fake driver shared by integration tests.
//!
//! Every handle shares one `FakeState`; counters record how often the
//! repository touched the cursor and the collection.

#![allow(dead_code)]

use dlayer_core::driver::{
    ChangeInfo, Collection, Cursor, Database, Document, DriverError, DriverResult, Filter,
    IndexSpec, Query,
};
use dlayer_core::model::record::{document_id, RecordId, ID_FIELD};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct FakeState {
    /// Documents in storage order.
    pub docs: Vec<Document>,
    /// Error reported once the cursor runs out of documents.
    pub cursor_error: Option<String>,
    pub insert_error: Option<String>,
    pub remove_error: Option<String>,
    pub last_sort: Vec<String>,
    pub last_limit: Option<usize>,
    pub last_filter: Option<Filter>,
    pub collections: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub closes: Arc<AtomicUsize>,
    pub advances: Arc<AtomicUsize>,
    pub inserts: Arc<AtomicUsize>,
    pub removes: Arc<AtomicUsize>,
}

impl Counters {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn advances(&self) -> usize {
        self.advances.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    pub state: Arc<Mutex<FakeState>>,
    pub counters: Counters,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_docs(docs: Vec<Document>) -> Self {
        let driver = Self::default();
        driver.state.lock().docs = docs;
        driver
    }

    pub fn database(&self) -> Arc<dyn Database> {
        Arc::new(self.clone())
    }

    pub fn set_cursor_error(&self, message: &str) {
        self.state.lock().cursor_error = Some(message.to_string());
    }

    pub fn set_insert_error(&self, message: &str) {
        self.state.lock().insert_error = Some(message.to_string());
    }

    pub fn set_remove_error(&self, message: &str) {
        self.state.lock().remove_error = Some(message.to_string());
    }

    pub fn stored_ids(&self) -> Vec<RecordId> {
        self.state.lock().docs.iter().filter_map(document_id).collect()
    }

    /// Waits up to one second for the cursor to be closed `expected` times.
    pub async fn wait_for_closes(&self, expected: usize) -> usize {
        for _ in 0..100 {
            if self.counters.closes() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.counters.closes()
    }
}

impl Database for FakeDriver {
    fn collection(&self, name: &str) -> Box<dyn Collection> {
        self.state.lock().collections.push(name.to_string());
        Box::new(self.clone())
    }
}

impl Collection for FakeDriver {
    fn find(&self, filter: &Filter) -> Box<dyn Query> {
        self.state.lock().last_filter = Some(filter.clone());
        Box::new(FakeQuery {
            driver: self.clone(),
            filter: filter.clone(),
            limit: 0,
        })
    }

    fn find_by_id(&self, id: RecordId) -> Box<dyn Query> {
        self.find(&Filter::Id(id))
    }

    fn insert(&self, docs: &[Document]) -> DriverResult<()> {
        self.counters.inserts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if let Some(message) = &state.insert_error {
            return Err(DriverError::Backend(message.clone()));
        }
        state.docs.extend(docs.iter().cloned());
        Ok(())
    }

    fn remove_all(&self, filter: &Filter) -> DriverResult<ChangeInfo> {
        self.counters.removes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if let Some(message) = &state.remove_error {
            return Err(DriverError::Backend(message.clone()));
        }
        let before = state.docs.len();
        state.docs.retain(|doc| !filter.matches(doc));
        Ok(ChangeInfo {
            removed: before - state.docs.len(),
        })
    }

    fn remove_by_id(&self, id: RecordId) -> DriverResult<ChangeInfo> {
        self.remove_all(&Filter::Id(id))
    }

    fn ensure_index(&self, _index: &IndexSpec) -> DriverResult<()> {
        Ok(())
    }
}

struct FakeQuery {
    driver: FakeDriver,
    filter: Filter,
    limit: usize,
}

impl Query for FakeQuery {
    fn sort(self: Box<Self>, fields: &[&str]) -> Box<dyn Query> {
        self.driver.state.lock().last_sort = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    fn limit(mut self: Box<Self>, n: usize) -> Box<dyn Query> {
        self.driver.state.lock().last_limit = Some(n);
        self.limit = n;
        self
    }

    fn iterate(self: Box<Self>) -> Box<dyn Cursor> {
        let state = self.driver.state.lock();
        let mut docs: VecDeque<Document> = state
            .docs
            .iter()
            .filter(|doc| self.filter.matches(doc))
            .cloned()
            .collect();
        if self.limit > 0 {
            docs.truncate(self.limit);
        }
        let pending_error = state.cursor_error.clone();
        drop(state);

        Box::new(FakeCursor {
            docs,
            pending_error,
            err: None,
            counters: self.driver.counters.clone(),
        })
    }
}

struct FakeCursor {
    docs: VecDeque<Document>,
    pending_error: Option<String>,
    err: Option<DriverError>,
    counters: Counters,
}

impl Cursor for FakeCursor {
    fn close(&mut self) -> DriverResult<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn done(&self) -> bool {
        self.docs.is_empty()
    }

    fn advance(&mut self, into: &mut Document) -> bool {
        match self.docs.pop_front() {
            Some(doc) => {
                self.counters.advances.fetch_add(1, Ordering::SeqCst);
                *into = doc;
                true
            }
            None => {
                if let Some(message) = self.pending_error.take() {
                    self.err = Some(DriverError::Backend(message));
                }
                false
            }
        }
    }

    fn take_err(&mut self) -> Option<DriverError> {
        if let Some(message) = self.pending_error.take() {
            return Some(DriverError::Backend(message));
        }
        self.err.take()
    }
}

/// Stored log document with the given id and payload.
pub fn log_doc(id: RecordId, entry: Value) -> Document {
    let mut doc = Document::new();
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    doc.insert("ts".to_string(), json!("2024-03-01T10:00:00+01:00"));
    doc.insert("entry".to_string(), entry);
    doc
}
