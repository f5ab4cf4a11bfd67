//! SQLite-backed document store implementing the driver traits.
//!
//! # Responsibility
//! - Persist documents as JSON rows in the `documents` table.
//! - Translate filters, sort keys and limits into SQL before iteration.
//!
//! # Invariants
//! - All handles of one session share a single connection behind a mutex.
//! - Field paths are validated before they are interpolated into SQL.
//! - Cursors buffer raw bodies at `iterate` and decode lazily in `advance`.

use crate::db::migrations::apply_migrations;
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::driver::filter::{SortDirection, SortField, SortKey};
use crate::driver::{
    ChangeInfo, Collection, Cursor, Database, Document, DriverError, DriverResult, Filter,
    IndexSpec, Query, Session,
};
use crate::model::record::{document_id, new_id, RecordId, ID_FIELD};
use log::{debug, warn};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// Session owning one SQLite connection.
pub struct SqliteSession {
    conn: SharedConnection,
}

impl SqliteSession {
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::wrap(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::wrap(open_db_in_memory()?))
    }

    /// Adopts an existing connection, applying pending migrations first.
    pub fn from_connection(mut conn: Connection) -> DbResult<Self> {
        apply_migrations(&mut conn)?;
        Ok(Self::wrap(conn))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }
}

impl Session for SqliteSession {
    fn database(&self, name: &str) -> Arc<dyn Database> {
        Arc::new(SqliteDatabase {
            conn: Arc::clone(&self.conn),
            name: name.to_string(),
        })
    }

    fn close(&self) {
        if let Some(conn) = self.conn.lock().take() {
            if let Err((_, err)) = conn.close() {
                warn!("event=session_close module=driver backend=sqlite status=error error={err}");
                return;
            }
        }
        debug!("event=session_close module=driver backend=sqlite status=ok");
    }

    fn ping(&self) -> DriverResult<()> {
        with_conn(&self.conn, |conn| {
            conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}

struct SqliteDatabase {
    conn: SharedConnection,
    name: String,
}

impl Database for SqliteDatabase {
    fn collection(&self, name: &str) -> Box<dyn Collection> {
        Box::new(SqliteCollection {
            conn: Arc::clone(&self.conn),
            db_name: self.name.clone(),
            name: name.to_string(),
        })
    }
}

struct SqliteCollection {
    conn: SharedConnection,
    db_name: String,
    name: String,
}

impl SqliteCollection {
    fn query(&self, filter: Filter) -> Box<dyn Query> {
        Box::new(SqliteQuery {
            conn: Arc::clone(&self.conn),
            db_name: self.db_name.clone(),
            collection: self.name.clone(),
            filter,
            sort: Vec::new(),
            limit: 0,
        })
    }

    fn index_sql(&self, index: &IndexSpec) -> DriverResult<String> {
        let columns = index
            .fields()?
            .iter()
            .map(|field| format!("{} {}", order_expr(field), direction_sql(field.direction)))
            .collect::<Vec<_>>()
            .join(", ");
        let index_name = sanitize_identifier(&format!(
            "idx_{}_{}_{}",
            self.db_name,
            self.name,
            index.name()
        ));

        Ok(format!(
            "CREATE {unique}INDEX IF NOT EXISTS \"{index_name}\" ON documents ({columns}) \
             WHERE db_name = {db} AND collection = {collection};",
            unique = if index.unique { "UNIQUE " } else { "" },
            db = quote_literal(&self.db_name),
            collection = quote_literal(&self.name),
        ))
    }
}

impl Collection for SqliteCollection {
    fn find(&self, filter: &Filter) -> Box<dyn Query> {
        self.query(filter.clone())
    }

    fn find_by_id(&self, id: RecordId) -> Box<dyn Query> {
        self.query(Filter::Id(id))
    }

    fn insert(&self, docs: &[Document]) -> DriverResult<()> {
        with_conn(&self.conn, |conn| {
            let tx = conn.transaction()?;
            for doc in docs {
                let mut doc = doc.clone();
                let id = match document_id(&doc) {
                    Some(id) => id,
                    None => {
                        let id = new_id();
                        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
                        id
                    }
                };
                let body = serde_json::to_string(&doc)?;

                let inserted = tx.execute(
                    "INSERT INTO documents (db_name, collection, doc_id, body)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![self.db_name, self.name, id.to_string(), body],
                );
                if let Err(err) = inserted {
                    return Err(map_constraint(err, &self.name, &id));
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn remove_all(&self, filter: &Filter) -> DriverResult<ChangeInfo> {
        let (clause, bind_values) = where_clause(&self.db_name, &self.name, filter)?;
        with_conn(&self.conn, |conn| {
            let removed = conn.execute(
                &format!("DELETE FROM documents WHERE {clause};"),
                params_from_iter(bind_values),
            )?;
            Ok(ChangeInfo { removed })
        })
    }

    fn remove_by_id(&self, id: RecordId) -> DriverResult<ChangeInfo> {
        self.remove_all(&Filter::Id(id))
    }

    fn ensure_index(&self, index: &IndexSpec) -> DriverResult<()> {
        let sql = self.index_sql(index)?;
        with_conn(&self.conn, |conn| {
            let tx = conn.transaction()?;
            if let Err(err) = tx.execute_batch(&sql) {
                return Err(map_constraint_message(err, &self.name, &index.name()));
            }
            tx.execute(
                "INSERT OR REPLACE INTO document_indexes (db_name, collection, name, keys, is_unique)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    self.db_name,
                    self.name,
                    index.name(),
                    serde_json::to_string(&index.keys)?,
                    i64::from(index.unique),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}

struct SqliteQuery {
    conn: SharedConnection,
    db_name: String,
    collection: String,
    filter: Filter,
    sort: Vec<String>,
    limit: usize,
}

impl SqliteQuery {
    fn fetch(&self) -> DriverResult<VecDeque<String>> {
        let (clause, mut bind_values) = where_clause(&self.db_name, &self.collection, &self.filter)?;
        let order = SortField::parse_all(&self.sort.iter().map(String::as_str).collect::<Vec<_>>())?;

        let mut sql = format!("SELECT body FROM documents WHERE {clause}");
        if order.is_empty() {
            sql.push_str(" ORDER BY seq ASC");
        } else {
            let terms = order
                .iter()
                .map(|field| format!("{} {}", order_expr(field), direction_sql(field.direction)))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms);
        }
        if self.limit > 0 {
            sql.push_str(" LIMIT ?");
            bind_values.push(SqlValue::Integer(
                i64::try_from(self.limit).unwrap_or(i64::MAX),
            ));
        }

        with_conn(&self.conn, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(bind_values), |row| row.get::<_, String>(0))?;
            let bodies = rows.collect::<Result<VecDeque<String>, _>>()?;
            Ok(bodies)
        })
    }
}

impl Query for SqliteQuery {
    fn sort(mut self: Box<Self>, fields: &[&str]) -> Box<dyn Query> {
        self.sort = fields.iter().map(|field| (*field).to_string()).collect();
        self
    }

    fn limit(mut self: Box<Self>, n: usize) -> Box<dyn Query> {
        self.limit = n;
        self
    }

    fn iterate(self: Box<Self>) -> Box<dyn Cursor> {
        let (bodies, err) = match self.fetch() {
            Ok(bodies) => (bodies, None),
            Err(err) => (VecDeque::new(), Some(err)),
        };
        Box::new(SqliteCursor {
            bodies,
            err,
            closed: false,
        })
    }
}

struct SqliteCursor {
    bodies: VecDeque<String>,
    err: Option<DriverError>,
    closed: bool,
}

impl Cursor for SqliteCursor {
    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        self.bodies.clear();
        Ok(())
    }

    fn done(&self) -> bool {
        self.closed || self.bodies.is_empty()
    }

    fn advance(&mut self, into: &mut Document) -> bool {
        if self.closed {
            return false;
        }
        let Some(body) = self.bodies.pop_front() else {
            return false;
        };
        match serde_json::from_str::<Document>(&body) {
            Ok(doc) => {
                *into = doc;
                true
            }
            Err(err) => {
                self.bodies.clear();
                self.err = Some(DriverError::Decode(err));
                false
            }
        }
    }

    fn take_err(&mut self) -> Option<DriverError> {
        self.err.take()
    }
}

fn with_conn<T, F>(conn: &SharedConnection, f: F) -> DriverResult<T>
where
    F: FnOnce(&mut Connection) -> DriverResult<T>,
{
    let mut guard = conn.lock();
    match guard.as_mut() {
        Some(conn) => f(conn),
        None => Err(DriverError::SessionClosed),
    }
}

fn where_clause(
    db_name: &str,
    collection: &str,
    filter: &Filter,
) -> DriverResult<(String, Vec<SqlValue>)> {
    filter.validate()?;
    let mut clause = "db_name = ? AND collection = ?".to_string();
    let mut bind_values = vec![
        SqlValue::Text(db_name.to_string()),
        SqlValue::Text(collection.to_string()),
    ];

    match filter {
        Filter::All => {}
        Filter::Id(id) => {
            clause.push_str(" AND doc_id = ?");
            bind_values.push(SqlValue::Text(id.to_string()));
        }
        Filter::Fields(fields) => {
            for (path, expected) in fields {
                if path == ID_FIELD {
                    clause.push_str(" AND doc_id = ?");
                    let id = expected
                        .as_str()
                        .map_or_else(|| expected.to_string(), str::to_string);
                    bind_values.push(SqlValue::Text(id));
                    continue;
                }

                bind_values.push(SqlValue::Text(format!("$.{path}")));
                match expected {
                    Value::Null => clause.push_str(" AND json_extract(body, ?) IS NULL"),
                    Value::Bool(flag) => {
                        clause.push_str(" AND json_extract(body, ?) = ?");
                        bind_values.push(SqlValue::Integer(i64::from(*flag)));
                    }
                    Value::Number(number) => {
                        clause.push_str(" AND json_extract(body, ?) = ?");
                        bind_values.push(match number.as_i64() {
                            Some(int) => SqlValue::Integer(int),
                            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
                        });
                    }
                    Value::String(text) => {
                        clause.push_str(" AND json_extract(body, ?) = ?");
                        bind_values.push(SqlValue::Text(text.clone()));
                    }
                    Value::Array(_) | Value::Object(_) => {
                        clause.push_str(" AND json_extract(body, ?) = json(?)");
                        bind_values.push(SqlValue::Text(expected.to_string()));
                    }
                }
            }
        }
    }

    Ok((clause, bind_values))
}

/// SQL expression for a sort or index key. The field path is pre-validated.
fn order_expr(field: &SortField) -> String {
    match &field.key {
        SortKey::Natural => "seq".to_string(),
        SortKey::Field(path) if path == ID_FIELD => "doc_id".to_string(),
        SortKey::Field(path) => format!("json_extract(body, '$.{path}')"),
    }
}

fn direction_sql(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn sanitize_identifier(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

fn map_constraint(err: rusqlite::Error, collection: &str, id: &RecordId) -> DriverError {
    if is_constraint_violation(&err) {
        DriverError::DuplicateKey {
            collection: collection.to_string(),
            key: format!("{ID_FIELD}: {id}"),
        }
    } else {
        err.into()
    }
}

fn map_constraint_message(err: rusqlite::Error, collection: &str, index: &str) -> DriverError {
    if is_constraint_violation(&err) {
        DriverError::DuplicateKey {
            collection: collection.to_string(),
            key: index.to_string(),
        }
    } else {
        err.into()
    }
}
