//! Filters, sort keys and index specs shared by all drivers.

use crate::driver::{Document, DriverError, DriverResult};
use crate::model::record::{document_id, RecordId, ID_FIELD};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// Sort key selecting insertion order.
pub const NATURAL_KEY: &str = "$natural";

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field path regex")
});

/// Predicate selecting documents in a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Filter {
    #[default]
    All,
    Id(RecordId),
    /// Field path → expected value. All pairs must match.
    Fields(Document),
}

impl Filter {
    pub fn by_id(id: RecordId) -> Self {
        Self::Id(id)
    }

    /// Adds an equality condition, turning `All` into a field filter.
    ///
    /// Adding a field to an `Id` filter keeps the id as an `_id` condition.
    pub fn field(self, path: impl Into<String>, expected: impl Into<Value>) -> Self {
        let mut fields = match self {
            Self::All => Document::new(),
            Self::Id(id) => {
                let mut fields = Document::new();
                fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
                fields
            }
            Self::Fields(fields) => fields,
        };
        fields.insert(path.into(), expected.into());
        Self::Fields(fields)
    }

    /// Checks every field path used by this filter.
    pub fn validate(&self) -> DriverResult<()> {
        if let Self::Fields(fields) = self {
            for path in fields.keys() {
                validate_field_path(path)?;
            }
        }
        Ok(())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Id(id) => document_id(doc) == Some(*id),
            Self::Fields(fields) => fields
                .iter()
                .all(|(path, expected)| match (lookup(doc, path), expected) {
                    (None, Value::Null) | (Some(Value::Null), Value::Null) => true,
                    (Some(actual), expected) => actual == expected,
                    (None, _) => false,
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Insertion order.
    Natural,
    Field(String),
}

/// One parsed sort key: `field`, `+field`, `-field` or `$natural`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortField {
    pub fn parse(raw: &str) -> DriverResult<Self> {
        let trimmed = raw.trim();
        let (direction, name) = if let Some(name) = trimmed.strip_prefix('-') {
            (SortDirection::Descending, name)
        } else if let Some(name) = trimmed.strip_prefix('+') {
            (SortDirection::Ascending, name)
        } else {
            (SortDirection::Ascending, trimmed)
        };

        let key = if name == NATURAL_KEY {
            SortKey::Natural
        } else {
            validate_field_path(name)?;
            SortKey::Field(name.to_string())
        };

        Ok(Self { key, direction })
    }

    pub fn parse_all(fields: &[&str]) -> DriverResult<Vec<Self>> {
        fields.iter().map(|field| Self::parse(field)).collect()
    }
}

/// Index definition passed to `Collection::ensure_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Parses the keys; `$natural` and empty key lists are rejected.
    pub fn fields(&self) -> DriverResult<Vec<SortField>> {
        if self.keys.is_empty() {
            return Err(DriverError::InvalidField(String::new()));
        }
        self.keys
            .iter()
            .map(|key| {
                let field = SortField::parse(key)?;
                match field.key {
                    SortKey::Natural => Err(DriverError::InvalidField(key.clone())),
                    SortKey::Field(_) => Ok(field),
                }
            })
            .collect()
    }

    /// Conventional name, e.g. `ts_1` or `ts_-1_entry_1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|key| match key.trim().strip_prefix('-') {
                Some(field) => format!("{field}_-1"),
                None => format!("{}_1", key.trim().trim_start_matches('+')),
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

pub fn validate_field_path(path: &str) -> DriverResult<()> {
    if FIELD_PATH_RE.is_match(path) {
        Ok(())
    } else {
        Err(DriverError::InvalidField(path.to_string()))
    }
}

/// Resolves a dotted field path inside a document.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Total order over optional JSON values used for in-memory sorting.
///
/// Missing/null < numbers < strings < objects < arrays < booleans.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Object(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Bool(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ Value::Object(_)), Some(y @ Value::Object(_)))
        | (Some(x @ Value::Array(_)), Some(y @ Value::Array(_))) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}
