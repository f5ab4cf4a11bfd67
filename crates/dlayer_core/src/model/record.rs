//! Record contract and document codec.

use crate::driver::{Document, DriverError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Storage identifier shared by all record types.
pub type RecordId = Uuid;

/// Reserved document key holding the record identifier.
pub const ID_FIELD: &str = "_id";

const RECORD_ID_FIELD: &str = "id";

/// Entity type that can be stored in and loaded from a driver collection.
///
/// The default codec serializes the record with serde and moves its `id`
/// field to `_id`.
pub trait Record: Serialize + DeserializeOwned + Send + 'static {
    /// Collection the records live in.
    const COLLECTION: &'static str;

    fn id(&self) -> Option<RecordId>;

    fn set_id(&mut self, id: RecordId);

    fn to_document(&self) -> Result<Document, DriverError> {
        encode_document(self)
    }

    fn from_document(doc: Document) -> Result<Self, DriverError> {
        decode_document(doc)
    }
}

/// Returns the identifier only when it is usable as a primary key.
///
/// The nil UUID is treated the same as an unset identifier.
pub fn valid_id(id: Option<RecordId>) -> Option<RecordId> {
    id.filter(|id| !id.is_nil())
}

/// Generates a fresh record identifier.
pub fn new_id() -> RecordId {
    Uuid::new_v4()
}

/// Serializes `value` into a document with the identifier under `_id`.
pub fn encode_document<T: Serialize>(value: &T) -> Result<Document, DriverError> {
    match serde_json::to_value(value).map_err(DriverError::Decode)? {
        Value::Object(mut doc) => {
            if let Some(id) = doc.remove(RECORD_ID_FIELD) {
                doc.insert(ID_FIELD.to_string(), id);
            }
            Ok(doc)
        }
        other => Err(DriverError::Backend(format!(
            "record must serialize to an object, got `{other}`"
        ))),
    }
}

/// Deserializes a document produced by `encode_document`.
pub fn decode_document<T: DeserializeOwned>(mut doc: Document) -> Result<T, DriverError> {
    if let Some(id) = doc.remove(ID_FIELD) {
        doc.insert(RECORD_ID_FIELD.to_string(), id);
    }
    serde_json::from_value(Value::Object(doc)).map_err(DriverError::Decode)
}

/// Reads the `_id` of a stored document.
pub fn document_id(doc: &Document) -> Option<RecordId> {
    doc.get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|text| Uuid::parse_str(text).ok())
}

#[cfg(test)]
mod tests {
    use super::{decode_document, document_id, encode_document, valid_id, ID_FIELD};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Uuid>,
        name: String,
    }

    #[test]
    fn encode_moves_id_to_reserved_key() {
        let id = Uuid::new_v4();
        let doc = encode_document(&Sample {
            id: Some(id),
            name: "a".to_string(),
        })
        .unwrap();

        assert!(doc.get("id").is_none());
        assert_eq!(document_id(&doc), Some(id));
        assert_eq!(doc.get("name").and_then(|v| v.as_str()), Some("a"));
    }

    #[test]
    fn decode_restores_id_field() {
        let id = Uuid::new_v4();
        let mut doc = serde_json::Map::new();
        doc.insert(ID_FIELD.to_string(), id.to_string().into());
        doc.insert("name".to_string(), "b".into());

        let sample: Sample = decode_document(doc).unwrap();
        assert_eq!(sample.id, Some(id));
        assert_eq!(sample.name, "b");
    }

    #[test]
    fn encode_rejects_non_object_values() {
        assert!(encode_document(&42).is_err());
    }

    #[test]
    fn nil_id_is_not_valid() {
        assert_eq!(valid_id(Some(Uuid::nil())), None);
        assert_eq!(valid_id(None), None);
        let id = Uuid::new_v4();
        assert_eq!(valid_id(Some(id)), Some(id));
    }
}
