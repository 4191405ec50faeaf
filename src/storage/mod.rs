//! Collection-oriented document storage.
//!
//! Every backend stores JSON objects grouped by collection name and answers the
//! same equality-filter queries, so repositories never know which backend is
//! running. Results always come back in insertion order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod json_file;
pub mod memory;
pub mod postgres;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A stored JSON object.
pub type Document = Map<String, Value>;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt data in collection `{collection}`: {reason}")]
    CorruptData { collection: String, reason: String },

    #[error("document `{id}` already exists in `{collection}`")]
    DuplicateId { collection: String, id: String },

    #[error("invalid collection name `{0}`")]
    InvalidCollection(String),
}

impl StorageError {
    pub fn corrupt(collection: &str, reason: impl ToString) -> Self {
        StorageError::CorruptData {
            collection: collection.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Exact-match predicate over top-level document fields.
///
/// A field missing from a document compares equal to `null`, which lets
/// callers select "not soft-deleted" rows with `eq("deletedAt", Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: BTreeMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.fields
            .iter()
            .all(|(key, expected)| doc.get(key).unwrap_or(&Value::Null) == expected)
    }
}

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short backend name, reported by the health endpoint.
    fn backend(&self) -> &'static str;

    async fn find(&self, collection: &str, filter: &Filter) -> StorageResult<Vec<Document>>;

    async fn find_all(&self, collection: &str) -> StorageResult<Vec<Document>> {
        self.find(collection, &Filter::new()).await
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StorageResult<Option<Document>> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    /// Stores `doc`, assigning `id` when absent and stamping `createdAt`/`updatedAt`.
    async fn insert(&self, collection: &str, doc: Document) -> StorageResult<Document>;

    /// Shallow-merges `patch` into the document. Returns `None` when `id` is unknown.
    async fn update(&self, collection: &str, id: &str, patch: Document)
    -> StorageResult<Option<Document>>;

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool>;

    async fn count(&self, collection: &str, filter: &Filter) -> StorageResult<u64> {
        Ok(self.find(collection, filter).await?.len() as u64)
    }

    /// Subtracts `amount` from the integer `field` only if the current value is
    /// at least `amount`, as one atomic step. A negative `amount` adds.
    /// Returns `false` when the guard fails or the document does not exist.
    async fn decrement_if_at_least(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        amount: i64,
    ) -> StorageResult<bool>;
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Fills in `id`, `createdAt` and `updatedAt` for a document about to be inserted.
pub(crate) fn prepare_insert(mut doc: Document) -> Document {
    let now = now_timestamp();
    let has_id = matches!(doc.get("id"), Some(Value::String(id)) if !id.is_empty());
    if !has_id {
        doc.insert("id".into(), Value::String(new_id()));
    }
    if !matches!(doc.get("createdAt"), Some(Value::String(_))) {
        doc.insert("createdAt".into(), Value::String(now.clone()));
    }
    doc.insert("updatedAt".into(), Value::String(now));
    doc
}

/// Strips immutable keys from an update patch and stamps `updatedAt`.
pub(crate) fn prepare_patch(mut patch: Document) -> Document {
    patch.remove("id");
    patch.remove("createdAt");
    patch.insert("updatedAt".into(), Value::String(now_timestamp()));
    patch
}

pub(crate) fn doc_id(doc: &Document) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

/// Applies the compare-and-decrement rule to an in-process document.
pub(crate) fn apply_decrement(
    collection: &str,
    doc: &mut Document,
    field: &str,
    amount: i64,
) -> StorageResult<bool> {
    let current = match doc.get(field) {
        Some(value) => value
            .as_i64()
            .ok_or_else(|| StorageError::corrupt(collection, format!("`{field}` is not an integer")))?,
        None => 0,
    };
    let next = match current.checked_sub(amount) {
        Some(next) if next >= 0 => next,
        _ => return Ok(false),
    };
    doc.insert(field.to_string(), Value::from(next));
    doc.insert("updatedAt".into(), Value::String(now_timestamp()));
    Ok(true)
}

pub(crate) fn validate_collection(name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidCollection(name.to_string()))
    }
}

pub fn to_document<T: Serialize>(collection: &str, value: &T) -> StorageResult<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StorageError::corrupt(collection, "value is not a JSON object")),
        Err(err) => Err(StorageError::corrupt(collection, err)),
    }
}

pub fn from_document<T: DeserializeOwned>(collection: &str, doc: Document) -> StorageResult<T> {
    serde_json::from_value(Value::Object(doc)).map_err(|err| StorageError::corrupt(collection, err))
}
