//! Document store abstraction.
//!
//! The remote persistence service is modelled as collections of JSON
//! documents with store-assigned ids, ordered queries and live snapshot
//! listeners. [`MemoryStore`] is the in-process implementation.

mod memory;

pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Slash-separated path of a collection, e.g. `artifacts/app/.../strokes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Path of the document `id` inside this collection.
    pub fn doc(&self, id: impl Into<String>) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    /// Collection `name` nested under document `doc_id` of this collection.
    pub fn subcollection(&self, doc_id: &str, name: &str) -> CollectionPath {
        let mut segments = self.segments.clone();
        segments.push(doc_id.to_string());
        segments.push(name.to_string());
        Self { segments }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Path of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: CollectionPath,
    pub id: String,
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Server-assigned time in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

/// A document as delivered by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), data }
    }

    /// Deserialize the document body.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(T::deserialize(&self.data)?)
    }
}

/// Body of a document to be written.
///
/// Fields listed as server timestamps are filled in by the store at write
/// time, overriding whatever the body carries for them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentData {
    fields: Map<String, Value>,
    server_timestamps: Vec<String>,
}

impl DocumentData {
    /// Serialize `value`, which must serialize to a JSON object.
    pub fn from_serializable<T: Serialize>(value: &T) -> StoreResult<Self> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self {
                fields,
                server_timestamps: Vec::new(),
            }),
            other => Err(StoreError::Serialization(format!(
                "document body must be an object, got {}",
                other
            ))),
        }
    }

    /// Mark `field` to receive the server timestamp.
    pub fn with_server_timestamp(mut self, field: &str) -> Self {
        self.server_timestamps.push(field.to_string());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn server_timestamp_fields(&self) -> &[String] {
        &self.server_timestamps
    }

    /// Final document body with timestamps set to `now`.
    pub fn resolve(self, now: Timestamp) -> Value {
        let mut fields = self.fields;
        for field in self.server_timestamps {
            fields.insert(field, Value::from(now.0));
        }
        Value::Object(fields)
    }
}

/// Sort direction of an ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A collection, optionally ordered by one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: CollectionPath,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            order_by: None,
        }
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }
}

impl From<CollectionPath> for Query {
    fn from(collection: CollectionPath) -> Self {
        Self::new(collection)
    }
}

/// Kind of an incremental change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub doc: Document,
}

/// One delivery of a live listener: the full result set in query order plus
/// the changes since the previous delivery. The first delivery reports every
/// document as added.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub docs: Vec<Document>,
    pub changes: Vec<DocumentChange>,
}

/// Callback receiving snapshots or the error that ended the listener.
pub type SnapshotListener = Box<dyn FnMut(StoreResult<Snapshot>)>;

/// Handle of a live listener. Removing or dropping it detaches the listener.
pub struct ListenerRegistration {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl ListenerRegistration {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Detach the listener now.
    pub fn remove(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("attached", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Trait for document store backends.
///
/// Everything runs on one thread, so neither the futures nor the listeners
/// are required to be `Send`.
pub trait DocumentStore {
    /// Create a document with a store-assigned id.
    fn add_doc(&self, collection: &CollectionPath, data: DocumentData) -> BoxFuture<'_, StoreResult<DocPath>>;

    /// Read every document of a collection.
    fn get_docs(&self, collection: &CollectionPath) -> BoxFuture<'_, StoreResult<Vec<Document>>>;

    /// Delete one document. Deleting a missing document succeeds.
    fn delete_doc(&self, doc: &DocPath) -> BoxFuture<'_, StoreResult<()>>;

    /// Attach a live listener. The listener stays attached until the
    /// registration is removed or dropped, or an error is delivered.
    fn on_snapshot(&self, query: Query, listener: SnapshotListener) -> ListenerRegistration;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_paths() {
        let boards = CollectionPath::new(["artifacts", "app", "whiteboards"]);
        let strokes = boards.subcollection("b1", "strokes");
        assert_eq!(strokes.to_string(), "artifacts/app/whiteboards/b1/strokes");
        assert_eq!(strokes.doc("s1").to_string(), "artifacts/app/whiteboards/b1/strokes/s1");
    }

    #[test]
    fn test_server_timestamp() {
        let data = DocumentData::from_serializable(&json!({ "name": "Board 1", "createdAt": null }))
            .unwrap()
            .with_server_timestamp("createdAt");
        let body = data.resolve(Timestamp(99));
        assert_eq!(body, json!({ "name": "Board 1", "createdAt": 99 }));
    }

    #[test]
    fn test_non_object_body() {
        let result = DocumentData::from_serializable(&vec![1, 2, 3]);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_registration_detaches_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let registration = ListenerRegistration::new(move || counter.set(counter.get() + 1));
        registration.remove();
        assert_eq!(calls.get(), 1);

        let counter = Rc::clone(&calls);
        drop(ListenerRegistration::new(move || counter.set(counter.get() + 1)));
        assert_eq!(calls.get(), 2);
    }
}
