//! In-memory document store with live listeners.

use super::{
    BoxFuture, ChangeKind, CollectionPath, Direction, DocPath, Document, DocumentChange, DocumentData,
    DocumentStore, ListenerRegistration, Query, Snapshot, SnapshotListener, StoreError, StoreResult,
    Timestamp,
};
use serde_json::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use uuid::Uuid;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// In-memory store for tests, the replay tool and offline use.
///
/// Clones share the same data. Listeners are called synchronously after each
/// write, and once on attach with the current result set.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<Inner>>,
}

#[derive(Default)]
struct Inner {
    /// Documents per collection, in insertion order.
    collections: HashMap<CollectionPath, Vec<Document>>,
    listeners: Vec<ListenerEntry>,
    next_listener: u64,
    /// Last issued server timestamp.
    clock: u64,
    /// Number of upcoming writes that fail.
    failing_writes: usize,
}

struct ListenerEntry {
    id: u64,
    query: Query,
    callback: Rc<RefCell<SnapshotListener>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes (adds and deletes) fail as unavailable.
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.borrow_mut().failing_writes = count;
    }

    /// Current documents of a collection, in insertion order.
    pub fn documents(&self, collection: &CollectionPath) -> Vec<Document> {
        self.inner
            .borrow()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of listeners attached to `collection`.
    pub fn listener_count(&self, collection: &CollectionPath) -> usize {
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|entry| &entry.query.collection == collection)
            .count()
    }

    /// Deliver an error to every listener on `collection` and detach them.
    pub fn break_listeners(&self, collection: &CollectionPath, error: StoreError) {
        let broken: Vec<_> = {
            let mut inner = self.inner.borrow_mut();
            let (broken, kept) = std::mem::take(&mut inner.listeners)
                .into_iter()
                .partition(|entry| &entry.query.collection == collection);
            inner.listeners = kept;
            broken
        };
        for entry in broken {
            deliver(&entry.callback, Err(error.clone()));
        }
    }

    fn take_write_failure(&self) -> StoreResult<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(StoreError::Unavailable("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn next_timestamp(&self) -> Timestamp {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let mut inner = self.inner.borrow_mut();
        inner.clock = now.max(inner.clock + 1);
        Timestamp(inner.clock)
    }

    /// Call every listener on `collection` with `change`.
    fn notify(&self, collection: &CollectionPath, change: DocumentChange) {
        let targets: Vec<(u64, Rc<RefCell<SnapshotListener>>, Snapshot)> = {
            let inner = self.inner.borrow();
            inner
                .listeners
                .iter()
                .filter(|entry| &entry.query.collection == collection)
                .map(|entry| {
                    let snapshot = Snapshot {
                        docs: inner.query_docs(&entry.query),
                        changes: vec![change.clone()],
                    };
                    (entry.id, Rc::clone(&entry.callback), snapshot)
                })
                .collect()
        };

        for (id, callback, snapshot) in targets {
            // An earlier callback may have detached this one.
            if !self.inner.borrow().listeners.iter().any(|entry| entry.id == id) {
                continue;
            }
            if !deliver(&callback, Ok(snapshot)) {
                log::warn!("Skipping re-entrant delivery to listener {}", id);
            }
        }
    }
}

impl Inner {
    fn query_docs(&self, query: &Query) -> Vec<Document> {
        let mut docs = self.collections.get(&query.collection).cloned().unwrap_or_default();
        if let Some(order) = &query.order_by {
            // Stable sort keeps insertion order between equal keys.
            docs.sort_by(|a, b| {
                let ordering = compare_fields(a.data.get(&order.field), b.data.get(&order.field));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        docs
    }
}

/// Returns false when the listener is already running further up the stack.
fn deliver(callback: &RefCell<SnapshotListener>, result: StoreResult<Snapshot>) -> bool {
    match callback.try_borrow_mut() {
        Ok(mut listener) => {
            (*listener)(result);
            true
        }
        Err(_) => false,
    }
}

/// Missing/null < bool < number < string; other types compare equal.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl DocumentStore for MemoryStore {
    fn add_doc(&self, collection: &CollectionPath, data: DocumentData) -> BoxFuture<'_, StoreResult<DocPath>> {
        let collection = collection.clone();
        Box::pin(async move {
            self.take_write_failure()?;
            let now = self.next_timestamp();
            let doc = Document::new(Uuid::new_v4().simple().to_string(), data.resolve(now));
            let path = collection.doc(doc.id.clone());

            self.inner
                .borrow_mut()
                .collections
                .entry(collection.clone())
                .or_default()
                .push(doc.clone());

            self.notify(&collection, DocumentChange {
                kind: ChangeKind::Added,
                doc,
            });
            Ok(path)
        })
    }

    fn get_docs(&self, collection: &CollectionPath) -> BoxFuture<'_, StoreResult<Vec<Document>>> {
        let collection = collection.clone();
        Box::pin(async move { Ok(self.documents(&collection)) })
    }

    fn delete_doc(&self, doc: &DocPath) -> BoxFuture<'_, StoreResult<()>> {
        let doc = doc.clone();
        Box::pin(async move {
            self.take_write_failure()?;
            let removed = {
                let mut inner = self.inner.borrow_mut();
                inner.collections.get_mut(&doc.collection).and_then(|docs| {
                    let index = docs.iter().position(|d| d.id == doc.id)?;
                    Some(docs.remove(index))
                })
            };

            if let Some(removed) = removed {
                self.notify(&doc.collection, DocumentChange {
                    kind: ChangeKind::Removed,
                    doc: removed,
                });
            }
            Ok(())
        })
    }

    fn on_snapshot(&self, query: Query, listener: SnapshotListener) -> ListenerRegistration {
        let callback = Rc::new(RefCell::new(listener));
        let (id, initial) = {
            let mut inner = self.inner.borrow_mut();
            inner.next_listener += 1;
            let id = inner.next_listener;
            let docs = inner.query_docs(&query);
            let changes = docs
                .iter()
                .map(|doc| DocumentChange {
                    kind: ChangeKind::Added,
                    doc: doc.clone(),
                })
                .collect();
            inner.listeners.push(ListenerEntry {
                id,
                query,
                callback: Rc::clone(&callback),
            });
            (id, Snapshot { docs, changes })
        };

        deliver(&callback, Ok(initial));

        let inner: Weak<RefCell<Inner>> = Rc::downgrade(&self.inner);
        ListenerRegistration::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.borrow_mut().listeners.retain(|entry| entry.id != id);
            }
        })
    }
}
