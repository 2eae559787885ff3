//! Sync layer between the session and the document store.
//!
//! Store listeners never touch session state. Each listener is tagged with a
//! [`SubscriptionId`] and only pushes [`SyncEvent`]s into the layer's inbox;
//! the session drains the inbox with [`SyncLayer::drain`], which drops events
//! from listeners that have since been replaced. Writes are queued as
//! [`StoreRequest`]s and executed by the host through a [`RequestRunner`].

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use futures_util::future::join_all;
use thiserror::Error;

use crate::board::{Board, BoardRecord, CREATED_AT_FIELD};
use crate::store::{
    ChangeKind, CollectionPath, Direction, DocumentChange, DocumentData, DocumentStore, ListenerRegistration,
    Query, Snapshot, StoreError, StoreResult,
};
use crate::stroke::Stroke;

/// Message shown when a stroke could not be saved.
pub const SAVE_FAILED_MESSAGE: &str = "Could not save your drawing.";

/// Message shown after a board was cleared.
pub const CLEARED_MESSAGE: &str = "Board cleared.";

/// Message shown when clearing a board failed.
pub const CLEAR_FAILED_MESSAGE: &str = "Could not clear the board.";

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to delete {failed} of {total} strokes")]
    PartialClear { failed: usize, total: usize },
}

/// User-visible message sink provided by the host (toast, status line...).
pub trait Notifier {
    fn show_message(&self, message: &str);
}

impl<F: Fn(&str)> Notifier for F {
    fn show_message(&self, message: &str) {
        self(message)
    }
}

/// Store namespace of one pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreScope {
    app_id: String,
    pairing_code: String,
}

impl StoreScope {
    pub fn new(app_id: impl Into<String>, pairing_code: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            pairing_code: pairing_code.into(),
        }
    }

    /// Collection holding the pairing's boards.
    pub fn boards(&self) -> CollectionPath {
        CollectionPath::new([
            "artifacts",
            self.app_id.as_str(),
            "public",
            "data",
            "pairings",
            self.pairing_code.as_str(),
            "whiteboards",
        ])
    }

    /// Collection holding the strokes of `board_id`.
    pub fn strokes(&self, board_id: &str) -> CollectionPath {
        self.boards().subcollection(board_id, "strokes")
    }
}

/// Identity of one attached listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Events delivered through the inbox.
#[derive(Debug)]
pub enum SyncEvent {
    /// Board metadata snapshot, or the error that ended the listener.
    Boards {
        subscription: SubscriptionId,
        result: StoreResult<Snapshot>,
    },
    /// Stroke change batch, or the error that ended the listener.
    Strokes {
        subscription: SubscriptionId,
        result: StoreResult<Snapshot>,
    },
    /// The default board requested for `subscription` could not be created.
    DefaultBoardFailed { subscription: SubscriptionId },
}

impl SyncEvent {
    fn subscription(&self) -> SubscriptionId {
        match self {
            SyncEvent::Boards { subscription, .. }
            | SyncEvent::Strokes { subscription, .. }
            | SyncEvent::DefaultBoardFailed { subscription } => *subscription,
        }
    }
}

/// Store writes queued by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    /// Persist a completed stroke.
    SaveStroke { collection: CollectionPath, stroke: Stroke },
    /// Create a board. `default_for` is set when the board is the automatic
    /// first board requested by that metadata subscription.
    CreateBoard {
        collection: CollectionPath,
        name: String,
        default_for: Option<SubscriptionId>,
    },
    /// Delete every stroke of a board.
    ClearBoard { collection: CollectionPath },
}

/// Local cache of confirmed strokes, keyed by store document id.
///
/// Iteration order is stable (by id) and is the render order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeCache {
    strokes: BTreeMap<String, Stroke>,
}

impl StrokeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one change batch. Returns the number of changes applied.
    pub fn apply(&mut self, changes: &[DocumentChange]) -> usize {
        let mut applied = 0;
        for change in changes {
            match change.kind {
                ChangeKind::Added | ChangeKind::Modified => match change.doc.decode::<Stroke>() {
                    Ok(stroke) => {
                        self.strokes.insert(change.doc.id.clone(), stroke);
                        applied += 1;
                    }
                    Err(e) => log::warn!("Skipping undecodable stroke {}: {}", change.doc.id, e),
                },
                ChangeKind::Removed => {
                    self.strokes.remove(&change.doc.id);
                    applied += 1;
                }
            }
        }
        applied
    }

    pub fn insert(&mut self, id: impl Into<String>, stroke: Stroke) {
        self.strokes.insert(id.into(), stroke);
    }

    pub fn get(&self, id: &str) -> Option<&Stroke> {
        self.strokes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Stroke)> {
        self.strokes.iter().map(|(id, stroke)| (id.as_str(), stroke))
    }

    pub fn strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.values()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }
}

/// What to do with a board metadata snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardsPlan {
    /// No boards exist: create the default one and wait for it to arrive.
    CreateDefault,
    /// A default board is already on its way; nothing to do.
    AwaitDefault,
    /// The active board is unset or gone: switch to this index.
    Switch(usize),
    /// The active board is still present at this index.
    Keep(usize),
}

/// Decide how to react to `boards` given the active board id.
///
/// Missing or vanished active boards fall back to the most recently created
/// (last) board.
pub fn plan_boards(boards: &[Board], active_id: Option<&str>, default_pending: bool) -> BoardsPlan {
    if boards.is_empty() {
        return if default_pending {
            BoardsPlan::AwaitDefault
        } else {
            BoardsPlan::CreateDefault
        };
    }
    match active_id.and_then(|id| boards.iter().position(|board| board.id == id)) {
        Some(index) => BoardsPlan::Keep(index),
        None => BoardsPlan::Switch(boards.len() - 1),
    }
}

struct Attached {
    id: SubscriptionId,
    registration: ListenerRegistration,
}

/// Events posted by listeners and runners, waiting for the session.
type Inbox = Rc<RefCell<VecDeque<SyncEvent>>>;

/// Owns the store listeners, the inbox and the queue of pending writes.
pub struct SyncLayer {
    inbox: Inbox,
    boards: Option<Attached>,
    strokes: Option<Attached>,
    next_id: u64,
    requests: VecDeque<StoreRequest>,
    default_pending: bool,
    wake: Option<Rc<dyn Fn()>>,
}

impl Default for SyncLayer {
    fn default() -> Self {
        Self {
            inbox: Inbox::default(),
            boards: None,
            strokes: None,
            next_id: 0,
            requests: VecDeque::new(),
            default_pending: false,
            wake: None,
        }
    }
}

impl SyncLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a callback run whenever an event lands in the inbox, so the
    /// host can schedule a [`drain`](Self::drain).
    pub fn set_wake(&mut self, wake: impl Fn() + 'static) {
        self.wake = Some(Rc::new(wake));
    }

    /// Listen to the boards of `scope`, ordered by creation time.
    /// Any previous board listener is detached first.
    pub fn watch_boards(&mut self, store: &dyn DocumentStore, scope: &StoreScope) -> SubscriptionId {
        self.unwatch_boards();
        let id = self.allocate();
        let query = Query::new(scope.boards()).order_by(CREATED_AT_FIELD, Direction::Ascending);
        let inbox = Rc::clone(&self.inbox);
        let wake = self.wake.clone();
        let registration = store.on_snapshot(
            query,
            Box::new(move |result: StoreResult<Snapshot>| {
                post(&inbox, wake.as_deref(), SyncEvent::Boards {
                    subscription: id,
                    result,
                })
            }),
        );
        log::debug!("Watching boards at {} ({})", scope.boards(), id);
        self.boards = Some(Attached { id, registration });
        id
    }

    /// Listen to the strokes in `collection`.
    /// Any previous stroke listener is detached first.
    pub fn watch_strokes(&mut self, store: &dyn DocumentStore, collection: CollectionPath) -> SubscriptionId {
        self.unwatch_strokes();
        let id = self.allocate();
        let inbox = Rc::clone(&self.inbox);
        let wake = self.wake.clone();
        log::debug!("Watching strokes at {} ({})", collection, id);
        let registration = store.on_snapshot(
            collection.into(),
            Box::new(move |result: StoreResult<Snapshot>| {
                post(&inbox, wake.as_deref(), SyncEvent::Strokes {
                    subscription: id,
                    result,
                })
            }),
        );
        self.strokes = Some(Attached { id, registration });
        id
    }

    pub fn unwatch_boards(&mut self) {
        if let Some(attached) = self.boards.take() {
            attached.registration.remove();
        }
        self.default_pending = false;
    }

    pub fn unwatch_strokes(&mut self) {
        if let Some(attached) = self.strokes.take() {
            attached.registration.remove();
        }
    }

    pub fn boards_subscription(&self) -> Option<SubscriptionId> {
        self.boards.as_ref().map(|attached| attached.id)
    }

    pub fn strokes_subscription(&self) -> Option<SubscriptionId> {
        self.strokes.as_ref().map(|attached| attached.id)
    }

    /// Next queued event that belongs to a currently attached listener.
    ///
    /// Currency is checked at the moment each event is taken, so a listener
    /// replaced while handling one event has its remaining events dropped.
    pub fn next_event(&mut self) -> Option<SyncEvent> {
        loop {
            let event = self.inbox.borrow_mut().pop_front()?;
            if self.is_current(&event) {
                return Some(event);
            }
            log::debug!("Dropping event from detached subscription {}", event.subscription());
        }
    }

    /// Take every queued event that belongs to a currently attached listener.
    pub fn drain(&mut self) -> Vec<SyncEvent> {
        std::iter::from_fn(|| self.next_event()).collect()
    }

    fn is_current(&self, event: &SyncEvent) -> bool {
        let current = match event {
            SyncEvent::Boards { .. } | SyncEvent::DefaultBoardFailed { .. } => self.boards_subscription(),
            SyncEvent::Strokes { .. } => self.strokes_subscription(),
        };
        current == Some(event.subscription())
    }

    /// Whether a default board creation is in flight.
    pub fn default_pending(&self) -> bool {
        self.default_pending
    }

    /// Queue creation of the default board for the current board listener.
    pub fn request_default_board(&mut self, collection: CollectionPath, name: String) {
        self.default_pending = true;
        self.queue(StoreRequest::CreateBoard {
            collection,
            name,
            default_for: self.boards_subscription(),
        });
    }

    /// The default board arrived or its creation failed.
    pub fn settle_default_board(&mut self) {
        self.default_pending = false;
    }

    pub fn queue(&mut self, request: StoreRequest) {
        self.requests.push_back(request);
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = &StoreRequest> {
        self.requests.iter()
    }

    pub fn take_requests(&mut self) -> Vec<StoreRequest> {
        self.requests.drain(..).collect()
    }

    /// Runner that executes requests and reports back into this inbox.
    pub fn runner(&self) -> RequestRunner {
        RequestRunner {
            inbox: Rc::clone(&self.inbox),
            wake: self.wake.clone(),
        }
    }

    /// Detach everything and forget queued work and undelivered events.
    pub fn reset(&mut self) {
        self.unwatch_strokes();
        self.unwatch_boards();
        self.requests.clear();
        self.inbox.borrow_mut().clear();
    }

    fn allocate(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

fn post(inbox: &Inbox, wake: Option<&dyn Fn()>, event: SyncEvent) {
    inbox.borrow_mut().push_back(event);
    if let Some(wake) = wake {
        wake();
    }
}

/// Executes queued [`StoreRequest`]s against a store.
///
/// Cheap to clone; holds no reference to the session, so it can be moved
/// into a spawned task.
#[derive(Clone)]
pub struct RequestRunner {
    inbox: Inbox,
    wake: Option<Rc<dyn Fn()>>,
}

impl RequestRunner {
    /// Run one request. Failures are logged and, where the user needs to
    /// know, shown through `notifier`. Nothing is retried.
    pub async fn run(
        &self,
        store: &dyn DocumentStore,
        request: StoreRequest,
        notifier: &dyn Notifier,
    ) -> Result<(), SyncError> {
        match request {
            StoreRequest::SaveStroke { collection, stroke } => {
                let result = save_stroke(store, &collection, &stroke).await;
                if let Err(e) = &result {
                    log::error!("Failed to save stroke to {}: {}", collection, e);
                    notifier.show_message(SAVE_FAILED_MESSAGE);
                }
                result
            }
            StoreRequest::CreateBoard {
                collection,
                name,
                default_for,
            } => {
                let result = create_board(store, &collection, &name).await;
                if let Err(e) = &result {
                    log::error!("Failed to create board {:?}: {}", name, e);
                    if let Some(subscription) = default_for {
                        post(&self.inbox, self.wake.as_deref(), SyncEvent::DefaultBoardFailed { subscription });
                    }
                }
                result
            }
            StoreRequest::ClearBoard { collection } => {
                let result = clear_board(store, &collection).await;
                match &result {
                    Ok(count) => {
                        log::info!("Cleared {} strokes from {}", count, collection);
                        notifier.show_message(CLEARED_MESSAGE);
                    }
                    Err(e) => {
                        log::error!("Failed to clear {}: {}", collection, e);
                        notifier.show_message(CLEAR_FAILED_MESSAGE);
                    }
                }
                result.map(|_| ())
            }
        }
    }
}

/// Persist a completed stroke.
pub async fn save_stroke(
    store: &dyn DocumentStore,
    collection: &CollectionPath,
    stroke: &Stroke,
) -> Result<(), SyncError> {
    let data = DocumentData::from_serializable(stroke)?;
    let path = store.add_doc(collection, data).await?;
    log::debug!("Saved stroke {}", path);
    Ok(())
}

/// Create a board document with a server-assigned creation time. The board
/// reaches the session through the metadata listener, not from here.
pub async fn create_board(store: &dyn DocumentStore, collection: &CollectionPath, name: &str) -> Result<(), SyncError> {
    let record = BoardRecord {
        name: Some(name.to_string()),
        created_at: None,
    };
    let data = DocumentData::from_serializable(&record)?.with_server_timestamp(CREATED_AT_FIELD);
    let path = store.add_doc(collection, data).await?;
    log::info!("Created board {:?} at {}", name, path);
    Ok(())
}

/// Delete every stroke in `collection`.
///
/// Deletions run independently and in parallel; this is best effort, not a
/// transaction. Returns the number of deleted strokes.
pub async fn clear_board(store: &dyn DocumentStore, collection: &CollectionPath) -> Result<usize, SyncError> {
    let docs = store.get_docs(collection).await?;
    let total = docs.len();
    let paths: Vec<_> = docs.iter().map(|doc| collection.doc(doc.id.clone())).collect();
    let results = join_all(paths.iter().map(|path| store.delete_doc(path))).await;

    let failed = results
        .iter()
        .filter(|result| match result {
            Ok(()) => false,
            Err(e) => {
                log::warn!("Failed to delete stroke: {}", e);
                true
            }
        })
        .count();

    if failed > 0 {
        return Err(SyncError::PartialClear { failed, total });
    }
    Ok(total)
}
