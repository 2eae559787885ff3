//! WebAssembly entry point and browser bindings.
//!
//! JavaScript supplies the document store (`JsDocumentStore`), a message
//! callback and the ids of the canvas and its scroll container; everything
//! else runs in Rust.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use inkboard_core::WhiteboardConfig;
use inkboard_core::input::{ContainerGeometry, PointerInput};
use inkboard_core::store::{
    BoxFuture, ChangeKind, CollectionPath, Direction, DocPath, Document, DocumentChange, DocumentData,
    DocumentStore, ListenerRegistration, Query, Snapshot, SnapshotListener, StoreError, StoreResult,
};
use inkboard_core::sync::Notifier;
use inkboard_render::Canvas2dSurface;
use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AddEventListenerOptions, Event, HtmlCanvasElement, HtmlElement, MouseEvent, TouchEvent};

use crate::error::AppError;
use crate::whiteboard::Whiteboard;

#[wasm_bindgen]
extern "C" {
    /// Document store implemented in JavaScript.
    ///
    /// - `addDoc(collection, data, serverTimestampFields) -> Promise<string>`
    /// - `getDocs(collection) -> Promise<{id, data}[]>`
    /// - `deleteDoc(collection, id) -> Promise<void>`
    /// - `onSnapshot(collection, orderBy | null, callback(snapshot, error)) -> unsubscribe`
    ///
    /// Snapshots have the shape `{docs: [{id, data}], changes: [{type, id, data}]}`
    /// with `type` one of `added`, `modified`, `removed`. Server timestamps
    /// are delivered as milliseconds since the epoch.
    pub type JsDocumentStore;

    #[wasm_bindgen(method, js_name = addDoc)]
    fn add_doc(this: &JsDocumentStore, collection: &str, data: JsValue, server_timestamps: js_sys::Array) -> js_sys::Promise;

    #[wasm_bindgen(method, js_name = getDocs)]
    fn get_docs(this: &JsDocumentStore, collection: &str) -> js_sys::Promise;

    #[wasm_bindgen(method, js_name = deleteDoc)]
    fn delete_doc(this: &JsDocumentStore, collection: &str, id: &str) -> js_sys::Promise;

    #[wasm_bindgen(method, js_name = onSnapshot)]
    fn on_snapshot(
        this: &JsDocumentStore,
        collection: &str,
        order_by: JsValue,
        callback: &Closure<dyn FnMut(JsValue, JsValue)>,
    ) -> js_sys::Function;
}

#[derive(Deserialize)]
struct WireDoc {
    id: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct WireChange {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct WireSnapshot {
    #[serde(default)]
    docs: Vec<WireDoc>,
    #[serde(default)]
    changes: Vec<WireChange>,
}

#[derive(Serialize)]
struct WireOrder<'a> {
    field: &'a str,
    descending: bool,
}

fn store_error(e: JsValue) -> StoreError {
    StoreError::Backend(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

/// JS numbers arrive as floats; whole non-negative ones become integers so
/// timestamps decode as `u64`.
fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && (0.0..9.0e15).contains(&f) => Value::from(f as u64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(fields) => Value::Object(fields.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
        other => other,
    }
}

fn decode_snapshot(value: JsValue) -> StoreResult<Snapshot> {
    let wire: WireSnapshot =
        serde_wasm_bindgen::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let docs = wire
        .docs
        .into_iter()
        .map(|doc| Document::new(doc.id, normalize(doc.data)))
        .collect();
    let changes = wire
        .changes
        .into_iter()
        .filter_map(|change| {
            let kind = match change.kind.as_str() {
                "added" => ChangeKind::Added,
                "modified" => ChangeKind::Modified,
                "removed" => ChangeKind::Removed,
                other => {
                    log::warn!("Ignoring change of unknown type {:?}", other);
                    return None;
                }
            };
            Some(DocumentChange {
                kind,
                doc: Document::new(change.id, normalize(change.data)),
            })
        })
        .collect();
    Ok(Snapshot { docs, changes })
}

/// [`DocumentStore`] backed by a [`JsDocumentStore`].
pub struct JsStore {
    inner: JsDocumentStore,
}

impl DocumentStore for JsStore {
    fn add_doc(&self, collection: &CollectionPath, data: DocumentData) -> BoxFuture<'_, StoreResult<DocPath>> {
        let collection = collection.clone();
        let body = data
            .fields()
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| StoreError::Serialization(e.to_string()));
        let timestamps: js_sys::Array = data
            .server_timestamp_fields()
            .iter()
            .map(|field| JsValue::from_str(field))
            .collect();
        Box::pin(async move {
            let promise = self.inner.add_doc(&collection.to_string(), body?, timestamps);
            let id = JsFuture::from(promise).await.map_err(store_error)?;
            let id = id
                .as_string()
                .ok_or_else(|| StoreError::Backend("addDoc did not resolve to an id".to_string()))?;
            Ok(collection.doc(id))
        })
    }

    fn get_docs(&self, collection: &CollectionPath) -> BoxFuture<'_, StoreResult<Vec<Document>>> {
        let promise = self.inner.get_docs(&collection.to_string());
        Box::pin(async move {
            let value = JsFuture::from(promise).await.map_err(store_error)?;
            let docs: Vec<WireDoc> =
                serde_wasm_bindgen::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
            Ok(docs
                .into_iter()
                .map(|doc| Document::new(doc.id, normalize(doc.data)))
                .collect())
        })
    }

    fn delete_doc(&self, doc: &DocPath) -> BoxFuture<'_, StoreResult<()>> {
        let promise = self.inner.delete_doc(&doc.collection.to_string(), &doc.id);
        Box::pin(async move {
            JsFuture::from(promise).await.map_err(store_error)?;
            Ok(())
        })
    }

    fn on_snapshot(&self, query: Query, mut listener: SnapshotListener) -> ListenerRegistration {
        let order_by = query
            .order_by
            .as_ref()
            .and_then(|order| {
                serde_wasm_bindgen::to_value(&WireOrder {
                    field: &order.field,
                    descending: order.direction == Direction::Descending,
                })
                .ok()
            })
            .unwrap_or(JsValue::NULL);

        let callback = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |snapshot: JsValue, error: JsValue| {
            if error.is_null() || error.is_undefined() {
                listener(decode_snapshot(snapshot));
            } else {
                listener(Err(store_error(error)));
            }
        });
        let unsubscribe = self.inner.on_snapshot(&query.collection.to_string(), order_by, &callback);

        ListenerRegistration::new(move || {
            if let Err(e) = unsubscribe.call0(&JsValue::NULL) {
                log::warn!("Unsubscribe failed: {:?}", e);
            }
            drop(callback);
        })
    }
}

struct JsNotifier(js_sys::Function);

impl Notifier for JsNotifier {
    fn show_message(&self, message: &str) {
        if let Err(e) = self.0.call1(&JsValue::NULL, &JsValue::from_str(message)) {
            log::warn!("Message callback failed: {:?}", e);
        }
    }
}

type Board = Whiteboard<JsStore, Canvas2dSurface>;

#[derive(Clone, Copy)]
enum Phase {
    Start,
    Move,
    End,
}

const POINTER_EVENTS: [(&str, Phase); 8] = [
    ("mousedown", Phase::Start),
    ("touchstart", Phase::Start),
    ("mousemove", Phase::Move),
    ("touchmove", Phase::Move),
    ("mouseup", Phase::End),
    ("mouseleave", Phase::End),
    ("touchend", Phase::End),
    ("touchcancel", Phase::End),
];

fn geometry(container: &HtmlElement) -> ContainerGeometry {
    let rect = container.get_bounding_client_rect();
    ContainerGeometry::new(
        Point::new(rect.left(), rect.top()),
        Vec2::new(f64::from(container.scroll_left()), f64::from(container.scroll_top())),
        Size::new(f64::from(container.client_width()), f64::from(container.client_height())),
    )
}

/// Read the pointer position(s) of a mouse or touch event.
fn pointer_input(event: &Event) -> Option<PointerInput> {
    // Dispatch on the event type: `TouchEvent` is not defined in every browser.
    if event.type_().starts_with("touch") {
        let list = event.unchecked_ref::<TouchEvent>().touches();
        let touches = (0..list.length())
            .filter_map(|i| list.get(i))
            .map(|touch| Point::new(f64::from(touch.client_x()), f64::from(touch.client_y())))
            .collect();
        return Some(PointerInput::Touch { touches });
    }
    event
        .dyn_ref::<MouseEvent>()
        .map(|mouse| PointerInput::mouse(f64::from(mouse.client_x()), f64::from(mouse.client_y())))
}

fn handle_pointer(board: &RefCell<Board>, container: &HtmlElement, phase: Phase, event: &Event) {
    let Ok(mut board) = board.try_borrow_mut() else {
        return;
    };
    let container = geometry(container);
    let result = match (phase, pointer_input(event)) {
        (Phase::End, _) => board.pointer_up(),
        (Phase::Start, Some(input)) => board.pointer_down(&input, &container),
        (Phase::Move, Some(input)) => board.pointer_move(&input, &container),
        (_, None) => Ok(()),
    };
    if let Err(e) = result {
        log::error!("Failed to render: {}", e);
    }
    board.dispatch();
}

/// Pump from a fresh task, never from inside a store callback.
fn schedule_pump(board: Weak<RefCell<Board>>) {
    wasm_bindgen_futures::spawn_local(async move {
        let Some(board) = board.upgrade() else {
            return;
        };
        let Ok(mut board) = board.try_borrow_mut() else {
            log::debug!("Whiteboard busy; events stay queued");
            return;
        };
        if let Err(e) = board.pump() {
            log::error!("Failed to render: {}", e);
        }
        board.dispatch();
    });
}

fn attach_listeners(
    canvas: &HtmlCanvasElement,
    container: &HtmlElement,
    board: &Rc<RefCell<Board>>,
) -> Result<Vec<Closure<dyn FnMut(Event)>>, AppError> {
    // Touch listeners must not be passive or preventDefault is ignored.
    let options = AddEventListenerOptions::new();
    options.set_passive(false);

    let mut listeners = Vec::with_capacity(POINTER_EVENTS.len());
    for (name, phase) in POINTER_EVENTS {
        let board = Rc::clone(board);
        let container = container.clone();
        let listener = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            event.prevent_default();
            handle_pointer(&board, &container, phase, &event);
        });
        canvas
            .add_event_listener_with_callback_and_add_event_listener_options(
                name,
                listener.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(|e| AppError::Browser(format!("{:?}", e)))?;
        listeners.push(listener);
    }
    Ok(listeners)
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Whiteboard bound to a canvas element, driven from JavaScript.
#[wasm_bindgen]
pub struct WhiteboardHandle {
    board: Rc<RefCell<Board>>,
    container: HtmlElement,
    _listeners: Vec<Closure<dyn FnMut(Event)>>,
}

#[wasm_bindgen]
impl WhiteboardHandle {
    /// Bind to `#canvasId` inside the scrollable `#containerId`.
    ///
    /// `notify(message)` shows user-facing messages; `config` is an optional
    /// partial configuration object.
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas_id: &str,
        container_id: &str,
        store: JsDocumentStore,
        notify: js_sys::Function,
        config: JsValue,
    ) -> Result<WhiteboardHandle, JsValue> {
        Self::create(canvas_id, container_id, store, notify, config).map_err(|e| {
            log::error!("Whiteboard setup failed: {}", e);
            to_js(e)
        })
    }

    fn create(
        canvas_id: &str,
        container_id: &str,
        store: JsDocumentStore,
        notify: js_sys::Function,
        config: JsValue,
    ) -> Result<Self, AppError> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| AppError::MissingElement("document".to_string()))?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .and_then(|element| element.dyn_into::<HtmlCanvasElement>().ok())
            .ok_or_else(|| AppError::MissingElement(canvas_id.to_string()))?;
        let container = document
            .get_element_by_id(container_id)
            .and_then(|element| element.dyn_into::<HtmlElement>().ok())
            .ok_or_else(|| AppError::MissingElement(container_id.to_string()))?;

        let config: WhiteboardConfig = if config.is_null() || config.is_undefined() {
            WhiteboardConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|e| AppError::Config(e.to_string()))?
        };
        canvas.set_width(config.canvas_size.width as u32);
        canvas.set_height(config.canvas_size.height as u32);

        let surface = Canvas2dSurface::new(&canvas)?;
        let store = Rc::new(JsStore { inner: store });
        let board = Rc::new(RefCell::new(Whiteboard::new(
            config,
            store,
            surface,
            Rc::new(JsNotifier(notify)),
        )));

        let weak = Rc::downgrade(&board);
        board.borrow_mut().set_wake(move || schedule_pump(weak.clone()));
        let listeners = attach_listeners(&canvas, &container, &board)?;

        log::info!("Whiteboard bound to #{}", canvas_id);
        Ok(Self {
            board,
            container,
            _listeners: listeners,
        })
    }

    fn with_board<T>(&self, f: impl FnOnce(&mut Board) -> T) -> Result<T, JsValue> {
        let mut board = self
            .board
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("Whiteboard is busy"))?;
        Ok(f(&mut board))
    }

    /// Start drawing for `userId` in the pairing `pairingCode`.
    #[wasm_bindgen(js_name = startSession)]
    pub fn start_session(&self, user_id: &str, pairing_code: &str) -> Result<(), JsValue> {
        let container = geometry(&self.container);
        let scroll = self
            .with_board(|board| board.start_session(user_id, pairing_code, &container))?
            .map_err(to_js)?;
        self.container.set_scroll_left(scroll.x as i32);
        self.container.set_scroll_top(scroll.y as i32);
        Ok(())
    }

    #[wasm_bindgen(js_name = stopSession)]
    pub fn stop_session(&self) -> Result<(), JsValue> {
        self.with_board(|board| board.stop_session())?.map_err(to_js)
    }

    #[wasm_bindgen(js_name = newBoard)]
    pub fn new_board(&self) -> Result<(), JsValue> {
        self.with_board(|board| {
            let result = board.new_board();
            board.dispatch();
            result
        })?
        .map_err(to_js)
    }

    /// Ask for confirmation, then delete every stroke on the active board.
    #[wasm_bindgen(js_name = clearBoard)]
    pub fn clear_board(&self) -> Result<bool, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        self.with_board(|board| {
            let queued = board.clear_board(&|prompt: &str| window.confirm_with_message(prompt).unwrap_or(false));
            board.dispatch();
            queued
        })
    }

    #[wasm_bindgen(js_name = switchBoard)]
    pub fn switch_board(&self, index: usize) -> Result<(), JsValue> {
        self.with_board(|board| board.switch_to_board(index))?.map_err(to_js)
    }

    pub fn pan(&self, dx: f64, dy: f64) -> Result<(), JsValue> {
        self.with_board(|board| board.pan(Vec2::new(dx, dy)))?.map_err(to_js)
    }

    /// Call `callback(title | null)` whenever the active board changes.
    #[wasm_bindgen(js_name = onTitle)]
    pub fn on_title(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        self.with_board(|board| {
            board.set_title_sink(move |title| {
                let title = title.map(JsValue::from_str).unwrap_or(JsValue::NULL);
                if let Err(e) = callback.call1(&JsValue::NULL, &title) {
                    log::warn!("Title callback failed: {:?}", e);
                }
            })
        })
    }

    /// Number of boards in the pairing.
    #[wasm_bindgen(js_name = boardCount)]
    pub fn board_count(&self) -> Result<usize, JsValue> {
        self.with_board(|board| board.session().state().boards.len())
    }
}

/// Initialize logging and panic reporting.
#[wasm_bindgen(start)]
pub fn run_wasm() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&JsValue::from_str("Logger already initialized"));
    }
    log::info!("Starting Inkboard (WASM)");
}
