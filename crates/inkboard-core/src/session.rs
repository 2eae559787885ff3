//! Board session controller.
//!
//! A [`BoardSession`] owns everything a running whiteboard needs: identity,
//! board list, active board, stroke cache, capture state and the sync layer.
//! Every operation takes the session explicitly; there is no global state.

use kurbo::Vec2;
use thiserror::Error;

use crate::board::Board;
use crate::camera::Camera;
use crate::capture::{CaptureEnd, StrokeCapture};
use crate::config::WhiteboardConfig;
use crate::input::{ContainerGeometry, PointerInput};
use crate::store::{CollectionPath, DocumentStore, Snapshot};
use crate::stroke::Stroke;
use crate::sync::{BoardsPlan, RequestRunner, StoreRequest, StoreScope, StrokeCache, SyncEvent, SyncLayer, plan_boards};

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("A user id and a pairing code are required")]
    MissingIdentity,
    #[error("No session is running")]
    NotStarted,
}

/// Who is drawing, and with whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: String,
    pub pairing_code: String,
}

/// The board currently shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveBoard {
    /// Position in the creation-ordered board list.
    pub index: usize,
    pub id: String,
    pub title: String,
}

/// How much of the surface must be repainted after an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum RenderRequest {
    #[default]
    None,
    /// Paint the in-progress stroke on top of what is there.
    Dot,
    /// Clear and repaint everything.
    Full,
}

impl RenderRequest {
    /// The stronger of two requests.
    pub fn merge(self, other: RenderRequest) -> RenderRequest {
        self.max(other)
    }
}

/// Mutable state of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub identity: Option<SessionIdentity>,
    pub active: Option<ActiveBoard>,
    /// Boards in creation order, as last reported by the store.
    pub boards: Vec<Board>,
    pub strokes: StrokeCache,
    pub capture: StrokeCapture,
    pub camera: Camera,
}

impl SessionState {
    /// Back to the empty initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.id.as_str())
    }

    /// The stroke being drawn locally, if any.
    pub fn in_progress(&self) -> Option<&Stroke> {
        self.capture.in_progress()
    }
}

/// A clear awaiting user confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClear {
    pub board_id: String,
    pub title: String,
    pub collection: CollectionPath,
}

impl PendingClear {
    /// Question to put to the user.
    pub fn prompt(&self) -> String {
        format!("Clear every stroke on \"{}\"? This cannot be undone.", self.title)
    }
}

/// Controller tying capture, sync and board selection together.
pub struct BoardSession {
    config: WhiteboardConfig,
    state: SessionState,
    sync: SyncLayer,
    scope: Option<StoreScope>,
}

impl BoardSession {
    pub fn new(config: WhiteboardConfig) -> Self {
        Self {
            config,
            state: SessionState::default(),
            sync: SyncLayer::new(),
            scope: None,
        }
    }

    pub fn config(&self) -> &WhiteboardConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.identity.is_some()
    }

    /// Title of the active board.
    pub fn title(&self) -> Option<&str> {
        self.state.active.as_ref().map(|active| active.title.as_str())
    }

    /// See [`SyncLayer::set_wake`].
    pub fn set_wake(&mut self, wake: impl Fn() + 'static) {
        self.sync.set_wake(wake);
    }

    /// Start a session for `user_id` in the pairing `pairing_code`.
    ///
    /// A running session is stopped first. Returns the scroll offset that
    /// centres the canvas in `container`.
    pub fn start(
        &mut self,
        store: &dyn DocumentStore,
        user_id: &str,
        pairing_code: &str,
        container: &ContainerGeometry,
    ) -> Result<Vec2, SessionError> {
        if user_id.trim().is_empty() || pairing_code.trim().is_empty() {
            log::warn!("Cannot start a session without a user id and a pairing code");
            return Err(SessionError::MissingIdentity);
        }
        if self.is_running() {
            self.stop();
        }

        let scope = StoreScope::new(self.config.app_id.as_str(), pairing_code);
        self.state.identity = Some(SessionIdentity {
            user_id: user_id.to_string(),
            pairing_code: pairing_code.to_string(),
        });
        self.sync.watch_boards(store, &scope);
        self.scope = Some(scope);
        log::info!("Session started for pairing {}", pairing_code);

        Ok(container.centered_scroll(self.config.canvas_size))
    }

    /// Detach every listener and forget all session data. Safe to call at
    /// any time, any number of times.
    pub fn stop(&mut self) {
        if let Some(identity) = &self.state.identity {
            log::info!("Session stopped for pairing {}", identity.pairing_code);
        }
        self.sync.reset();
        self.state.reset();
        self.scope = None;
    }

    /// Make the board at `index` active and listen to its strokes.
    pub fn switch_to_board(&mut self, store: &dyn DocumentStore, index: usize) -> RenderRequest {
        let Some(scope) = &self.scope else {
            return RenderRequest::None;
        };
        let Some(board) = self.state.boards.get(index) else {
            log::debug!("No board at index {}", index);
            return RenderRequest::None;
        };

        let active = ActiveBoard {
            index,
            id: board.id.clone(),
            title: board.title_or(|| self.config.board_name(index)),
        };
        let collection = scope.strokes(&active.id);
        log::info!("Switching to board {:?} ({})", active.title, active.id);

        self.state.strokes.clear();
        self.sync.watch_strokes(store, collection);
        self.state.active = Some(active);
        RenderRequest::Full
    }

    pub fn pointer_down(&mut self, input: &PointerInput, container: &ContainerGeometry) -> RenderRequest {
        let Some(identity) = &self.state.identity else {
            return RenderRequest::None;
        };
        let Some(point) = container.map(input, &self.state.camera) else {
            return RenderRequest::None;
        };
        let style = self.config.stroke_style();
        self.state.capture.begin(point, &identity.user_id, &style);
        RenderRequest::Dot
    }

    pub fn pointer_move(&mut self, input: &PointerInput, container: &ContainerGeometry) -> RenderRequest {
        let Some(point) = container.map(input, &self.state.camera) else {
            return RenderRequest::None;
        };
        if self.state.capture.extend(point) {
            RenderRequest::Full
        } else {
            RenderRequest::None
        }
    }

    /// End the current stroke and queue it for saving if it has enough points.
    pub fn pointer_up(&mut self) -> RenderRequest {
        match self.state.capture.finish() {
            CaptureEnd::Ignored => RenderRequest::None,
            CaptureEnd::Discarded => RenderRequest::Full,
            CaptureEnd::Completed(stroke) => {
                match (&self.scope, &self.state.active) {
                    (Some(scope), Some(active)) => self.sync.queue(StoreRequest::SaveStroke {
                        collection: scope.strokes(&active.id),
                        stroke,
                    }),
                    _ => log::warn!("Dropping a stroke drawn with no active board"),
                }
                RenderRequest::Full
            }
        }
    }

    /// Shift the canvas content by `delta` surface pixels.
    pub fn pan(&mut self, delta: Vec2) -> RenderRequest {
        if delta == Vec2::ZERO {
            return RenderRequest::None;
        }
        self.state.camera.pan(delta);
        RenderRequest::Full
    }

    /// Queue creation of a board with the next positional name.
    pub fn new_board(&mut self) -> Result<(), SessionError> {
        let scope = self.scope.as_ref().ok_or(SessionError::NotStarted)?;
        let name = self.config.board_name(self.state.boards.len());
        log::info!("Creating board {:?}", name);
        self.sync.queue(StoreRequest::CreateBoard {
            collection: scope.boards(),
            name,
            default_for: None,
        });
        Ok(())
    }

    /// First half of clearing: describe what would be cleared. Nothing
    /// happens until [`confirm_clear_board`](Self::confirm_clear_board).
    pub fn request_clear_board(&self) -> Option<PendingClear> {
        let scope = self.scope.as_ref()?;
        let active = self.state.active.as_ref()?;
        Some(PendingClear {
            board_id: active.id.clone(),
            title: active.title.clone(),
            collection: scope.strokes(&active.id),
        })
    }

    /// Queue the clear confirmed by the user. Returns false when the board is
    /// no longer active.
    pub fn confirm_clear_board(&mut self, pending: PendingClear) -> bool {
        if self.state.active_id() != Some(pending.board_id.as_str()) {
            log::warn!("Board {} is no longer active; not clearing it", pending.board_id);
            return false;
        }
        log::info!("Clearing board {}", pending.board_id);
        self.sync.queue(StoreRequest::ClearBoard {
            collection: pending.collection,
        });
        true
    }

    /// Apply everything that arrived from the store since the last pump.
    pub fn pump(&mut self, store: &dyn DocumentStore) -> RenderRequest {
        let mut render = RenderRequest::None;
        while let Some(event) = self.sync.next_event() {
            let request = match event {
                SyncEvent::Boards { result: Ok(snapshot), .. } => self.apply_boards(store, snapshot),
                SyncEvent::Strokes { result: Ok(snapshot), .. } => {
                    self.state.strokes.apply(&snapshot.changes);
                    RenderRequest::Full
                }
                SyncEvent::Boards { result: Err(e), .. } => {
                    log::error!("Board subscription failed: {}", e);
                    RenderRequest::None
                }
                SyncEvent::Strokes { result: Err(e), .. } => {
                    log::error!("Stroke subscription failed: {}", e);
                    RenderRequest::None
                }
                SyncEvent::DefaultBoardFailed { .. } => {
                    log::warn!("Default board could not be created");
                    self.sync.settle_default_board();
                    RenderRequest::None
                }
            };
            render = render.merge(request);
        }
        render
    }

    fn apply_boards(&mut self, store: &dyn DocumentStore, snapshot: Snapshot) -> RenderRequest {
        self.state.boards = snapshot.docs.iter().map(Board::from_document).collect();
        log::info!("{} boards available", self.state.boards.len());
        if !self.state.boards.is_empty() {
            self.sync.settle_default_board();
        }

        match plan_boards(&self.state.boards, self.state.active_id(), self.sync.default_pending()) {
            BoardsPlan::CreateDefault => {
                let Some(scope) = &self.scope else {
                    return RenderRequest::None;
                };
                let name = self.config.board_name(0);
                log::info!("No boards yet; creating {:?}", name);
                self.sync.request_default_board(scope.boards(), name);
                self.drop_active()
            }
            BoardsPlan::AwaitDefault => self.drop_active(),
            BoardsPlan::Switch(index) => self.switch_to_board(store, index),
            BoardsPlan::Keep(index) => {
                let title = self.state.boards[index].title_or(|| self.config.board_name(index));
                if let Some(active) = &mut self.state.active {
                    active.index = index;
                    active.title = title;
                }
                RenderRequest::Full
            }
        }
    }

    /// Every board is gone: forget the active one.
    fn drop_active(&mut self) -> RenderRequest {
        if self.state.active.take().is_none() {
            return RenderRequest::None;
        }
        self.sync.unwatch_strokes();
        self.state.strokes.clear();
        RenderRequest::Full
    }

    /// Store writes waiting to be executed by the host.
    pub fn take_requests(&mut self) -> Vec<StoreRequest> {
        self.sync.take_requests()
    }

    pub fn has_requests(&self) -> bool {
        self.sync.pending_requests().next().is_some()
    }

    pub fn runner(&self) -> RequestRunner {
        self.sync.runner()
    }
}
