//! Inkboard Core Library
//!
//! Platform-agnostic data model and session logic for the Inkboard shared
//! whiteboard: pointer mapping, stroke capture, the document store
//! abstraction, the sync layer and the board session controller.

pub mod board;
pub mod camera;
pub mod capture;
pub mod config;
pub mod input;
pub mod session;
pub mod store;
pub mod stroke;
pub mod sync;

pub use board::Board;
pub use camera::Camera;
pub use capture::{CaptureEnd, CaptureState, StrokeCapture};
pub use config::WhiteboardConfig;
pub use input::{ContainerGeometry, PointerInput};
pub use session::{ActiveBoard, BoardSession, PendingClear, RenderRequest, SessionError, SessionState};
pub use store::{DocumentStore, MemoryStore, StoreError, StoreResult};
pub use stroke::{Stroke, StrokeStyle};
pub use sync::{Notifier, RequestRunner, StoreRequest, StoreScope, StrokeCache, SyncError};
