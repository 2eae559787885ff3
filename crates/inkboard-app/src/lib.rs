//! Inkboard Application
//!
//! Host bindings around the core session: the [`Whiteboard`] facade, the
//! browser binding (WASM) and the native replay tool.

mod error;
mod whiteboard;

pub use error::{AppError, AppResult};
pub use whiteboard::{Confirm, Whiteboard};

#[cfg(feature = "native")]
pub mod replay;

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::{JsDocumentStore, WhiteboardHandle};
