//! Inkboard Render Library
//!
//! Surface abstraction and the stroke render engine for Inkboard.
//! [`RecordingSurface`] records draw calls for tests and SVG export; in the
//! browser, `Canvas2dSurface` draws through a 2D canvas context.

mod recording;
mod renderer;

#[cfg(target_arch = "wasm32")]
mod canvas2d;

pub use recording::{DrawCommand, RecordingSurface};
pub use renderer::{
    RenderContext, RenderEngine, RenderResult, RendererError, StrokePaint, Surface, css_color, parse_css_color,
};

#[cfg(target_arch = "wasm32")]
pub use canvas2d::Canvas2dSurface;
