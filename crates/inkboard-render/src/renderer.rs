//! Surface abstraction and the stroke render engine.

use inkboard_core::config::WhiteboardConfig;
use inkboard_core::stroke::Stroke;
use inkboard_core::sync::StrokeCache;
use inkboard_core::session::SessionState;
use kurbo::{BezPath, Rect, Size, Vec2};
use peniko::Color;
use peniko::color::{Srgb, parse_color};
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// How a stroke path is painted. Caps and joins are always round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokePaint {
    pub color: Color,
    pub width: f64,
}

impl StrokePaint {
    /// CSS color string, e.g. `rgba(31, 41, 55, 1)`.
    pub fn css_color(&self) -> String {
        css_color(self.color)
    }
}

/// Format a color for CSS and SVG.
pub fn css_color(color: Color) -> String {
    let rgba = color.to_rgba8();
    let alpha = f64::from(rgba.a) / 255.0;
    format!("rgba({}, {}, {}, {})", rgba.r, rgba.g, rgba.b, alpha)
}

/// Parse a CSS color, `None` if it is not one.
pub fn parse_css_color(value: &str) -> Option<Color> {
    parse_color(value.trim()).ok().map(|color| color.to_alpha_color::<Srgb>())
}

/// A 2D drawing target.
///
/// Mirrors the small subset of an immediate-mode canvas the renderer needs.
pub trait Surface {
    /// Erase `rect` (in untransformed surface coordinates).
    fn clear(&mut self, rect: Rect) -> RenderResult<()>;

    /// Push the current transform.
    fn save(&mut self) -> RenderResult<()>;

    /// Pop the transform pushed by the matching [`save`](Surface::save).
    fn restore(&mut self) -> RenderResult<()>;

    /// Translate subsequent drawing by `offset`.
    fn translate(&mut self, offset: Vec2) -> RenderResult<()>;

    /// Stroke `path` with `paint`.
    fn stroke_path(&mut self, path: &BezPath, paint: &StrokePaint) -> RenderResult<()>;
}

/// Everything one frame draws.
pub struct RenderContext<'a> {
    /// Confirmed strokes, painted in cache order.
    pub strokes: &'a StrokeCache,
    /// Local stroke being drawn, painted last.
    pub in_progress: Option<&'a Stroke>,
    /// Pan offset.
    pub offset: Vec2,
    /// Size of the drawing surface.
    pub canvas_size: Size,
}

impl<'a> RenderContext<'a> {
    pub fn new(strokes: &'a StrokeCache, canvas_size: Size) -> Self {
        Self {
            strokes,
            in_progress: None,
            offset: Vec2::ZERO,
            canvas_size,
        }
    }

    /// Frame for the current state of a session.
    pub fn from_session(state: &'a SessionState, config: &WhiteboardConfig) -> Self {
        Self::new(&state.strokes, config.canvas_size)
            .with_in_progress(state.in_progress())
            .with_offset(state.camera.offset)
    }

    pub fn with_in_progress(mut self, stroke: Option<&'a Stroke>) -> Self {
        self.in_progress = stroke;
        self
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }
}

/// Paints strokes onto a [`Surface`].
#[derive(Debug, Clone)]
pub struct RenderEngine {
    default_color: Color,
    default_width: f64,
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new(&WhiteboardConfig::default())
    }
}

impl RenderEngine {
    pub fn new(config: &WhiteboardConfig) -> Self {
        let default_color = parse_css_color(&config.stroke_color).unwrap_or_else(|| {
            log::warn!("Invalid stroke color {:?} in config, using black", config.stroke_color);
            Color::BLACK
        });
        Self {
            default_color,
            default_width: config.stroke_width,
        }
    }

    /// Paint for `stroke`, substituting defaults for a missing or unusable
    /// color or width.
    pub fn paint_for(&self, stroke: &Stroke) -> StrokePaint {
        let color = stroke.color().and_then(parse_css_color).unwrap_or(self.default_color);
        let width = stroke.width().unwrap_or(self.default_width);
        StrokePaint { color, width }
    }

    /// Repaint the whole frame. Calling it twice with the same context paints
    /// the same thing.
    pub fn redraw(&self, surface: &mut dyn Surface, ctx: &RenderContext) -> RenderResult<()> {
        surface.clear(Rect::from_origin_size((0.0, 0.0), ctx.canvas_size))?;
        surface.save()?;
        surface.translate(ctx.offset)?;

        let strokes = ctx.strokes.strokes().chain(ctx.in_progress);
        let result = strokes.map(|stroke| self.paint_stroke(surface, stroke)).collect::<RenderResult<()>>();

        surface.restore()?;
        result
    }

    /// Paint one stroke over the current content, without clearing.
    pub fn paint_dot(&self, surface: &mut dyn Surface, stroke: &Stroke, offset: Vec2) -> RenderResult<()> {
        surface.save()?;
        surface.translate(offset)?;
        let result = self.paint_stroke(surface, stroke);
        surface.restore()?;
        result
    }

    fn paint_stroke(&self, surface: &mut dyn Surface, stroke: &Stroke) -> RenderResult<()> {
        if stroke.is_empty() {
            return Ok(());
        }
        surface.stroke_path(&stroke.to_path(), &self.paint_for(stroke))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawCommand, RecordingSurface};
    use kurbo::Point;

    fn stroke(points: &[(f64, f64)]) -> Stroke {
        Stroke::from_points(points.iter().map(|(x, y)| Point::new(*x, *y)).collect(), "u")
    }

    fn cache(strokes: &[(&str, Stroke)]) -> StrokeCache {
        let mut cache = StrokeCache::new();
        for (id, stroke) in strokes {
            cache.insert(*id, stroke.clone());
        }
        cache
    }

    fn canvas() -> Size {
        Size::new(2000.0, 2000.0)
    }

    #[test]
    fn test_redraw_is_idempotent() {
        let engine = RenderEngine::default();
        let cache = cache(&[("a", stroke(&[(0.0, 0.0), (10.0, 10.0)])), ("b", stroke(&[(5.0, 5.0), (6.0, 9.0)]))]);
        let ctx = RenderContext::new(&cache, canvas()).with_offset(Vec2::new(3.0, 4.0));
        let mut surface = RecordingSurface::new();

        engine.redraw(&mut surface, &ctx).unwrap();
        let first = surface.visible().to_vec();
        engine.redraw(&mut surface, &ctx).unwrap();

        assert_eq!(surface.visible(), first.as_slice());
        assert_eq!(surface.visible_strokes().len(), 2);
    }

    #[test]
    fn test_redraw_sequence() {
        let engine = RenderEngine::default();
        let cache = cache(&[("a", stroke(&[(0.0, 0.0), (10.0, 10.0)]))]);
        let ctx = RenderContext::new(&cache, canvas()).with_offset(Vec2::new(1.0, 2.0));
        let mut surface = RecordingSurface::new();
        engine.redraw(&mut surface, &ctx).unwrap();

        let commands = surface.commands();
        assert_eq!(commands[0], DrawCommand::Clear(Rect::new(0.0, 0.0, 2000.0, 2000.0)));
        assert_eq!(commands[1], DrawCommand::Save);
        assert_eq!(commands[2], DrawCommand::Translate(Vec2::new(1.0, 2.0)));
        assert!(matches!(commands[3], DrawCommand::Stroke { .. }));
        assert_eq!(commands[4], DrawCommand::Restore);
    }

    #[test]
    fn test_empty_cache_paints_nothing() {
        let engine = RenderEngine::default();
        let cache = StrokeCache::new();
        let mut surface = RecordingSurface::new();
        engine.redraw(&mut surface, &RenderContext::new(&cache, canvas())).unwrap();
        assert!(surface.visible_strokes().is_empty());
    }

    #[test]
    fn test_in_progress_painted_last() {
        let engine = RenderEngine::default();
        let cache = cache(&[("a", stroke(&[(0.0, 0.0), (10.0, 10.0)]))]);
        let local = stroke(&[(50.0, 50.0), (60.0, 60.0)]);
        let ctx = RenderContext::new(&cache, canvas()).with_in_progress(Some(&local));
        let mut surface = RecordingSurface::new();
        engine.redraw(&mut surface, &ctx).unwrap();

        let strokes = surface.visible_strokes();
        assert_eq!(strokes.len(), 2);
        assert_eq!(strokes[1].0, local.to_path());
    }

    #[test]
    fn test_empty_stroke_paints_nothing() {
        let engine = RenderEngine::default();
        let cache = cache(&[("a", stroke(&[]))]);
        let mut surface = RecordingSurface::new();
        engine.redraw(&mut surface, &RenderContext::new(&cache, canvas())).unwrap();
        assert!(surface.visible_strokes().is_empty());
    }

    #[test]
    fn test_paint_dot_does_not_clear() {
        let engine = RenderEngine::default();
        let mut surface = RecordingSurface::new();
        engine.paint_dot(&mut surface, &stroke(&[(4.0, 4.0)]), Vec2::ZERO).unwrap();

        assert!(!surface.commands().iter().any(|c| matches!(c, DrawCommand::Clear(_))));
        assert_eq!(surface.visible_strokes().len(), 1);
    }

    #[test]
    fn test_paint_defaults() {
        let engine = RenderEngine::default();
        let mut unstyled = stroke(&[(0.0, 0.0), (1.0, 1.0)]);
        unstyled.color = "not a color".to_string();
        unstyled.width = 0.0;

        let paint = engine.paint_for(&unstyled);
        assert_eq!(paint.color.to_rgba8(), Color::from_rgba8(0x1f, 0x29, 0x37, 0xff).to_rgba8());
        assert!((paint.width - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_paint_uses_stroke_style() {
        let engine = RenderEngine::default();
        let mut styled = stroke(&[(0.0, 0.0), (1.0, 1.0)]);
        styled.color = "#ff0000".to_string();
        styled.width = 9.0;

        let paint = engine.paint_for(&styled);
        assert_eq!(paint.css_color(), "rgba(255, 0, 0, 1)");
        assert!((paint.width - 9.0).abs() < f64::EPSILON);
    }
}
