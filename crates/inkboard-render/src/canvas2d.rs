//! `CanvasRenderingContext2d` surface for the browser.

use kurbo::{BezPath, PathEl, Rect, Vec2};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::renderer::{RenderResult, RendererError, StrokePaint, Surface};

fn render_failed(e: JsValue) -> RendererError {
    RendererError::RenderFailed(format!("{:?}", e))
}

/// Draws onto an HTML canvas through its 2D context.
pub struct Canvas2dSurface {
    context: CanvasRenderingContext2d,
}

impl Canvas2dSurface {
    /// Get the 2D context of `canvas`.
    pub fn new(canvas: &HtmlCanvasElement) -> RenderResult<Self> {
        let context = canvas
            .get_context("2d")
            .map_err(|e| RendererError::InitFailed(format!("{:?}", e)))?
            .ok_or_else(|| RendererError::InitFailed("Canvas has no 2d context".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| RendererError::InitFailed("Unexpected context type".to_string()))?;
        Ok(Self { context })
    }

    pub fn context(&self) -> &CanvasRenderingContext2d {
        &self.context
    }
}

impl Surface for Canvas2dSurface {
    fn clear(&mut self, rect: Rect) -> RenderResult<()> {
        self.context.clear_rect(rect.x0, rect.y0, rect.width(), rect.height());
        Ok(())
    }

    fn save(&mut self) -> RenderResult<()> {
        self.context.save();
        Ok(())
    }

    fn restore(&mut self) -> RenderResult<()> {
        self.context.restore();
        Ok(())
    }

    fn translate(&mut self, offset: Vec2) -> RenderResult<()> {
        self.context.translate(offset.x, offset.y).map_err(render_failed)
    }

    fn stroke_path(&mut self, path: &BezPath, paint: &StrokePaint) -> RenderResult<()> {
        let ctx = &self.context;
        ctx.begin_path();
        for element in path.elements() {
            match *element {
                PathEl::MoveTo(p) => ctx.move_to(p.x, p.y),
                PathEl::LineTo(p) => ctx.line_to(p.x, p.y),
                PathEl::QuadTo(c, p) => ctx.quadratic_curve_to(c.x, c.y, p.x, p.y),
                PathEl::CurveTo(c1, c2, p) => ctx.bezier_curve_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
                PathEl::ClosePath => ctx.close_path(),
            }
        }
        ctx.set_stroke_style_str(&paint.css_color());
        ctx.set_line_width(paint.width);
        ctx.set_line_cap("round");
        ctx.set_line_join("round");
        ctx.stroke();
        Ok(())
    }
}
