//! Display-list surface.
//!
//! Records every call instead of drawing. Tests inspect the commands; the
//! replay tool turns the visible part into SVG.

use kurbo::{Affine, BezPath, Rect, Size, Vec2};
use std::fmt::Write as _;

use crate::renderer::{RenderResult, StrokePaint, Surface};

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Rect),
    Save,
    Restore,
    Translate(Vec2),
    Stroke { path: BezPath, paint: StrokePaint },
}

/// Surface that records [`DrawCommand`]s.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command since creation.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Commands from the last clear on: what is on screen now.
    pub fn visible(&self) -> &[DrawCommand] {
        let start = self
            .commands
            .iter()
            .rposition(|command| matches!(command, DrawCommand::Clear(_)))
            .unwrap_or(0);
        &self.commands[start..]
    }

    /// Visible strokes with their translation applied, in paint order.
    pub fn visible_strokes(&self) -> Vec<(BezPath, StrokePaint)> {
        let mut transform = Affine::IDENTITY;
        let mut stack = Vec::new();
        let mut strokes = Vec::new();

        for command in self.visible() {
            match command {
                DrawCommand::Clear(_) => {}
                DrawCommand::Save => stack.push(transform),
                DrawCommand::Restore => transform = stack.pop().unwrap_or(Affine::IDENTITY),
                DrawCommand::Translate(offset) => transform = transform * Affine::translate(*offset),
                DrawCommand::Stroke { path, paint } => {
                    let mut path = path.clone();
                    path.apply_affine(transform);
                    strokes.push((path, *paint));
                }
            }
        }
        strokes
    }

    /// Render the visible strokes as an SVG document of `size`.
    pub fn to_svg(&self, size: Size, background: &str) -> String {
        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = size.width,
            h = size.height
        );
        let _ = writeln!(svg, r#"  <rect width="100%" height="100%" fill="{}"/>"#, background);
        for (path, paint) in self.visible_strokes() {
            let _ = writeln!(
                svg,
                r#"  <path d="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"/>"#,
                path.to_svg(),
                paint.css_color(),
                paint.width
            );
        }
        svg.push_str("</svg>\n");
        svg
    }

    /// Forget everything recorded so far.
    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self, rect: Rect) -> RenderResult<()> {
        self.commands.push(DrawCommand::Clear(rect));
        Ok(())
    }

    fn save(&mut self) -> RenderResult<()> {
        self.commands.push(DrawCommand::Save);
        Ok(())
    }

    fn restore(&mut self) -> RenderResult<()> {
        self.commands.push(DrawCommand::Restore);
        Ok(())
    }

    fn translate(&mut self, offset: Vec2) -> RenderResult<()> {
        self.commands.push(DrawCommand::Translate(offset));
        Ok(())
    }

    fn stroke_path(&mut self, path: &BezPath, paint: &StrokePaint) -> RenderResult<()> {
        self.commands.push(DrawCommand::Stroke {
            path: path.clone(),
            paint: *paint,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use peniko::Color;

    fn paint() -> StrokePaint {
        StrokePaint {
            color: Color::from_rgba8(0, 0, 255, 255),
            width: 2.0,
        }
    }

    fn segment() -> BezPath {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path
    }

    #[test]
    fn test_visible_starts_at_last_clear() {
        let mut surface = RecordingSurface::new();
        surface.stroke_path(&segment(), &paint()).unwrap();
        surface.clear(Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        surface.save().unwrap();

        assert_eq!(surface.commands().len(), 3);
        assert_eq!(surface.visible().len(), 2);
        assert!(surface.visible_strokes().is_empty());
    }

    #[test]
    fn test_translation_applies_until_restore() {
        let mut surface = RecordingSurface::new();
        surface.save().unwrap();
        surface.translate(Vec2::new(5.0, 5.0)).unwrap();
        surface.stroke_path(&segment(), &paint()).unwrap();
        surface.restore().unwrap();
        surface.stroke_path(&segment(), &paint()).unwrap();

        let strokes = surface.visible_strokes();
        assert_eq!(strokes[0].0.elements()[0], kurbo::PathEl::MoveTo(Point::new(5.0, 5.0)));
        assert_eq!(strokes[1].0.elements()[0], kurbo::PathEl::MoveTo(Point::ZERO));
    }

    #[test]
    fn test_svg_export() {
        let mut surface = RecordingSurface::new();
        surface.clear(Rect::new(0.0, 0.0, 100.0, 50.0)).unwrap();
        surface.stroke_path(&segment(), &paint()).unwrap();

        let svg = surface.to_svg(Size::new(100.0, 50.0), "#ffffff");
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"width="100""#));
        assert!(svg.contains(&format!(r#"d="{}""#, segment().to_svg())));
        assert!(svg.contains(r#"stroke="rgba(0, 0, 255, 1)""#));
        assert!(svg.trim_end().ends_with("</svg>"));
    }
}
