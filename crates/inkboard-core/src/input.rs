//! Pointer input and coordinate mapping.
//!
//! Browser events arrive in client (viewport) coordinates. The drawing
//! surface sits inside a scrollable container, so a client point is mapped
//! to canvas content as
//! `client - container origin + container scroll - pan offset`.

use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;

/// Position data carried by a pointer event, mouse or touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerInput {
    /// Mouse-like event with a single client position.
    Mouse { client: Point },
    /// Touch event; the first contact is the primary one. Empty on a
    /// `touchend` that lifted the last finger.
    Touch { touches: Vec<Point> },
}

impl PointerInput {
    pub fn mouse(x: f64, y: f64) -> Self {
        PointerInput::Mouse {
            client: Point::new(x, y),
        }
    }

    pub fn touch(x: f64, y: f64) -> Self {
        PointerInput::Touch {
            touches: vec![Point::new(x, y)],
        }
    }

    /// Client position of the primary pointer, if there is one.
    pub fn client_position(&self) -> Option<Point> {
        match self {
            PointerInput::Mouse { client } => Some(*client),
            PointerInput::Touch { touches } => touches.first().copied(),
        }
    }
}

/// Geometry of the scrollable container around the drawing surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerGeometry {
    /// Top-left corner of the container's bounding rect, in client coordinates.
    pub origin: Point,
    /// Current scroll offset (scrollLeft, scrollTop).
    pub scroll: Vec2,
    /// Visible size of the container (clientWidth, clientHeight).
    pub client_size: Size,
}

impl ContainerGeometry {
    pub fn new(origin: Point, scroll: Vec2, client_size: Size) -> Self {
        Self {
            origin,
            scroll,
            client_size,
        }
    }

    /// Map a pointer event to canvas-content coordinates.
    ///
    /// Returns `None` when the event has neither a position nor a touch contact.
    pub fn map(&self, input: &PointerInput, camera: &Camera) -> Option<Point> {
        let client = input.client_position()?;
        let in_container = Point::new(client.x - self.origin.x, client.y - self.origin.y);
        Some(camera.surface_to_canvas(in_container + self.scroll))
    }

    /// Scroll offset that centres a canvas of `canvas_size` in the container.
    pub fn centered_scroll(&self, canvas_size: Size) -> Vec2 {
        Vec2::new(
            ((canvas_size.width - self.client_size.width) / 2.0).max(0.0),
            ((canvas_size.height - self.client_size.height) / 2.0).max(0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> ContainerGeometry {
        ContainerGeometry::new(Point::new(100.0, 50.0), Vec2::new(700.0, 800.0), Size::new(600.0, 400.0))
    }

    #[test]
    fn test_map_mouse() {
        let point = geometry().map(&PointerInput::mouse(150.0, 70.0), &Camera::new()).unwrap();
        assert!((point.x - 750.0).abs() < f64::EPSILON);
        assert!((point.y - 820.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_map_uses_primary_touch() {
        let input = PointerInput::Touch {
            touches: vec![Point::new(110.0, 60.0), Point::new(500.0, 500.0)],
        };
        let point = geometry().map(&input, &Camera::new()).unwrap();
        assert_eq!(point, Point::new(710.0, 810.0));
    }

    #[test]
    fn test_map_subtracts_pan() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(10.0, -10.0));
        let point = geometry().map(&PointerInput::mouse(100.0, 50.0), &camera).unwrap();
        assert_eq!(point, Point::new(690.0, 810.0));
    }

    #[test]
    fn test_map_at_client_origin() {
        let geometry = ContainerGeometry::default();
        let point = geometry.map(&PointerInput::mouse(0.0, 0.0), &Camera::new());
        assert_eq!(point, Some(Point::ZERO));
    }

    #[test]
    fn test_map_without_contact() {
        let input = PointerInput::Touch { touches: Vec::new() };
        assert_eq!(geometry().map(&input, &Camera::new()), None);
    }

    #[test]
    fn test_centered_scroll() {
        let scroll = geometry().centered_scroll(Size::new(2000.0, 2000.0));
        assert_eq!(scroll, Vec2::new(700.0, 800.0));

        let wide = ContainerGeometry::new(Point::ZERO, Vec2::ZERO, Size::new(3000.0, 100.0));
        assert_eq!(wide.centered_scroll(Size::new(2000.0, 2000.0)), Vec2::new(0.0, 950.0));
    }
}
