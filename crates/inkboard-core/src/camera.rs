//! Camera module for the canvas pan offset.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Camera holds the pan offset between canvas content and the surface.
///
/// Rendering translates content by `offset`; input mapping subtracts it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan)
    pub offset: Vec2,
}

impl Camera {
    /// Create a new camera with no offset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the affine transform for rendering.
    ///
    /// This transform converts canvas-content coordinates to surface coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset)
    }

    /// Convert a surface point to canvas-content coordinates.
    pub fn surface_to_canvas(&self, surface_point: Point) -> Point {
        surface_point - self.offset
    }

    /// Pan the camera by a delta in surface coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Reset camera to no offset.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
    }
}
