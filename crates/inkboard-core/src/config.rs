//! Whiteboard configuration.

use kurbo::Size;
use serde::{Deserialize, Serialize};

use crate::stroke::{DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH, StrokeStyle};

/// Side length of the default square drawing surface, in pixels.
pub const DEFAULT_CANVAS_EXTENT: f64 = 2000.0;

/// Settings shared by the session, the renderer and the host bindings.
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteboardConfig {
    /// Application namespace used as the root of every store path.
    pub app_id: String,
    /// Size of the drawing surface.
    pub canvas_size: Size,
    /// Color for new strokes and for stored strokes without a usable color.
    pub stroke_color: String,
    /// Width for new strokes and for stored strokes without a width.
    pub stroke_width: f64,
    /// Prefix of positional board names ("Board 1", "Board 2", ...).
    pub board_name_prefix: String,
    /// Background fill used by exports.
    pub background_color: String,
}

impl Default for WhiteboardConfig {
    fn default() -> Self {
        Self {
            app_id: "inkboard".to_string(),
            canvas_size: Size::new(DEFAULT_CANVAS_EXTENT, DEFAULT_CANVAS_EXTENT),
            stroke_color: DEFAULT_STROKE_COLOR.to_string(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            board_name_prefix: "Board".to_string(),
            background_color: "#ffffff".to_string(),
        }
    }
}

impl WhiteboardConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Style applied to freshly captured strokes.
    pub fn stroke_style(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.stroke_color.clone(),
            width: self.stroke_width,
        }
    }

    /// Positional name for the board at `index` (zero-based).
    pub fn board_name(&self, index: usize) -> String {
        format!("{} {}", self.board_name_prefix, index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WhiteboardConfig::default();
        assert_eq!(config.stroke_color, "#1f2937");
        assert!((config.stroke_width - 4.0).abs() < f64::EPSILON);
        assert!((config.canvas_size.width - 2000.0).abs() < f64::EPSILON);
        assert_eq!(config.board_name(0), "Board 1");
    }

    #[test]
    fn test_partial_json() {
        let config = WhiteboardConfig::from_json(r#"{ "app_id": "demo", "stroke_width": 6 }"#).unwrap();
        assert_eq!(config.app_id, "demo");
        assert!((config.stroke_width - 6.0).abs() < f64::EPSILON);
        assert_eq!(config.board_name_prefix, "Board");
    }

    #[test]
    fn test_invalid_json() {
        assert!(WhiteboardConfig::from_json("{ not json").is_err());
    }
}
