//! Freehand stroke model.

use kurbo::{BezPath, Point};
use serde::{Deserialize, Deserializer, Serialize};

/// Default stroke color (slate gray).
pub const DEFAULT_STROKE_COLOR: &str = "#1f2937";

/// Default stroke width in canvas pixels.
pub const DEFAULT_STROKE_WIDTH: f64 = 4.0;

/// Minimum number of points a stroke needs before it is persisted.
pub const MIN_PERSISTED_POINTS: usize = 2;

/// Color and width applied to a stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_STROKE_COLOR.to_string(),
            width: DEFAULT_STROKE_WIDTH,
        }
    }
}

/// One continuous freehand path.
///
/// Stored documents use the camelCase field names of the remote schema.
/// `color` and `width` may be absent or null in documents written by other
/// clients; they decode as empty/zero and the renderer substitutes its defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    /// Points in capture order.
    pub points: Vec<Point>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub width: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author_id: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Stroke {
    /// Start a stroke at `start`.
    pub fn new(start: Point, author_id: impl Into<String>, style: &StrokeStyle) -> Self {
        Self {
            points: vec![start],
            color: style.color.clone(),
            width: style.width,
            author_id: author_id.into(),
        }
    }

    /// Create from existing points with the default style.
    pub fn from_points(points: Vec<Point>, author_id: impl Into<String>) -> Self {
        let style = StrokeStyle::default();
        Self {
            points,
            color: style.color,
            width: style.width,
            author_id: author_id.into(),
        }
    }

    /// Add a point to the path.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the stroke is long enough to be written to the store.
    /// A single point is a tap and stays local.
    pub fn is_persistable(&self) -> bool {
        self.points.len() >= MIN_PERSISTED_POINTS
    }

    /// Color to paint with, if the stroke carries one.
    pub fn color(&self) -> Option<&str> {
        let color = self.color.trim();
        (!color.is_empty()).then_some(color)
    }

    /// Width to paint with, if the stroke carries a usable one.
    pub fn width(&self) -> Option<f64> {
        (self.width.is_finite() && self.width > 0.0).then_some(self.width)
    }

    /// Polyline through every point.
    ///
    /// A single point yields a zero-length segment so round caps paint a dot.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();

        let Some(first) = self.points.first() else {
            return path;
        };

        path.move_to(*first);
        if self.points.len() == 1 {
            path.line_to(*first);
            return path;
        }
        for point in self.points.iter().skip(1) {
            path.line_to(*point);
        }

        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::PathEl;

    #[test]
    fn test_new_stroke() {
        let stroke = Stroke::new(Point::new(1.0, 2.0), "alice", &StrokeStyle::default());
        assert_eq!(stroke.len(), 1);
        assert_eq!(stroke.author_id, "alice");
        assert_eq!(stroke.color(), Some(DEFAULT_STROKE_COLOR));
        assert!(!stroke.is_persistable());
    }

    #[test]
    fn test_add_points() {
        let mut stroke = Stroke::new(Point::ZERO, "alice", &StrokeStyle::default());
        stroke.add_point(Point::new(10.0, 10.0));
        assert_eq!(stroke.len(), 2);
        assert!(stroke.is_persistable());
    }

    #[test]
    fn test_single_point_path_is_dot() {
        let stroke = Stroke::new(Point::new(3.0, 4.0), "a", &StrokeStyle::default());
        let elements = stroke.to_path().elements().to_vec();
        assert_eq!(
            elements,
            vec![PathEl::MoveTo(Point::new(3.0, 4.0)), PathEl::LineTo(Point::new(3.0, 4.0))]
        );
    }

    #[test]
    fn test_empty_path() {
        let stroke = Stroke::from_points(Vec::new(), "a");
        assert!(stroke.to_path().elements().is_empty());
    }

    #[test]
    fn test_wire_format() {
        let stroke = Stroke::from_points(vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)], "u1");
        let json = serde_json::to_value(&stroke).unwrap();
        assert_eq!(json["authorId"], "u1");
        assert_eq!(json["points"][1]["x"], 10.0);
        assert_eq!(json["color"], DEFAULT_STROKE_COLOR);
    }

    #[test]
    fn test_missing_style_fields() {
        let stroke: Stroke = serde_json::from_str(r#"{ "points": [{ "x": 1, "y": 2 }] }"#).unwrap();
        assert_eq!(stroke.color(), None);
        assert_eq!(stroke.width(), None);
        assert!(stroke.author_id.is_empty());
    }

    #[test]
    fn test_null_style_fields() {
        let stroke: Stroke = serde_json::from_str(
            r#"{ "points": [{ "x": 0, "y": 0 }, { "x": 10, "y": 10 }], "color": null, "width": null, "authorId": null }"#,
        )
        .unwrap();
        assert_eq!(stroke.len(), 2);
        assert_eq!(stroke.color(), None);
        assert_eq!(stroke.width(), None);
        assert!(stroke.author_id.is_empty());
    }
}
