//! Stroke capture state machine.

use kurbo::Point;

use crate::stroke::{Stroke, StrokeStyle};

/// State of a capture interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CaptureState {
    /// Waiting for a drawing start.
    #[default]
    Idle,
    /// A stroke is being drawn.
    Drawing(Stroke),
}

/// Result of ending a capture.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEnd {
    /// Nothing was being drawn.
    Ignored,
    /// A tap: the single point is dropped and never persisted.
    Discarded,
    /// A stroke with at least two points, ready to persist.
    Completed(Stroke),
}

/// Tracks the in-progress stroke across start/move/end events.
#[derive(Debug, Clone, Default)]
pub struct StrokeCapture {
    state: CaptureState,
}

impl StrokeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a stroke at `point`.
    ///
    /// Starting while already drawing abandons the previous stroke.
    pub fn begin(&mut self, point: Point, author_id: &str, style: &StrokeStyle) {
        if self.is_drawing() {
            log::debug!("Drawing restarted; abandoning the unfinished stroke");
        }
        self.state = CaptureState::Drawing(Stroke::new(point, author_id, style));
    }

    /// Append a point. Returns false when no stroke is in progress.
    pub fn extend(&mut self, point: Point) -> bool {
        match &mut self.state {
            CaptureState::Drawing(stroke) => {
                stroke.add_point(point);
                true
            }
            CaptureState::Idle => false,
        }
    }

    /// End the current stroke and return to idle.
    pub fn finish(&mut self) -> CaptureEnd {
        match std::mem::take(&mut self.state) {
            CaptureState::Idle => CaptureEnd::Ignored,
            CaptureState::Drawing(stroke) if stroke.is_persistable() => CaptureEnd::Completed(stroke),
            CaptureState::Drawing(_) => CaptureEnd::Discarded,
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, CaptureState::Drawing(_))
    }

    /// The stroke currently being drawn.
    pub fn in_progress(&self) -> Option<&Stroke> {
        match &self.state {
            CaptureState::Drawing(stroke) => Some(stroke),
            CaptureState::Idle => None,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> StrokeStyle {
        StrokeStyle::default()
    }

    #[test]
    fn test_begin_seeds_one_point() {
        let mut capture = StrokeCapture::new();
        capture.begin(Point::new(1.0, 1.0), "me", &style());

        let stroke = capture.in_progress().unwrap();
        assert_eq!(stroke.points, vec![Point::new(1.0, 1.0)]);
        assert_eq!(stroke.author_id, "me");
        assert!(capture.is_drawing());
    }

    #[test]
    fn test_points_follow_event_order() {
        let mut capture = StrokeCapture::new();
        let points = [Point::new(0.0, 0.0), Point::new(3.0, 1.0), Point::new(3.0, 1.0), Point::new(-2.0, 8.0)];
        capture.begin(points[0], "me", &style());
        for point in &points[1..] {
            assert!(capture.extend(*point));
        }

        match capture.finish() {
            CaptureEnd::Completed(stroke) => assert_eq!(stroke.points, points.to_vec()),
            other => panic!("expected completed stroke, got {:?}", other),
        }
        assert!(!capture.is_drawing());
    }

    #[test]
    fn test_tap_is_discarded() {
        let mut capture = StrokeCapture::new();
        capture.begin(Point::new(5.0, 5.0), "me", &style());
        assert_eq!(capture.finish(), CaptureEnd::Discarded);
        assert!(capture.in_progress().is_none());
    }

    #[test]
    fn test_zero_distance_drag_completes() {
        let mut capture = StrokeCapture::new();
        capture.begin(Point::new(5.0, 5.0), "me", &style());
        capture.extend(Point::new(5.0, 5.0));
        match capture.finish() {
            CaptureEnd::Completed(stroke) => assert_eq!(stroke.len(), 2),
            other => panic!("expected completed stroke, got {:?}", other),
        }
    }

    #[test]
    fn test_idle_events_are_noops() {
        let mut capture = StrokeCapture::new();
        assert!(!capture.extend(Point::new(1.0, 1.0)));
        assert_eq!(capture.finish(), CaptureEnd::Ignored);
        assert_eq!(capture.state(), &CaptureState::Idle);
    }

    #[test]
    fn test_restart_abandons_previous() {
        let mut capture = StrokeCapture::new();
        capture.begin(Point::new(0.0, 0.0), "me", &style());
        capture.extend(Point::new(1.0, 1.0));
        capture.begin(Point::new(9.0, 9.0), "me", &style());
        assert_eq!(capture.in_progress().unwrap().points, vec![Point::new(9.0, 9.0)]);
    }
}
