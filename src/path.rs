//! Gesture capture and curve smoothing.

use serde::{Deserialize, Serialize};
use tiny_skia::PathBuilder;

/// A position in mask space, i.e. pixel coordinates of the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// The points accepted during one gesture.
///
/// The path always holds at least its anchor point. Consecutive points are joined
/// by quadratic segments through their midpoints, which turns jittery pointer input
/// into a smooth curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct StrokePath {
    points: Vec<Point>,
}

impl StrokePath {
    pub fn start(x: f32, y: f32) -> Self {
        Self {
            points: vec![Point::new(x, y)],
        }
    }

    /// Appends `(x, y)` if it moved at least `tolerance` away from the latest point
    /// on either axis. Returns whether the point was accepted.
    pub fn add_point(&mut self, x: f32, y: f32, tolerance: f32) -> bool {
        let latest = self.latest_point();
        let dx = (x - latest.x).abs();
        let dy = (y - latest.y).abs();
        if dx >= tolerance || dy >= tolerance {
            self.points.push(Point::new(x, y));
            true
        } else {
            false
        }
    }

    pub fn latest_point(&self) -> Point {
        // The anchor is never removed
        self.points[self.points.len() - 1]
    }

    pub fn has_multiple_points(&self) -> bool {
        self.points.len() > 1
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Builds the smoothed curve, or `None` while only the anchor exists.
    pub fn to_geometry(&self) -> Option<tiny_skia::Path> {
        let (first, rest) = self.points.split_first()?;
        if rest.is_empty() {
            return None;
        }

        let mut builder = PathBuilder::new();
        builder.move_to(first.x, first.y);

        let mut previous = *first;
        for &point in rest {
            let mid = previous.midpoint(point);
            builder.quad_to(previous.x, previous.y, mid.x, mid.y);
            previous = point;
        }
        builder.line_to(previous.x, previous.y);

        builder.finish()
    }
}

impl TryFrom<Vec<Point>> for StrokePath {
    type Error = &'static str;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        if points.is_empty() {
            Err("a stroke path needs at least its anchor point")
        } else {
            Ok(Self { points })
        }
    }
}

impl From<StrokePath> for Vec<Point> {
    fn from(path: StrokePath) -> Self {
        path.points
    }
}
