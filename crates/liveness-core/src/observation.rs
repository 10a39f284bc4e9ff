//! Per-frame face observation data as produced by the external detector.

use serde::Serialize;

/// 2D point in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    pub fn distance_squared(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Axis-aligned face bounding box in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// One detector result for one face in one frame.
///
/// Head pose angles are in degrees: `yaw` is the left/right turn, `pitch`
/// the up/down tilt, `roll` the in-plane rotation. Mouth landmarks and the
/// smile score are optional — the detector may fail to localize or classify
/// them, and every predicate treats a missing value as "not satisfied"
/// rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    /// Detector-assigned id, stable across frames for the same physical
    /// face. `None` means the detector could not provide a reliable id.
    pub tracking_id: Option<i32>,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub mouth_left: Option<Point>,
    pub mouth_right: Option<Point>,
    pub mouth_bottom: Option<Point>,
    /// Smiling probability in [0, 1], if the detector classified it.
    pub smile_probability: Option<f32>,
    pub bounds: BoundingBox,
}

/// Detector output for one camera frame: zero or more observations plus the
/// frame geometry and a caller-supplied monotonic timestamp.
///
/// Zero observations means no face was found; more than one means the scene
/// is ambiguous and the frame is rejected outright.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub observations: Vec<FaceObservation>,
    pub width: u32,
    pub height: u32,
    /// Milliseconds on any monotonic clock chosen by the caller. Only
    /// differences between timestamps are ever inspected.
    pub timestamp_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_squared_known_geometry() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_squared(&b), 25.0);
        assert_eq!(b.distance_squared(&a), 25.0);
    }

    #[test]
    fn bounding_box_center() {
        let b = BoundingBox::new(100.0, 200.0, 40.0, 60.0);
        assert_eq!(b.center_x(), 120.0);
        assert_eq!(b.center_y(), 230.0);
    }
}
