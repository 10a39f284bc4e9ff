//! Geometric checks shared by the challenge predicates and the frame filter.

use crate::observation::{BoundingBox, Point};

/// The detection region is reasoned about as an 8×8 grid over the frame:
/// the face center must fall inside the central 4×4 block, and the face
/// must span between 3 and 6 grid cells of the short frame dimension.
/// Rejects faces that are partially out of frame, too far, or too close.
const GRID_DIVISIONS: f32 = 8.0;
const CENTER_HALF_SPAN_CELLS: f32 = 2.0;
const MIN_FACE_CELLS: f32 = 3.0;
const MAX_FACE_CELLS: f32 = 6.0;

/// Whether all three head pose angles are within the given symmetric bounds.
pub fn within_pose_bounds(yaw: f32, pitch: f32, roll: f32, max_yaw: f32, max_pitch: f32, max_roll: f32) -> bool {
    yaw.abs() < max_yaw && pitch.abs() < max_pitch && roll.abs() < max_roll
}

/// Mouth opening angle in degrees, by the law of cosines.
///
/// Given the mouth corners L and R and the lower-lip point B, the angle γ
/// at the vertex spanning R-to-L across the bottom narrows as the mouth
/// opens vertically: near 180° for a closed (flat) mouth, small for a wide
/// open one.
///
/// Returns `None` when the triangle is degenerate (either side through B
/// has zero length), which callers treat as "not open".
pub fn mouth_opening_angle(left: &Point, right: &Point, bottom: &Point) -> Option<f32> {
    let a2 = right.distance_squared(bottom);
    let b2 = left.distance_squared(bottom);
    let c2 = left.distance_squared(right);

    let a = a2.sqrt();
    let b = b2.sqrt();
    if a == 0.0 || b == 0.0 {
        return None;
    }

    let cos_gamma = ((a2 + b2 - c2) / (2.0 * a * b)).clamp(-1.0, 1.0);
    Some(cos_gamma.acos().to_degrees())
}

/// Whether the face bounding box lies within the central detection region
/// of the frame and has a plausible size.
pub fn in_detection_region(bounds: &BoundingBox, frame_width: u32, frame_height: u32) -> bool {
    let w = frame_width as f32;
    let h = frame_height as f32;
    let cell = w.min(h) / GRID_DIVISIONS;

    let cx = bounds.center_x();
    let cy = bounds.center_y();
    let half_span = cell * CENTER_HALF_SPAN_CELLS;
    if (cx - w / 2.0).abs() > half_span || (cy - h / 2.0).abs() > half_span {
        return false;
    }

    let min_size = cell * MIN_FACE_CELLS;
    let max_size = cell * MAX_FACE_CELLS;
    bounds.width >= min_size
        && bounds.width <= max_size
        && bounds.height >= min_size
        && bounds.height <= max_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_bounds_symmetric() {
        assert!(within_pose_bounds(0.0, 0.0, 0.0, 12.0, 20.0, 8.0));
        assert!(within_pose_bounds(-11.9, 19.9, -7.9, 12.0, 20.0, 8.0));
        assert!(!within_pose_bounds(12.0, 0.0, 0.0, 12.0, 20.0, 8.0));
        assert!(!within_pose_bounds(0.0, -20.0, 0.0, 12.0, 20.0, 8.0));
        assert!(!within_pose_bounds(0.0, 0.0, 8.5, 12.0, 20.0, 8.0));
    }

    #[test]
    fn wide_open_mouth_has_small_angle() {
        // Symmetric wide-open shape: corners level, bottom well below.
        let left = Point::new(-10.0, 0.0);
        let right = Point::new(10.0, 0.0);
        let bottom = Point::new(0.0, 10.0);
        let gamma = mouth_opening_angle(&left, &right, &bottom).unwrap();
        assert!(gamma < 115.0, "gamma = {gamma}");
    }

    #[test]
    fn flat_mouth_has_angle_near_180() {
        // Nearly collinear landmarks — mouth closed.
        let left = Point::new(-10.0, 0.0);
        let right = Point::new(10.0, 0.0);
        let bottom = Point::new(0.0, 0.1);
        let gamma = mouth_opening_angle(&left, &right, &bottom).unwrap();
        assert!(gamma > 175.0, "gamma = {gamma}");
    }

    #[test]
    fn degenerate_mouth_triangle_is_none() {
        let p = Point::new(5.0, 5.0);
        let other = Point::new(8.0, 5.0);
        assert_eq!(mouth_opening_angle(&p, &other, &p), None);
        assert_eq!(mouth_opening_angle(&other, &p, &p), None);
    }

    #[test]
    fn exact_right_angle() {
        // Isosceles right triangle at the bottom vertex: gamma = 90°.
        let left = Point::new(-10.0, 0.0);
        let right = Point::new(10.0, 0.0);
        let bottom = Point::new(0.0, 10.0);
        let gamma = mouth_opening_angle(&left, &right, &bottom).unwrap();
        assert!((gamma - 90.0).abs() < 0.01, "gamma = {gamma}");
    }

    // 480×640 frame: cell = 60, center must be within ±120 of (240, 320),
    // face size must be within [180, 360].

    #[test]
    fn centered_face_accepted() {
        let b = BoundingBox::new(140.0, 220.0, 200.0, 200.0);
        assert!(in_detection_region(&b, 480, 640));
    }

    #[test]
    fn off_center_face_rejected() {
        let b = BoundingBox::new(0.0, 220.0, 200.0, 200.0);
        assert!(!in_detection_region(&b, 480, 640));
    }

    #[test]
    fn too_small_face_rejected() {
        let b = BoundingBox::new(190.0, 270.0, 100.0, 100.0);
        assert!(!in_detection_region(&b, 480, 640));
    }

    #[test]
    fn too_large_face_rejected() {
        let b = BoundingBox::new(40.0, 120.0, 400.0, 400.0);
        assert!(!in_detection_region(&b, 480, 640));
    }
}
