//! Challenge kinds, tunable thresholds, and the per-frame pass predicates.
//!
//! Challenges are pure functions over `(Thresholds, FaceObservation)`; all
//! accumulated state (dwell counters, shake flags) lives in the sequencer.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::geometry;
use crate::observation::FaceObservation;

/// One required liveness gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeKind {
    /// Hold the head straight toward the camera.
    FacingCamera,
    /// Smile while facing the camera.
    Smile,
    /// Turn the head clearly to either side.
    SideFace,
    /// Open the mouth while facing the camera.
    MouthOpen,
    /// Shake the head left and right within a short time window.
    Shake,
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChallengeKind::FacingCamera => "facing-camera",
            ChallengeKind::Smile => "smile",
            ChallengeKind::SideFace => "side-face",
            ChallengeKind::MouthOpen => "mouth-open",
            ChallengeKind::Shake => "shake",
        };
        f.write_str(name)
    }
}

impl FromStr for ChallengeKind {
    type Err = UnknownChallenge;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "facing-camera" | "facing" => Ok(ChallengeKind::FacingCamera),
            "smile" => Ok(ChallengeKind::Smile),
            "side-face" | "side" => Ok(ChallengeKind::SideFace),
            "mouth-open" | "mouth" => Ok(ChallengeKind::MouthOpen),
            "shake" => Ok(ChallengeKind::Shake),
            other => Err(UnknownChallenge(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown challenge kind: {0:?}")]
pub struct UnknownChallenge(pub String);

/// The default challenge list used by the sample flows.
pub fn default_challenges() -> Vec<ChallengeKind> {
    vec![
        ChallengeKind::FacingCamera,
        ChallengeKind::Shake,
        ChallengeKind::MouthOpen,
    ]
}

/// Tunable thresholds for all predicates and dwell requirements.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Facing-camera bound on |yaw|, degrees.
    pub facing_yaw: f32,
    /// Facing-camera bound on |pitch|, degrees.
    pub facing_pitch: f32,
    /// Facing-camera bound on |roll|, degrees.
    pub facing_roll: f32,
    /// Smile challenge: smiling probability must exceed this.
    pub smile_probability: f32,
    /// Side-face challenge: |yaw| must exceed this, degrees.
    pub side_face_yaw: f32,
    /// Mouth-open challenge: opening angle γ must be below this, degrees.
    pub mouth_open_angle: f32,
    /// Shake challenge: |yaw| excursion that sets a side flag, degrees.
    pub shake_yaw: f32,
    /// Shake challenge: both side flags must be set within this window.
    pub shake_window_ms: u64,
    /// Dwell requirement for counter-based challenges: the predicate must
    /// hold for more than this many consecutive frames.
    pub dwell_frames: u32,
    /// Observations cached to absorb single-frame detector dropouts.
    pub history_capacity: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            facing_yaw: 12.0,
            facing_pitch: 20.0,
            facing_roll: 8.0,
            smile_probability: 0.67,
            side_face_yaw: 20.0,
            mouth_open_angle: 115.0,
            shake_yaw: 18.0,
            shake_window_ms: 3000,
            dwell_frames: 20,
            history_capacity: 5,
        }
    }
}

/// Whether the head is held straight toward the camera.
pub fn is_facing(t: &Thresholds, obs: &FaceObservation) -> bool {
    geometry::within_pose_bounds(
        obs.yaw,
        obs.pitch,
        obs.roll,
        t.facing_yaw,
        t.facing_pitch,
        t.facing_roll,
    )
}

/// Smiling while facing the camera. A missing smile score never passes.
pub fn is_smiling(t: &Thresholds, obs: &FaceObservation) -> bool {
    let smiling = obs
        .smile_probability
        .map(|p| p > t.smile_probability)
        .unwrap_or(false);
    smiling && is_facing(t, obs)
}

/// Head turned clearly to either side, without tilting or rolling.
pub fn is_side_face(t: &Thresholds, obs: &FaceObservation) -> bool {
    obs.yaw.abs() > t.side_face_yaw
        && obs.pitch.abs() < t.facing_pitch
        && obs.roll.abs() < t.facing_roll
}

/// Mouth open while facing the camera. Missing landmarks never pass.
pub fn is_mouth_open(t: &Thresholds, obs: &FaceObservation) -> bool {
    if !is_facing(t, obs) {
        return false;
    }
    let (Some(left), Some(right), Some(bottom)) =
        (&obs.mouth_left, &obs.mouth_right, &obs.mouth_bottom)
    else {
        return false;
    };
    match geometry::mouth_opening_angle(left, right, bottom) {
        Some(gamma) => gamma < t.mouth_open_angle,
        None => false,
    }
}

/// Per-frame pass predicate for the given challenge.
///
/// Shake has no per-frame predicate — it completes through timestamped side
/// flags accumulated by the sequencer — so it never passes here.
pub fn frame_passes(kind: ChallengeKind, t: &Thresholds, obs: &FaceObservation) -> bool {
    match kind {
        ChallengeKind::FacingCamera => is_facing(t, obs),
        ChallengeKind::Smile => is_smiling(t, obs),
        ChallengeKind::SideFace => is_side_face(t, obs),
        ChallengeKind::MouthOpen => is_mouth_open(t, obs),
        ChallengeKind::Shake => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{BoundingBox, Point};

    fn obs(yaw: f32, pitch: f32, roll: f32) -> FaceObservation {
        FaceObservation {
            tracking_id: Some(1),
            yaw,
            pitch,
            roll,
            mouth_left: None,
            mouth_right: None,
            mouth_bottom: None,
            smile_probability: None,
            bounds: BoundingBox::new(140.0, 220.0, 200.0, 200.0),
        }
    }

    #[test]
    fn facing_within_bounds() {
        let t = Thresholds::default();
        assert!(is_facing(&t, &obs(0.0, 0.0, 0.0)));
        assert!(is_facing(&t, &obs(-11.0, 19.0, -7.0)));
        assert!(!is_facing(&t, &obs(13.0, 0.0, 0.0)));
        assert!(!is_facing(&t, &obs(0.0, 21.0, 0.0)));
        assert!(!is_facing(&t, &obs(0.0, 0.0, 9.0)));
    }

    #[test]
    fn smile_requires_score_and_facing() {
        let t = Thresholds::default();

        let mut smiling = obs(0.0, 0.0, 0.0);
        smiling.smile_probability = Some(0.9);
        assert!(is_smiling(&t, &smiling));

        // High score but head turned away.
        let mut turned = obs(30.0, 0.0, 0.0);
        turned.smile_probability = Some(0.9);
        assert!(!is_smiling(&t, &turned));

        // Facing but score below threshold, or unclassified.
        let mut faint = obs(0.0, 0.0, 0.0);
        faint.smile_probability = Some(0.5);
        assert!(!is_smiling(&t, &faint));
        assert!(!is_smiling(&t, &obs(0.0, 0.0, 0.0)));
    }

    #[test]
    fn side_face_either_direction() {
        let t = Thresholds::default();
        assert!(is_side_face(&t, &obs(25.0, 0.0, 0.0)));
        assert!(is_side_face(&t, &obs(-25.0, 0.0, 0.0)));
        assert!(!is_side_face(&t, &obs(15.0, 0.0, 0.0)));
        // Turned, but also tilted beyond the facing bounds.
        assert!(!is_side_face(&t, &obs(25.0, 25.0, 0.0)));
        assert!(!is_side_face(&t, &obs(25.0, 0.0, 9.0)));
    }

    #[test]
    fn mouth_open_requires_landmarks() {
        let t = Thresholds::default();
        let mut open = obs(0.0, 0.0, 0.0);
        open.mouth_left = Some(Point::new(-10.0, 0.0));
        open.mouth_right = Some(Point::new(10.0, 0.0));
        open.mouth_bottom = Some(Point::new(0.0, 10.0));
        assert!(is_mouth_open(&t, &open));

        // Same landmarks, head turned away.
        let mut turned = open.clone();
        turned.yaw = 30.0;
        assert!(!is_mouth_open(&t, &turned));

        // Flat (closed) mouth.
        let mut closed = obs(0.0, 0.0, 0.0);
        closed.mouth_left = Some(Point::new(-10.0, 0.0));
        closed.mouth_right = Some(Point::new(10.0, 0.0));
        closed.mouth_bottom = Some(Point::new(0.0, 0.1));
        assert!(!is_mouth_open(&t, &closed));

        // Missing a landmark.
        let mut partial = open.clone();
        partial.mouth_bottom = None;
        assert!(!is_mouth_open(&t, &partial));
    }

    #[test]
    fn challenge_kind_round_trips_through_str() {
        for kind in [
            ChallengeKind::FacingCamera,
            ChallengeKind::Smile,
            ChallengeKind::SideFace,
            ChallengeKind::MouthOpen,
            ChallengeKind::Shake,
        ] {
            assert_eq!(kind.to_string().parse::<ChallengeKind>().unwrap(), kind);
        }
        assert_eq!("facing".parse::<ChallengeKind>().unwrap(), ChallengeKind::FacingCamera);
        assert_eq!("mouth".parse::<ChallengeKind>().unwrap(), ChallengeKind::MouthOpen);
        assert!("grimace".parse::<ChallengeKind>().is_err());
    }

    #[test]
    fn challenge_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ChallengeKind::MouthOpen).unwrap();
        assert_eq!(json, "\"mouth-open\"");
    }
}
