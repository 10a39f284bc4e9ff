//! Session configuration, loaded from environment variables.

use liveness_core::{default_challenges, ChallengeKind, Thresholds};

/// Configuration for one liveness session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Ordered challenge list the user must complete.
    pub challenges: Vec<ChallengeKind>,
    /// Predicate and dwell tunables.
    pub thresholds: Thresholds,
    /// Automatic capture retries before parking the sequence for a
    /// caller-driven retry.
    pub capture_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            challenges: default_challenges(),
            thresholds: Thresholds::default(),
            capture_retries: 2,
        }
    }
}

impl SessionConfig {
    /// Load configuration from `LIVENESS_*` environment variables, falling
    /// back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let t = defaults.thresholds;

        let thresholds = Thresholds {
            facing_yaw: env_f32("LIVENESS_FACING_YAW", t.facing_yaw),
            facing_pitch: env_f32("LIVENESS_FACING_PITCH", t.facing_pitch),
            facing_roll: env_f32("LIVENESS_FACING_ROLL", t.facing_roll),
            smile_probability: env_f32("LIVENESS_SMILE_PROBABILITY", t.smile_probability),
            side_face_yaw: env_f32("LIVENESS_SIDE_FACE_YAW", t.side_face_yaw),
            mouth_open_angle: env_f32("LIVENESS_MOUTH_OPEN_ANGLE", t.mouth_open_angle),
            shake_yaw: env_f32("LIVENESS_SHAKE_YAW", t.shake_yaw),
            shake_window_ms: env_u64("LIVENESS_SHAKE_WINDOW_MS", t.shake_window_ms),
            dwell_frames: env_u32("LIVENESS_DWELL_FRAMES", t.dwell_frames),
            history_capacity: env_usize("LIVENESS_HISTORY_CAPACITY", t.history_capacity),
        };

        let challenges = std::env::var("LIVENESS_CHALLENGES")
            .ok()
            .and_then(|raw| parse_challenges(&raw))
            .unwrap_or(defaults.challenges);

        Self {
            challenges,
            thresholds,
            capture_retries: env_u32("LIVENESS_CAPTURE_RETRIES", defaults.capture_retries),
        }
    }
}

/// Parse a comma-separated challenge list such as `"facing,shake,mouth"`.
/// Returns `None` (caller falls back to defaults) if the list is empty or
/// contains an unknown kind.
fn parse_challenges(raw: &str) -> Option<Vec<ChallengeKind>> {
    let kinds: Result<Vec<ChallengeKind>, _> = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect();
    match kinds {
        Ok(kinds) if !kinds.is_empty() => Some(kinds),
        _ => {
            tracing::warn!(raw, "invalid LIVENESS_CHALLENGES, using defaults");
            None
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
