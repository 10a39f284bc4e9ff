//! The photo-capture collaborator boundary.

use std::path::PathBuf;

use liveness_core::{CaptureError, ChallengeKind};
use tokio::sync::oneshot;

/// Outcome of one capture attempt: the stored photo's path, or an error.
pub type CaptureResult = Result<PathBuf, CaptureError>;

/// Asynchronous photo-capture collaborator (camera pipeline, in production).
///
/// `capture` must not block: it starts the capture and returns; the outcome
/// is delivered on `done` whenever it is ready. If the session has been
/// torn down by then the send simply fails and the result is discarded —
/// implementations should ignore the send error.
pub trait PhotoCapture: Send + 'static {
    fn capture(&mut self, challenge: ChallengeKind, done: oneshot::Sender<CaptureResult>);
}
