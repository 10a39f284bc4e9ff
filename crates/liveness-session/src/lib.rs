//! Runtime glue for running a liveness sequence against live collaborators.
//!
//! The sequencer in `liveness-core` is synchronous and single-owner; camera
//! frames and photo-capture completions, however, arrive from different
//! places at different times. This crate confines all sequencer state to a
//! single tokio task: frames and caller commands go in through one channel,
//! capture completions are awaited on the same task, and events come back
//! out through another channel. Tearing the session down (dropping the
//! handle or cancelling) makes any late capture completion land on a dead
//! channel, where it is discarded without side effects.

pub mod capture;
pub mod config;
pub mod session;

pub use capture::{CaptureResult, PhotoCapture};
pub use config::SessionConfig;
pub use session::{spawn_session, SessionError, SessionHandle};
