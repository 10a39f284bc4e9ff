//! Liveness challenge sequencer.
//!
//! A liveness session asks the user to perform a fixed, ordered list of
//! gestures in front of the camera (face the camera, smile, turn sideways,
//! open mouth, shake head). An external face detector reduces each camera
//! frame to zero or more [`FaceObservation`]s; this crate decides whether
//! the currently active challenge has been satisfied, advances through the
//! list, requests a photo capture after each completed challenge, and
//! reports completion of the whole sequence.
//!
//! The crate does no camera I/O and no inference. It is deterministic:
//! time only enters through the per-frame timestamp carried by [`Frame`],
//! so every behavior — including the head-shake time window — can be
//! replayed exactly in tests.
//!
//! Entry point is [`Sequencer`]: feed it frames via
//! [`Sequencer::process_frame`], resolve its capture requests via
//! [`Sequencer::resolve_capture`], and act on the returned [`Event`]s.

pub mod challenge;
pub mod geometry;
pub mod observation;
pub mod sequencer;

pub use challenge::{default_challenges, ChallengeKind, Thresholds, UnknownChallenge};
pub use observation::{BoundingBox, FaceObservation, Frame, Point};
pub use sequencer::{
    CaptureError, CaptureTicket, CapturedPhoto, Event, FailureReason, Sequencer, SequencerError,
};
