//! Sequential challenge state machine.
//!
//! The sequencer owns all mutable session state: the challenge cursor, the
//! per-challenge dwell progress, the tracked face identity, and a small
//! history buffer that absorbs single-frame detector dropouts. Challenges
//! themselves are the pure predicates in [`crate::challenge`].
//!
//! Completing a challenge is a two-phase transition: when the predicate is
//! satisfied the sequencer emits a capture request and suspends; only a
//! successful [`Sequencer::resolve_capture`] advances the cursor. A failed
//! capture parks the sequencer at the current challenge until the caller
//! retries — progress is never lost to a capture error.

use std::collections::VecDeque;
use std::path::PathBuf;

use serde::Serialize;

use crate::challenge::{self, ChallengeKind, Thresholds};
use crate::geometry;
use crate::observation::{FaceObservation, Frame};

/// Identifies one outstanding capture request. Tickets are monotonically
/// increasing within a sequencer; a resolution carrying anything but the
/// currently outstanding ticket is ignored, which is what makes capture
/// callbacks arriving after a reset or teardown harmless.
pub type CaptureTicket = u64;

/// Why the sequence was reset to the first challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// No face in the frame and no cached observation left to fall back on.
    NoFace,
    /// More than one face in the frame.
    MultipleFaces,
    /// The face left the central detection region (or is too small/large)
    /// with no cached observation left to fall back on.
    OutOfRegion,
    /// The tracked face was replaced by one with a different tracking id.
    IdentityLost,
}

/// A photo captured after a completed challenge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedPhoto {
    pub challenge: ChallengeKind,
    pub path: PathBuf,
    /// RFC 3339 capture time.
    pub captured_at: String,
}

/// Capture collaborator error, reported back through [`Event::CaptureFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{0}")]
pub struct CaptureError(pub String);

/// Everything the sequencer reports to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "event")]
pub enum Event {
    /// A challenge became active; prompt the user for it.
    ChallengeStarted { challenge: ChallengeKind },
    /// The active challenge's predicate was satisfied with its dwell.
    ChallengePassed { challenge: ChallengeKind },
    /// Take a photo now and resolve it with this ticket.
    CaptureRequested {
        challenge: ChallengeKind,
        ticket: CaptureTicket,
    },
    /// The capture collaborator failed; the sequencer stays parked at the
    /// current challenge until [`Sequencer::retry_capture`].
    CaptureFailed {
        challenge: ChallengeKind,
        error: CaptureError,
    },
    /// The sequence was reset to the first challenge.
    SequenceFailed { reason: FailureReason },
    /// Every challenge completed; photos are in challenge order.
    SequenceComplete { photos: Vec<CapturedPhoto> },
}

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("challenge list is empty")]
    EmptyChallengeList,
}

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// No face acquired yet (initial state, and the target of every reset).
    AwaitingFace,
    /// Evaluating the challenge at `index`.
    Active { index: usize },
    /// Challenge at `index` passed; a capture is outstanding (`Some`) or
    /// failed and awaiting a caller-driven retry (`None`).
    AwaitingCapture {
        index: usize,
        ticket: Option<CaptureTicket>,
    },
    /// Terminal. Further frames and resolutions are ignored.
    Complete,
}

/// Accumulated state for the active challenge, reset on every failing frame
/// (counter) and on every sequence reset.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Progress {
    /// Consecutive passing frames; completes when the count exceeds the
    /// dwell requirement (frame N+1 for a requirement of N).
    Counter { frames: u32 },
    /// Single passing frame completes.
    Single,
    /// Timestamped side flags; completes when both are set within the
    /// shake window. Exceeding the window clears both flags.
    Shake {
        left_at: Option<u64>,
        right_at: Option<u64>,
    },
}

impl Progress {
    fn for_kind(kind: ChallengeKind) -> Self {
        match kind {
            ChallengeKind::SideFace => Progress::Single,
            ChallengeKind::Shake => Progress::Shake {
                left_at: None,
                right_at: None,
            },
            _ => Progress::Counter { frames: 0 },
        }
    }

    /// Feed one observation; returns true when the challenge completes.
    fn observe(
        &mut self,
        kind: ChallengeKind,
        t: &Thresholds,
        obs: &FaceObservation,
        timestamp_ms: u64,
    ) -> bool {
        match self {
            Progress::Counter { frames } => {
                if challenge::frame_passes(kind, t, obs) {
                    *frames += 1;
                    *frames > t.dwell_frames
                } else {
                    *frames = 0;
                    false
                }
            }
            Progress::Single => challenge::frame_passes(kind, t, obs),
            Progress::Shake { left_at, right_at } => {
                if obs.yaw > t.shake_yaw {
                    *left_at = Some(timestamp_ms);
                } else if obs.yaw < -t.shake_yaw {
                    *right_at = Some(timestamp_ms);
                }
                if let (Some(l), Some(r)) = (*left_at, *right_at) {
                    if l.abs_diff(r) < t.shake_window_ms {
                        return true;
                    }
                    // Window elapsed with only stale flags — start over.
                    *left_at = None;
                    *right_at = None;
                }
                false
            }
        }
    }
}

/// The challenge sequencer.
///
/// Feed detector output through [`process_frame`](Self::process_frame) and
/// resolve capture requests through [`resolve_capture`](Self::resolve_capture);
/// both return the events produced by that step, in order.
#[derive(Debug)]
pub struct Sequencer {
    thresholds: Thresholds,
    challenges: Vec<ChallengeKind>,
    phase: Phase,
    progress: Progress,
    tracked_id: Option<i32>,
    history: VecDeque<FaceObservation>,
    last_failure: Option<FailureReason>,
    next_ticket: CaptureTicket,
    photos: Vec<CapturedPhoto>,
}

impl Sequencer {
    pub fn new(
        challenges: Vec<ChallengeKind>,
        thresholds: Thresholds,
    ) -> Result<Self, SequencerError> {
        let first = *challenges.first().ok_or(SequencerError::EmptyChallengeList)?;
        Ok(Self {
            thresholds,
            challenges,
            phase: Phase::AwaitingFace,
            progress: Progress::for_kind(first),
            tracked_id: None,
            history: VecDeque::new(),
            last_failure: None,
            next_ticket: 0,
            photos: Vec::new(),
        })
    }

    /// The challenge currently being evaluated or captured, if any.
    pub fn current_challenge(&self) -> Option<ChallengeKind> {
        match self.phase {
            Phase::Active { index } | Phase::AwaitingCapture { index, .. } => {
                Some(self.challenges[index])
            }
            Phase::AwaitingFace | Phase::Complete => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Whether a capture request is outstanding or parked for retry.
    pub fn is_awaiting_capture(&self) -> bool {
        matches!(self.phase, Phase::AwaitingCapture { .. })
    }

    /// Process one frame of detector output.
    pub fn process_frame(&mut self, frame: &Frame) -> Vec<Event> {
        let mut events = Vec::new();
        if self.phase == Phase::Complete {
            return events;
        }

        let Some(obs) = self.filter(frame, &mut events) else {
            return events;
        };

        if self.phase == Phase::AwaitingFace {
            self.phase = Phase::Active { index: 0 };
            self.progress = Progress::for_kind(self.challenges[0]);
            events.push(Event::ChallengeStarted {
                challenge: self.challenges[0],
            });
        }

        // While a capture is outstanding the frame has already served its
        // purpose (identity continuity); the transition is pending and dwell
        // does not apply.
        if let Phase::Active { index } = self.phase {
            let kind = self.challenges[index];
            if self
                .progress
                .observe(kind, &self.thresholds, &obs, frame.timestamp_ms)
            {
                tracing::debug!(challenge = %kind, "challenge passed");
                events.push(Event::ChallengePassed { challenge: kind });
                let ticket = self.issue_ticket();
                self.phase = Phase::AwaitingCapture {
                    index,
                    ticket: Some(ticket),
                };
                events.push(Event::CaptureRequested {
                    challenge: kind,
                    ticket,
                });
            }
        }

        events
    }

    /// Resolve an outstanding capture request.
    ///
    /// Stale tickets — from a sequence that has since reset, or anything
    /// other than the currently outstanding request — are ignored.
    pub fn resolve_capture(
        &mut self,
        ticket: CaptureTicket,
        result: Result<PathBuf, CaptureError>,
    ) -> Vec<Event> {
        let mut events = Vec::new();
        let Phase::AwaitingCapture {
            index,
            ticket: Some(current),
        } = self.phase
        else {
            tracing::debug!(ticket, "ignoring capture resolution with no request outstanding");
            return events;
        };
        if current != ticket {
            tracing::debug!(ticket, current, "ignoring stale capture resolution");
            return events;
        }

        let kind = self.challenges[index];
        match result {
            Ok(path) => {
                self.photos.push(CapturedPhoto {
                    challenge: kind,
                    path,
                    captured_at: chrono::Utc::now().to_rfc3339(),
                });
                let next = index + 1;
                if next == self.challenges.len() {
                    tracing::info!(photos = self.photos.len(), "liveness sequence complete");
                    self.phase = Phase::Complete;
                    events.push(Event::SequenceComplete {
                        photos: self.photos.clone(),
                    });
                } else {
                    self.phase = Phase::Active { index: next };
                    self.progress = Progress::for_kind(self.challenges[next]);
                    events.push(Event::ChallengeStarted {
                        challenge: self.challenges[next],
                    });
                }
            }
            Err(error) => {
                // Park at this challenge; the caller decides when to retry.
                self.phase = Phase::AwaitingCapture {
                    index,
                    ticket: None,
                };
                events.push(Event::CaptureFailed {
                    challenge: kind,
                    error,
                });
            }
        }
        events
    }

    /// Re-request the capture for a challenge parked by a capture failure.
    ///
    /// Returns the new capture request, or `None` if no retry is pending
    /// (including while a request is still outstanding).
    pub fn retry_capture(&mut self) -> Option<Event> {
        let Phase::AwaitingCapture {
            index,
            ticket: None,
        } = self.phase
        else {
            return None;
        };
        let ticket = self.issue_ticket();
        self.phase = Phase::AwaitingCapture {
            index,
            ticket: Some(ticket),
        };
        Some(Event::CaptureRequested {
            challenge: self.challenges[index],
            ticket,
        })
    }

    fn issue_ticket(&mut self) -> CaptureTicket {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Validate the frame down to at most one usable observation.
    ///
    /// A frame with no usable face first falls back to the cached history
    /// (consuming one entry per dropout frame, so at most `history_capacity`
    /// consecutive dropouts are tolerated); only when the cache is exhausted
    /// does the sequence fail and reset.
    fn filter(&mut self, frame: &Frame, events: &mut Vec<Event>) -> Option<FaceObservation> {
        if frame.observations.len() > 1 {
            self.fail(FailureReason::MultipleFaces, events);
            return None;
        }

        let Some(obs) = frame.observations.first() else {
            return match self.history.pop_front() {
                Some(cached) => {
                    self.last_failure = None;
                    Some(cached)
                }
                None => {
                    self.fail(FailureReason::NoFace, events);
                    None
                }
            };
        };

        if !geometry::in_detection_region(&obs.bounds, frame.width, frame.height) {
            // Out-of-region is transient the same way a dropout is.
            return match self.history.pop_front() {
                Some(cached) => {
                    self.last_failure = None;
                    Some(cached)
                }
                None => {
                    self.fail(FailureReason::OutOfRegion, events);
                    None
                }
            };
        }

        if let Some(id) = obs.tracking_id {
            match self.tracked_id {
                None => self.tracked_id = Some(id),
                Some(tracked) if tracked != id => {
                    self.fail(FailureReason::IdentityLost, events);
                    return None;
                }
                Some(_) => {}
            }
        }

        self.last_failure = None;
        self.history.push_front(obs.clone());
        self.history.truncate(self.thresholds.history_capacity);
        Some(obs.clone())
    }

    /// Reset to the first challenge. The failure event is edge-triggered:
    /// a persisting condition is reported once, not per frame.
    fn fail(&mut self, reason: FailureReason, events: &mut Vec<Event>) {
        let edge = self.last_failure != Some(reason);
        self.reset();
        self.last_failure = Some(reason);
        if edge {
            tracing::debug!(reason = ?reason, "sequence failed, resetting");
            events.push(Event::SequenceFailed { reason });
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::AwaitingFace;
        self.progress = Progress::for_kind(self.challenges[0]);
        self.tracked_id = None;
        self.history.clear();
        self.photos.clear();
    }
}
