//! The session task: one serial event loop owning the sequencer.

use std::collections::VecDeque;
use std::future;

use liveness_core::{CaptureError, CaptureTicket, Event, Frame, Sequencer, SequencerError};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;
use uuid::Uuid;

use crate::capture::{CaptureResult, PhotoCapture};
use crate::config::SessionConfig;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session has shut down")]
    Closed,
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

enum Command {
    Frame(Frame),
    RetryCapture,
    Cancel,
}

/// Handle to a running session task.
///
/// Dropping the handle closes the command channel and tears the task down.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl SessionHandle {
    /// Submit one frame of detector output.
    pub async fn submit_frame(&self, frame: Frame) -> Result<(), SessionError> {
        self.commands
            .send(Command::Frame(frame))
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Re-request a capture parked by repeated capture failures.
    pub async fn retry_capture(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::RetryCapture)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Tear the session down. Safe to call on an already-closed session.
    pub async fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel).await;
    }

    /// Next event from the session, or `None` once the task has exited.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }
}

/// Spawn a session task and return its handle.
///
/// The task is the single owner of the sequencer; frames, retry requests,
/// and capture completions are all serialized through its event loop, so no
/// sequencer state is ever touched from two threads.
pub fn spawn_session<C: PhotoCapture>(
    config: SessionConfig,
    capture: C,
) -> Result<SessionHandle, SessionError> {
    let sequencer = Sequencer::new(config.challenges.clone(), config.thresholds.clone())?;
    let (commands, command_rx) = mpsc::channel(16);
    let (event_tx, events) = mpsc::unbounded_channel();

    let session_id = Uuid::new_v4();
    let span = tracing::info_span!("liveness_session", session = %session_id);
    tokio::spawn(run(sequencer, config, capture, command_rx, event_tx).instrument(span));

    Ok(SessionHandle { commands, events })
}

async fn run<C: PhotoCapture>(
    mut sequencer: Sequencer,
    config: SessionConfig,
    mut capture: C,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<Event>,
) {
    tracing::info!(challenges = ?config.challenges, "session started");

    let mut pending: Option<(CaptureTicket, oneshot::Receiver<CaptureResult>)> = None;
    let mut retries_left = config.capture_retries;

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                let produced = match cmd {
                    None | Some(Command::Cancel) => {
                        tracing::info!("session cancelled");
                        return;
                    }
                    Some(Command::Frame(frame)) => sequencer.process_frame(&frame),
                    Some(Command::RetryCapture) => {
                        sequencer.retry_capture().into_iter().collect()
                    }
                };
                if dispatch(
                    produced,
                    &mut sequencer,
                    &mut capture,
                    &mut pending,
                    &mut retries_left,
                    &config,
                    &events,
                ) {
                    return;
                }
            }
            result = recv_pending(&mut pending), if pending.is_some() => {
                let Some((ticket, _)) = pending.take() else {
                    continue;
                };
                let result = result.unwrap_or_else(|_| {
                    Err(CaptureError("capture collaborator dropped".into()))
                });
                let produced = sequencer.resolve_capture(ticket, result);
                if dispatch(
                    produced,
                    &mut sequencer,
                    &mut capture,
                    &mut pending,
                    &mut retries_left,
                    &config,
                    &events,
                ) {
                    return;
                }
            }
        }
    }
}

async fn recv_pending(
    pending: &mut Option<(CaptureTicket, oneshot::Receiver<CaptureResult>)>,
) -> Result<CaptureResult, oneshot::error::RecvError> {
    match pending.as_mut() {
        Some((_, rx)) => rx.await,
        // Guarded out by `if pending.is_some()` in the select.
        None => future::pending().await,
    }
}

/// Act on the events one sequencer step produced, then forward them to the
/// owner. Returns true when the sequence completed and the task should exit.
fn dispatch<C: PhotoCapture>(
    produced: Vec<Event>,
    sequencer: &mut Sequencer,
    capture: &mut C,
    pending: &mut Option<(CaptureTicket, oneshot::Receiver<CaptureResult>)>,
    retries_left: &mut u32,
    config: &SessionConfig,
    events: &mpsc::UnboundedSender<Event>,
) -> bool {
    let mut queue: VecDeque<Event> = produced.into();
    let mut complete = false;

    while let Some(event) = queue.pop_front() {
        match &event {
            Event::ChallengeStarted { challenge } => {
                tracing::info!(challenge = %challenge, "challenge started");
                *retries_left = config.capture_retries;
            }
            Event::ChallengePassed { challenge } => {
                tracing::info!(challenge = %challenge, "challenge passed");
            }
            Event::CaptureRequested { challenge, ticket } => {
                tracing::debug!(challenge = %challenge, ticket, "requesting photo capture");
                let (tx, rx) = oneshot::channel();
                capture.capture(*challenge, tx);
                *pending = Some((*ticket, rx));
            }
            Event::CaptureFailed { challenge, error } => {
                tracing::warn!(
                    challenge = %challenge,
                    error = %error,
                    retries_left = *retries_left,
                    "photo capture failed"
                );
                if *retries_left > 0 {
                    *retries_left -= 1;
                    if let Some(retry) = sequencer.retry_capture() {
                        queue.push_back(retry);
                    }
                }
            }
            Event::SequenceFailed { reason } => {
                tracing::debug!(reason = ?reason, "sequence reset");
                *retries_left = config.capture_retries;
                // The reset retired any outstanding ticket; drop the
                // receiver so a late completion is discarded here too.
                *pending = None;
            }
            Event::SequenceComplete { photos } => {
                tracing::info!(photos = photos.len(), "sequence complete");
                complete = true;
            }
        }
        let _ = events.send(event);
    }

    complete
}
