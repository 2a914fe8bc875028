//! Session controller: owns the live query and the transcript.
//!
//! At most one session is live. `submit` retires the previous session under
//! the controller lock before any new work starts, and every reduction
//! re-checks the session generation under the same lock, so chunks still in
//! flight for a superseded session are dropped. The lock is never held across
//! an await; decoding, interpretation and reduction of a chunk run to
//! completion before the next chunk is awaited.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_core::config::{ChatConfig, StreamConfig};
use parley_core::{Message, MessageId, Transcript, TranscriptSnapshot};

use crate::error::{ChatError, TransportError};
use crate::event::StreamEvent;
use crate::frame::{Frame, FrameDecoder};
use crate::interpreter::interpret;
use crate::reducer::{reduce, Flow};
use crate::session::SessionState;
use crate::transport::QueryTransport;

/// Shown when a record cannot be parsed.
pub const PARSE_ERROR_MESSAGE: &str = "Failed to parse the server response.";
/// Shown when the connection fails for reasons other than a user stop.
pub const TRANSPORT_ERROR_MESSAGE: &str = "Connection to the server failed.";
/// Shown when the server goes quiet for longer than the idle timeout.
pub const TIMEOUT_ERROR_MESSAGE: &str = "The server stopped responding.";

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The stream ended normally.
    Completed,
    /// The backend sent an `error` record.
    ProtocolError,
    /// A record could not be parsed.
    MalformedRecord,
    /// The connection failed.
    TransportFailed,
    /// No data arrived within the idle timeout.
    TimedOut,
    /// The user paused the session.
    Cancelled,
    /// A newer query replaced this session.
    Superseded,
}

impl SessionOutcome {
    /// Whether the session ended with an error message in the transcript.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            SessionOutcome::ProtocolError
                | SessionOutcome::MalformedRecord
                | SessionOutcome::TransportFailed
                | SessionOutcome::TimedOut
        )
    }
}

struct ActiveSession {
    generation: u64,
    state: SessionState,
    cancel: CancellationToken,
}

#[derive(Default)]
struct ControllerState {
    transcript: Transcript,
    active: Option<ActiveSession>,
    generation: u64,
    revision: u64,
    /// Status message a paused session left on screen, removed by the next submit.
    paused_status: Option<MessageId>,
    /// Why a session was retired from outside its read loop, keyed by generation.
    retired: HashMap<u64, SessionOutcome>,
}

impl ControllerState {
    fn is_live(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    /// Fold one event into the transcript of the live session.
    fn apply(&mut self, event: StreamEvent) -> Flow {
        let Some(active) = self.active.as_mut() else {
            return Flow::Close;
        };
        let step = reduce(
            std::mem::take(&mut self.transcript),
            std::mem::take(&mut active.state),
            event,
        );
        self.transcript = step.transcript;
        active.state = step.session;
        step.flow
    }

    /// Drop the live session if it is `generation`, firing its token once.
    fn retire(&mut self, generation: u64) -> bool {
        if !self.is_live(generation) {
            return false;
        }
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
        true
    }

    /// Retire the live session on behalf of `pause` or `submit`.
    fn retire_externally(&mut self, reason: SessionOutcome) -> Option<ActiveSession> {
        let active = self.active.take()?;
        active.cancel.cancel();
        self.retired.insert(active.generation, reason);
        Some(active)
    }
}

struct Inner {
    transport: Arc<dyn QueryTransport>,
    stream: StreamConfig,
    chat: ChatConfig,
    state: Mutex<ControllerState>,
    updates: watch::Sender<TranscriptSnapshot>,
}

/// Drives queries against a [`QueryTransport`] and publishes the transcript.
///
/// Cloning is cheap; clones share the same transcript and live session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(transport: Arc<dyn QueryTransport>, stream: StreamConfig, chat: ChatConfig) -> Self {
        let (updates, _) = watch::channel(TranscriptSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                transport,
                stream,
                chat,
                state: Mutex::new(ControllerState::default()),
                updates,
            }),
        }
    }

    /// Start a new query, superseding any session still in flight.
    ///
    /// A status message left by the previous session, live or paused, is
    /// removed first.
    /// The user's message is in the transcript and `processing` is set before
    /// this returns. Must be called from within a tokio runtime.
    pub fn submit(&self, query: &str) -> Result<JoinHandle<SessionOutcome>, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        let max = self.inner.chat.max_query_length;
        if query.chars().count() > max {
            return Err(ChatError::QueryTooLong(max));
        }

        let (generation, cancel) = {
            let mut state = self.inner.lock();
            let mut stale_status = state.paused_status.take();
            if let Some(previous) = state.retire_externally(SessionOutcome::Superseded) {
                info!(session_id = %previous.state.id, "Session superseded by new query");
                stale_status = stale_status.or(previous.state.live_status);
            }
            if let Some(id) = stale_status {
                state.transcript.remove(id);
            }
            state.generation += 1;
            let generation = state.generation;

            let mut session = SessionState::new(Uuid::new_v4());
            let message_id = session.allocate_id();
            state.transcript.push(Message::user_query(message_id, query));

            let cancel = CancellationToken::new();
            info!(session_id = %session.id, generation, "Session started");
            state.active = Some(ActiveSession {
                generation,
                state: session,
                cancel: cancel.clone(),
            });
            self.inner.publish(&mut state);
            (generation, cancel)
        };

        let inner = Arc::clone(&self.inner);
        let query = query.to_string();
        Ok(tokio::spawn(async move {
            inner.run(generation, cancel, query).await
        }))
    }

    /// Stop the session in flight, if any.
    ///
    /// A user stop is not an error: nothing is appended and the transcript is
    /// left as it was. Returns whether a session was stopped.
    pub fn pause(&self) -> bool {
        let mut state = self.inner.lock();
        let Some(active) = state.retire_externally(SessionOutcome::Cancelled) else {
            return false;
        };
        state.paused_status = active.state.live_status;
        info!(session_id = %active.state.id, "Session paused");
        self.inner.publish(&mut state);
        true
    }

    pub fn is_processing(&self) -> bool {
        self.inner.lock().active.is_some()
    }

    /// Current transcript and processing flag.
    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.inner.updates.borrow().clone()
    }

    /// Receive a snapshot after every transcript change.
    pub fn subscribe(&self) -> watch::Receiver<TranscriptSnapshot> {
        self.inner.updates.subscribe()
    }

    /// Forget the conversation. Refused while a session is in flight.
    pub fn clear(&self) -> bool {
        let mut state = self.inner.lock();
        if state.active.is_some() {
            return false;
        }
        state.transcript.clear();
        state.paused_status = None;
        self.inner.publish(&mut state);
        true
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut ControllerState) {
        state.revision += 1;
        self.updates.send_replace(TranscriptSnapshot {
            transcript: state.transcript.clone(),
            processing: state.active.is_some(),
            revision: state.revision,
            updated_at: Utc::now(),
        });
    }

    async fn run(&self, generation: u64, cancel: CancellationToken, query: String) -> SessionOutcome {
        let outcome = self.drive(generation, &cancel, &query).await;

        let mut state = self.lock();
        if state.retire(generation) {
            self.publish(&mut state);
        }
        let reason = state.retired.remove(&generation);
        let outcome = match outcome {
            SessionOutcome::Cancelled => reason.unwrap_or(SessionOutcome::Cancelled),
            other => other,
        };
        debug!(generation, outcome = ?outcome, "Session finished");
        outcome
    }

    async fn drive(&self, generation: u64, cancel: &CancellationToken, query: &str) -> SessionOutcome {
        let idle_timeout = self.stream.idle_timeout();

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionOutcome::Cancelled,
            opened = tokio::time::timeout(idle_timeout, self.transport.open(query, cancel.clone())) => opened,
        };
        let mut body = match opened {
            Ok(Ok(body)) => body,
            Ok(Err(TransportError::Cancelled)) => return SessionOutcome::Cancelled,
            Ok(Err(e)) => {
                warn!(generation, error = %e, "Failed to open response stream");
                return self.terminate(generation, TRANSPORT_ERROR_MESSAGE, SessionOutcome::TransportFailed);
            }
            Err(_) => {
                warn!(generation, "Timed out waiting for response");
                return self.terminate(generation, TIMEOUT_ERROR_MESSAGE, SessionOutcome::TimedOut);
            }
        };

        let mut decoder = FrameDecoder::new(
            self.stream.record_marker.clone(),
            self.stream.max_buffered_bytes,
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionOutcome::Cancelled,
                next = tokio::time::timeout(idle_timeout, body.next()) => next,
            };

            match next {
                Ok(Some(Ok(chunk))) => match decoder.push(&chunk) {
                    Ok(frames) => {
                        if let Some(outcome) = self.process(generation, frames, false) {
                            return outcome;
                        }
                    }
                    Err(e) => {
                        warn!(generation, error = %e, "Discarding oversized record");
                        return self.terminate(generation, PARSE_ERROR_MESSAGE, SessionOutcome::MalformedRecord);
                    }
                },
                Ok(Some(Err(e))) => {
                    warn!(generation, error = %e, "Response stream failed");
                    return self.terminate(generation, TRANSPORT_ERROR_MESSAGE, SessionOutcome::TransportFailed);
                }
                Ok(None) => {
                    let frames: Vec<Frame> = decoder.finish().into_iter().collect();
                    return self
                        .process(generation, frames, true)
                        .unwrap_or(SessionOutcome::Completed);
                }
                Err(_) => {
                    warn!(generation, timeout_secs = idle_timeout.as_secs(), "Response stream went idle");
                    return self.terminate(generation, TIMEOUT_ERROR_MESSAGE, SessionOutcome::TimedOut);
                }
            }
        }
    }

    /// Reduce the frames of one chunk. Returns the outcome once the session
    /// is over, or `None` to keep reading.
    fn process(&self, generation: u64, frames: Vec<Frame>, end_of_stream: bool) -> Option<SessionOutcome> {
        let mut state = self.lock();
        if !state.is_live(generation) {
            debug!(generation, "Dropping frames of a retired session");
            return Some(SessionOutcome::Cancelled);
        }

        for frame in &frames {
            let events = match interpret(frame) {
                Ok(events) => events,
                Err(e) => {
                    warn!(generation, error = %e, "Malformed record");
                    state.apply(StreamEvent::Error(PARSE_ERROR_MESSAGE.to_string()));
                    state.retire(generation);
                    self.publish(&mut state);
                    return Some(SessionOutcome::MalformedRecord);
                }
            };
            for event in events {
                debug!(generation, event = event.name(), "Applying event");
                let flow = state.apply(event);
                if flow == Flow::Close {
                    state.retire(generation);
                    self.publish(&mut state);
                    return Some(SessionOutcome::ProtocolError);
                }
                self.publish(&mut state);
            }
        }

        if end_of_stream {
            state.apply(StreamEvent::EndOfStream);
            state.retire(generation);
            self.publish(&mut state);
            info!(generation, "Session completed");
            return Some(SessionOutcome::Completed);
        }
        None
    }

    /// Append an error message and close the live session.
    fn terminate(&self, generation: u64, message: &str, outcome: SessionOutcome) -> SessionOutcome {
        let mut state = self.lock();
        if !state.is_live(generation) {
            return SessionOutcome::Cancelled;
        }
        state.apply(StreamEvent::Error(message.to_string()));
        state.retire(generation);
        self.publish(&mut state);
        outcome
    }
}
