//! Pure transcript state transitions.
//!
//! `reduce` folds one [`StreamEvent`] into the transcript and session state:
//! - status: replace the single live status message
//! - columns/rows: accumulate in the session, never shown mid-stream
//! - summary: create one message per session, then grow it in place
//! - error: clear status, append one error message, close
//! - end of stream: clear status, commit the table if the mode allows it

use tracing::debug;

use parley_core::{Content, Message, Transcript};

use crate::event::StreamEvent;
use crate::session::SessionState;

/// Separator between consecutive summary fragments.
pub const SUMMARY_SEPARATOR: &str = "\n\n";

/// Whether the session should keep processing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Result of one reduction step.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub transcript: Transcript,
    pub session: SessionState,
    pub flow: Flow,
}

/// Apply one event to the transcript and session.
pub fn reduce(mut transcript: Transcript, mut session: SessionState, event: StreamEvent) -> Reduction {
    let mut flow = Flow::Continue;

    match event {
        StreamEvent::DisplayMode(mode) => {
            if session.display_mode.is_none() {
                session.display_mode = Some(mode);
            }
        }
        StreamEvent::Status(phase) => {
            clear_status(&mut transcript, &mut session);
            let id = session.allocate_id();
            transcript.push(Message::status(id, phase));
            session.live_status = Some(id);
        }
        StreamEvent::Columns(columns) => {
            if !session.columns.is_empty() {
                debug!(session_id = %session.id, "Replacing previously received columns");
            }
            session.columns = columns;
        }
        StreamEvent::Rows(rows) => {
            session.rows.extend(rows);
        }
        StreamEvent::Summary(fragment) => {
            if session.display_mode.is_some_and(|mode| mode.shows_summary()) {
                append_summary(&mut transcript, &mut session, fragment);
            }
        }
        StreamEvent::Error(text) => {
            clear_status(&mut transcript, &mut session);
            let id = session.allocate_id();
            transcript.push(Message::error(id, text));
            flow = Flow::Close;
        }
        StreamEvent::EndOfStream => {
            clear_status(&mut transcript, &mut session);
            if session.wants_table() {
                let id = session.allocate_id();
                let columns = std::mem::take(&mut session.columns);
                let rows = std::mem::take(&mut session.rows);
                transcript.push(Message::table(id, columns, rows));
            }
            flow = Flow::Close;
        }
    }

    Reduction {
        transcript,
        session,
        flow,
    }
}

fn clear_status(transcript: &mut Transcript, session: &mut SessionState) {
    if let Some(id) = session.live_status.take() {
        transcript.remove(id);
    }
}

fn append_summary(transcript: &mut Transcript, session: &mut SessionState, fragment: String) {
    if let Some(id) = session.summary_message {
        if let Some(Content::Text { text }) = transcript.get_mut(id).map(|m| &mut m.content) {
            text.push_str(SUMMARY_SEPARATOR);
            text.push_str(&fragment);
            return;
        }
    }

    // Summary presentation supersedes the "thinking" status.
    clear_status(transcript, session);
    let id = session.allocate_id();
    transcript.push(Message::summary(id, fragment));
    session.summary_message = Some(id);
}
