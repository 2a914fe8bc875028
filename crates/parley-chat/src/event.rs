//! Classified stream events consumed by the transcript reducer.

use parley_core::{Cell, DisplayMode};

/// One interpreted unit of the response stream.
///
/// A single wire record may yield several events; they are applied in the
/// order the interpreter emits them.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Backend declared what to present for this query.
    DisplayMode(DisplayMode),
    /// Progress label, supersedes the previous one.
    Status(String),
    /// Column names of the result set.
    Columns(Vec<String>),
    /// A batch of result rows.
    Rows(Vec<Vec<Cell>>),
    /// A fragment of the narrative answer.
    Summary(String),
    /// Terminal failure; the session closes after this event.
    Error(String),
    /// The response body ended without an error.
    EndOfStream,
}

impl StreamEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::DisplayMode(_) => "display_mode",
            StreamEvent::Status(_) => "status",
            StreamEvent::Columns(_) => "columns",
            StreamEvent::Rows(_) => "rows",
            StreamEvent::Summary(_) => "summary",
            StreamEvent::Error(_) => "error",
            StreamEvent::EndOfStream => "end_of_stream",
        }
    }
}
