use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Who authored a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// What a transcript message represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// The question typed by the user.
    UserQuery,
    /// Transient "what is happening now" label. At most one is live.
    Status,
    /// Narrative answer, grown in place as fragments arrive.
    Summary,
    /// Result set, committed once the stream has ended.
    Table,
    /// Terminal failure for the session.
    Error,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::UserQuery => write!(f, "user_query"),
            MessageKind::Status => write!(f, "status"),
            MessageKind::Summary => write!(f, "summary"),
            MessageKind::Table => write!(f, "table"),
            MessageKind::Error => write!(f, "error"),
        }
    }
}

/// Backend hint for what to present at the end of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Summary,
    Table,
    Both,
}

impl DisplayMode {
    /// Whether summary fragments should be shown under this mode.
    pub fn shows_summary(self) -> bool {
        matches!(self, DisplayMode::Summary | DisplayMode::Both)
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(DisplayMode::Summary),
            "table" => Ok(DisplayMode::Table),
            "both" => Ok(DisplayMode::Both),
            other => Err(format!("unknown display mode: {other}")),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::Summary => write!(f, "summary"),
            DisplayMode::Table => write!(f, "table"),
            DisplayMode::Both => write!(f, "both"),
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Identifier of a transcript message.
///
/// Allocated by the session that creates the message, so it is stable across
/// in-place updates and unique across sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId {
    pub session: Uuid,
    pub seq: u32,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.session, self.seq)
    }
}

/// One table cell as delivered on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value.into())
    }
}

/// Body of a transcript message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<Cell>>,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    /// Text body, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            Content::Table { .. } => None,
        }
    }

    /// Two-dimensional view of a table: the first row holds the column
    /// headers, the remaining rows hold the data. Text content yields a
    /// single one-cell row.
    pub fn grid(&self) -> Vec<Vec<String>> {
        match self {
            Content::Text { text } => vec![vec![text.clone()]],
            Content::Table { columns, rows } => {
                let mut grid = Vec::with_capacity(rows.len() + 1);
                grid.push(columns.clone());
                grid.extend(
                    rows.iter()
                        .map(|row| row.iter().map(ToString::to_string).collect()),
                );
                grid
            }
        }
    }
}

/// A unit of the visible transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub kind: MessageKind,
    pub content: Content,
}

impl Message {
    pub fn user_query(id: MessageId, query: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::User,
            kind: MessageKind::UserQuery,
            content: Content::text(query),
        }
    }

    pub fn status(id: MessageId, phase: impl Into<String>) -> Self {
        Self::assistant_text(id, MessageKind::Status, phase)
    }

    pub fn summary(id: MessageId, text: impl Into<String>) -> Self {
        Self::assistant_text(id, MessageKind::Summary, text)
    }

    pub fn error(id: MessageId, text: impl Into<String>) -> Self {
        Self::assistant_text(id, MessageKind::Error, text)
    }

    pub fn table(id: MessageId, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            id,
            sender: Sender::Assistant,
            kind: MessageKind::Table,
            content: Content::Table { columns, rows },
        }
    }

    fn assistant_text(id: MessageId, kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::Assistant,
            kind,
            content: Content::text(text),
        }
    }
}

// =============================================================================
// Transcript
// =============================================================================

/// Ordered list of messages shown to the user for the current conversation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove the message with the given id, returning it if present.
    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(index))
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn count_kind(&self, kind: MessageKind) -> usize {
        self.messages.iter().filter(|m| m.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// State published to UI consumers after every transcript change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscriptSnapshot {
    pub transcript: Transcript,
    /// True while a session is in flight; input should be disabled.
    pub processing: bool,
    /// Monotonic change counter.
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl Default for TranscriptSnapshot {
    fn default() -> Self {
        Self {
            transcript: Transcript::default(),
            processing: false,
            revision: 0,
            updated_at: Utc::now(),
        }
    }
}
