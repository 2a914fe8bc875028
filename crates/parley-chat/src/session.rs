//! Per-request decoding state.

use uuid::Uuid;

use parley_core::{Cell, DisplayMode, MessageId};

/// Bookkeeping for one in-flight query.
///
/// A fresh value is created for every submitted query and threaded through
/// the reducer by value; nothing in it is shared with other sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Session identity and message-id namespace.
    pub id: Uuid,
    /// Column names of the result set; a later fragment replaces them.
    pub columns: Vec<String>,
    /// Result rows in arrival order.
    pub rows: Vec<Vec<Cell>>,
    /// First declared display mode, if any.
    pub display_mode: Option<DisplayMode>,
    /// The status message currently shown, removed when superseded.
    pub live_status: Option<MessageId>,
    /// The summary message grown in place by later fragments.
    pub summary_message: Option<MessageId>,
    next_seq: u32,
}

impl SessionState {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Allocate the next message id in this session's namespace.
    pub fn allocate_id(&mut self) -> MessageId {
        let id = MessageId {
            session: self.id,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        id
    }

    /// Whether enough data arrived to commit a table.
    pub fn has_table_data(&self) -> bool {
        !self.columns.is_empty() && !self.rows.is_empty()
    }

    /// Whether the end-of-stream commit should emit a table.
    ///
    /// A `summary` display mode overrides whatever data arrived.
    pub fn wants_table(&self) -> bool {
        self.display_mode != Some(DisplayMode::Summary) && self.has_table_data()
    }
}
