//! Classification of record payloads into [`StreamEvent`]s.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use parley_core::{Cell, DisplayMode};

use crate::error::InterpretError;
use crate::event::StreamEvent;
use crate::frame::Frame;

/// Fallback text when the backend reports an error without a message.
const UNSPECIFIED_ERROR: &str = "The server reported an error.";

/// Wire payload of one record. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct Payload {
    display_mode: Option<String>,
    phase: Option<String>,
    error: Option<Value>,
    columns: Option<Vec<String>>,
    rows: Option<Vec<Vec<Cell>>>,
    summary: Option<String>,
}

/// Parse and classify one record.
///
/// A record may carry several recognized fields; the returned events follow
/// the fixed order display mode, status, columns, rows, summary, error. An
/// empty list means the record was a no-op. Any parse failure is returned as
/// an error and must end the session.
pub fn interpret(frame: &Frame) -> Result<Vec<StreamEvent>, InterpretError> {
    let text = match frame {
        Frame::Record(text) => text,
        Frame::Malformed(reason) => return Err(InterpretError::InvalidEncoding(reason.clone())),
    };

    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(InterpretError::NotAnObject);
    }
    let payload: Payload = serde_json::from_value(value)?;

    let mut events = Vec::new();

    if let Some(raw) = payload.display_mode.as_deref() {
        match raw.parse::<DisplayMode>() {
            Ok(mode) => events.push(StreamEvent::DisplayMode(mode)),
            Err(e) => warn!(display_mode = raw, "Ignoring display mode: {}", e),
        }
    }
    if let Some(phase) = payload.phase {
        events.push(StreamEvent::Status(phase));
    }
    if let Some(columns) = payload.columns {
        events.push(StreamEvent::Columns(columns));
    }
    if let Some(rows) = payload.rows {
        events.push(StreamEvent::Rows(rows));
    }
    if let Some(summary) = payload.summary {
        events.push(StreamEvent::Summary(summary));
    }
    if let Some(error) = payload.error.as_ref().and_then(error_message) {
        events.push(StreamEvent::Error(error));
    }

    if events.is_empty() {
        debug!("Record carries no recognized fields");
    }
    Ok(events)
}

/// Extract a displayable message from the `error` field.
///
/// Accepts a plain string or an object with a `message` member. `null` means
/// no error.
fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        Value::Object(map) => Some(
            map.get("message")
                .and_then(Value::as_str)
                .unwrap_or(UNSPECIFIED_ERROR)
                .to_string(),
        ),
        _ => Some(UNSPECIFIED_ERROR.to_string()),
    }
}
