//! Plain-text rendering of transcript changes.

use std::collections::HashMap;

use parley_core::{Message, MessageId, MessageKind, Transcript};

/// Format one message for the terminal.
pub fn format_message(message: &Message) -> String {
    let text = message.content.as_text().unwrap_or_default();
    match message.kind {
        MessageKind::UserQuery => format!("> {text}"),
        MessageKind::Status => format!("… {text}"),
        MessageKind::Summary => text.to_string(),
        MessageKind::Error => format!("error: {text}"),
        MessageKind::Table => message
            .content
            .grid()
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Tracks what has already been printed so only changes are emitted.
///
/// A summary that grows in place prints only the newly appended fragment.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: HashMap<MessageId, usize>,
    echo_queries: bool,
}

impl TranscriptPrinter {
    /// `echo_queries` controls whether the user's own messages are printed.
    pub fn new(echo_queries: bool) -> Self {
        Self {
            printed: HashMap::new(),
            echo_queries,
        }
    }

    /// Text blocks for every message that is new or has grown since the
    /// last call.
    pub fn changes(&mut self, transcript: &Transcript) -> Vec<String> {
        let mut out = Vec::new();
        for message in transcript {
            if message.kind == MessageKind::UserQuery && !self.echo_queries {
                self.printed.entry(message.id).or_insert(0);
                continue;
            }
            let rendered = format_message(message);
            match self.printed.get(&message.id).copied() {
                None => out.push(rendered.clone()),
                Some(len) if rendered.len() > len => {
                    let appended = rendered.get(len..).unwrap_or_default();
                    let appended = appended.trim_start_matches('\n');
                    if !appended.is_empty() {
                        out.push(appended.to_string());
                    }
                }
                Some(_) => continue,
            }
            self.printed.insert(message.id, rendered.len());
        }
        out
    }

    /// Print every change to stdout.
    pub fn print(&mut self, transcript: &Transcript) {
        for block in self.changes(transcript) {
            println!("{block}");
        }
    }

    /// Forget what was printed, after the transcript was cleared.
    pub fn reset(&mut self) {
        self.printed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Cell;
    use uuid::Uuid;

    fn id(seq: u32) -> MessageId {
        MessageId {
            session: Uuid::nil(),
            seq,
        }
    }

    #[test]
    fn test_format_kinds() {
        assert_eq!(format_message(&Message::status(id(0), "querying")), "… querying");
        assert_eq!(format_message(&Message::error(id(1), "boom")), "error: boom");
        let table = Message::table(
            id(2),
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Cell::from(1), Cell::Null]],
        );
        assert_eq!(format_message(&table), "a\tb\n1\t");
    }

    #[test]
    fn test_changes_only_once() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user_query(id(0), "q"));
        transcript.push(Message::status(id(1), "parsing"));

        let mut printer = TranscriptPrinter::new(false);
        assert_eq!(printer.changes(&transcript), vec!["… parsing"]);
        assert!(printer.changes(&transcript).is_empty());
    }

    #[test]
    fn test_growing_summary_prints_fragment() {
        let mut transcript = Transcript::new();
        transcript.push(Message::summary(id(0), "Part one."));

        let mut printer = TranscriptPrinter::new(true);
        assert_eq!(printer.changes(&transcript), vec!["Part one."]);

        transcript = Transcript::new();
        transcript.push(Message::summary(id(0), "Part one.\n\nPart two."));
        assert_eq!(printer.changes(&transcript), vec!["Part two."]);
    }

    #[test]
    fn test_echo_queries() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user_query(id(0), "top customers"));
        let mut printer = TranscriptPrinter::new(true);
        assert_eq!(printer.changes(&transcript), vec!["> top customers"]);

        printer.reset();
        assert_eq!(printer.changes(&transcript).len(), 1);
    }
}
