//! Event types for document change notifications.
//!
//! Return values (modified-tile sets) are the primary signal; these events
//! are an optional subscription surface for callers that want push-style
//! notifications. Delivery is synchronous, in subscription order, before the
//! mutating call returns.

use chrono::{DateTime, Utc};

use crate::tile_id::TileId;

/// Events emitted by the history engine around document mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    /// A new command was executed and appended to history.
    CommandApplied(CommandAppliedEvent),

    /// The history position moved without a new command (undo, redo, jump,
    /// reset, rebase).
    HistoryMoved(HistoryMovedEvent),

    /// Entries were deleted from the history list.
    HistoryTruncated(HistoryTruncatedEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandAppliedEvent {
    /// Document revision after the command.
    pub revision: u64,
    /// The command's description.
    pub description: String,
    /// Tiles whose stored values changed, sorted.
    pub tiles: Vec<TileId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryMovedEvent {
    /// New history position (None = working base).
    pub index: Option<usize>,
    /// Tiles whose content differs from before the move, sorted.
    pub tiles: Vec<TileId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTruncatedEvent {
    /// Entry count after truncation.
    pub len: usize,
}

/// Callback type for receiving document events.
pub type EventCallback = Box<dyn FnMut(&DocumentEvent) + Send>;

/// Simple event collector for testing.
#[derive(Default)]
pub struct EventCollector {
    events: Vec<DocumentEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: DocumentEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[DocumentEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only CommandApplied events.
    pub fn commands_applied(&self) -> Vec<&CommandAppliedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DocumentEvent::CommandApplied(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Filter to only HistoryMoved events.
    pub fn history_moved(&self) -> Vec<&HistoryMovedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DocumentEvent::HistoryMoved(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Filter to only HistoryTruncated events.
    pub fn history_truncated(&self) -> Vec<&HistoryTruncatedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DocumentEvent::HistoryTruncated(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_collector_filtering() {
        let mut collector = EventCollector::new();

        collector.push(DocumentEvent::CommandApplied(CommandAppliedEvent {
            revision: 1,
            description: "raise".into(),
            tiles: vec![],
            timestamp: Utc::now(),
        }));
        collector.push(DocumentEvent::HistoryMoved(HistoryMovedEvent {
            index: None,
            tiles: vec![],
        }));
        collector.push(DocumentEvent::HistoryTruncated(HistoryTruncatedEvent { len: 0 }));

        assert_eq!(collector.len(), 3);
        assert_eq!(collector.commands_applied().len(), 1);
        assert_eq!(collector.history_moved().len(), 1);
        assert_eq!(collector.history_truncated().len(), 1);
    }
}
