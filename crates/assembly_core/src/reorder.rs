//! Live drag-to-reorder. The dragged document moves as soon as the pointer
//! enters another document, so the final order is the composition of every
//! hover visited, and drop only ends the session.

use collection::DocumentCollection;
use shared::domain::DocumentId;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    Start(DocumentId),
    HoverEnter(DocumentId),
    Drop,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    pub active: DocumentId,
    pub hover: Option<DocumentId>,
    /// Position of `active` when the drag started.
    pub origin: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    Ignored,
    Started {
        document_id: DocumentId,
    },
    Moved {
        document_id: DocumentId,
        from: usize,
        to: usize,
    },
    Unchanged,
    Finished {
        document_id: DocumentId,
        moved: bool,
    },
}

#[derive(Debug, Default)]
pub struct ReorderController {
    state: DragState,
}

impl ReorderController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn active(&self) -> Option<DocumentId> {
        match self.state {
            DragState::Idle => None,
            DragState::Dragging(session) => Some(session.active),
        }
    }

    pub fn handle(
        &mut self,
        collection: &mut DocumentCollection,
        event: DragEvent,
    ) -> ReorderOutcome {
        let (next, outcome) = transition(self.state, collection, event);
        if next != self.state {
            debug!(?event, from = ?self.state, to = ?next, "reorder: transition");
        }
        self.state = next;
        outcome
    }
}

fn transition(
    state: DragState,
    collection: &mut DocumentCollection,
    event: DragEvent,
) -> (DragState, ReorderOutcome) {
    match (state, event) {
        (_, DragEvent::Start(document_id)) => match collection.position_of(document_id) {
            Some(origin) => (
                DragState::Dragging(DragSession {
                    active: document_id,
                    hover: None,
                    origin,
                }),
                ReorderOutcome::Started { document_id },
            ),
            None => (state, ReorderOutcome::Ignored),
        },
        (DragState::Idle, _) => (DragState::Idle, ReorderOutcome::Ignored),
        (DragState::Dragging(session), _) if !collection.contains(session.active) => (
            DragState::Idle,
            ReorderOutcome::Finished {
                document_id: session.active,
                moved: false,
            },
        ),
        (DragState::Dragging(mut session), DragEvent::HoverEnter(over)) => {
            if over == session.active {
                session.hover = Some(over);
                return (DragState::Dragging(session), ReorderOutcome::Unchanged);
            }
            let Some(target) = collection.position_of(over) else {
                return (DragState::Dragging(session), ReorderOutcome::Ignored);
            };
            session.hover = Some(over);
            let outcome = match collection.move_to(session.active, target) {
                Some(moved) if moved.changed() => ReorderOutcome::Moved {
                    document_id: session.active,
                    from: moved.from,
                    to: moved.to,
                },
                _ => ReorderOutcome::Unchanged,
            };
            (DragState::Dragging(session), outcome)
        }
        (DragState::Dragging(session), DragEvent::Drop | DragEvent::End) => {
            let moved = collection.position_of(session.active) != Some(session.origin);
            (
                DragState::Idle,
                ReorderOutcome::Finished {
                    document_id: session.active,
                    moved,
                },
            )
        }
    }
}

#[cfg(test)]
#[path = "tests/reorder_tests.rs"]
mod tests;
