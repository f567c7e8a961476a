use serde::{Deserialize, Serialize};

use crate::{
    domain::{DocumentId, DocumentSummary, SaveOutcome},
    error::ErrorPayload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AssemblyCommand {
    Remove {
        document_id: DocumentId,
    },
    MoveTo {
        document_id: DocumentId,
        position: usize,
    },
    DragStart {
        document_id: DocumentId,
    },
    HoverEnter {
        document_id: DocumentId,
    },
    Drop,
    DragEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AssemblyEvent {
    DocumentsAppended {
        documents: Vec<DocumentSummary>,
    },
    IngestionRejected {
        name: String,
        error: ErrorPayload,
    },
    DocumentRemoved {
        document_id: DocumentId,
    },
    OrderChanged {
        order: Vec<DocumentId>,
    },
    DragStarted {
        document_id: DocumentId,
    },
    DragFinished {
        document_id: DocumentId,
        moved: bool,
    },
    MergeStarted {
        document_count: usize,
    },
    MergeProgress {
        document_id: DocumentId,
        page_count: usize,
        completed: usize,
        total: usize,
    },
    MergeCompleted {
        page_count: usize,
        byte_len: usize,
    },
    MergeFailed(ErrorPayload),
    PreviewReady {
        document_id: DocumentId,
        width: u32,
        height: u32,
    },
    PreviewFailed {
        document_id: DocumentId,
        error: ErrorPayload,
    },
    OutputDelivered {
        file_name: String,
        outcome: SaveOutcome,
    },
    DeliveryFailed(ErrorPayload),
}
