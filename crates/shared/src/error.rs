use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Ingestion,
    Parse,
    Merge,
    Busy,
    Delivery,
    Preview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            document_id: None,
        }
    }

    pub fn for_document(mut self, document_id: DocumentId) -> Self {
        self.document_id = Some(document_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    #[error("'{name}' is empty")]
    EmptyPayload { name: String },
    #[error("'{name}' is not a PDF document")]
    UnsupportedFormat { name: String },
    #[error("failed to read '{name}': {reason}")]
    Unreadable { name: String, reason: String },
}

impl IngestionError {
    pub fn name(&self) -> &str {
        match self {
            Self::EmptyPayload { name }
            | Self::UnsupportedFormat { name }
            | Self::Unreadable { name, .. } => name,
        }
    }
}

impl From<&IngestionError> for ErrorPayload {
    fn from(value: &IngestionError) -> Self {
        ErrorPayload::new(ErrorCode::Ingestion, value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{document_id} ('{name}') could not be parsed: {reason}")]
pub struct ParseError {
    pub document_id: DocumentId,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeFailure {
    #[error("nothing to merge: the collection is empty")]
    EmptyCollection,
    #[error("a merge is already in progress")]
    AlreadyRunning,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to copy pages of {document_id} ('{name}'): {reason}")]
    CopyPages {
        document_id: DocumentId,
        name: String,
        reason: String,
    },
    #[error("failed to build merged output: {reason}")]
    Output { reason: String },
}

impl MergeFailure {
    pub fn offending_document(&self) -> Option<DocumentId> {
        match self {
            Self::Parse(err) => Some(err.document_id),
            Self::CopyPages { document_id, .. } => Some(*document_id),
            Self::EmptyCollection | Self::AlreadyRunning | Self::Output { .. } => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse(_) => ErrorCode::Parse,
            Self::AlreadyRunning => ErrorCode::Busy,
            Self::EmptyCollection | Self::CopyPages { .. } | Self::Output { .. } => {
                ErrorCode::Merge
            }
        }
    }
}

impl From<&MergeFailure> for ErrorPayload {
    fn from(value: &MergeFailure) -> Self {
        let payload = ErrorPayload::new(value.code(), value.to_string());
        match value.offending_document() {
            Some(document_id) => payload.for_document(document_id),
            None => payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("failed to publish output resource: {reason}")]
    Publish { reason: String },
    #[error("failed to save output: {reason}")]
    Save { reason: String },
}

impl From<&DeliveryError> for ErrorPayload {
    fn from(value: &DeliveryError) -> Self {
        ErrorPayload::new(ErrorCode::Delivery, value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("preview of {document_id} failed: {reason}")]
pub struct PreviewError {
    pub document_id: DocumentId,
    pub reason: String,
}
