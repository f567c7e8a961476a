use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use shared::{
    domain::{DocumentId, DocumentSummary},
    error::IngestionError,
};
use tracing::{debug, warn};

const PDF_HEADER: &[u8] = b"%PDF-";
/// Readers accept a header preceded by junk bytes as long as it starts
/// within the first kilobyte.
const HEADER_SEARCH_WINDOW: usize = 1024;

#[derive(Debug, Clone)]
pub struct IncomingDocument {
    pub name: String,
    pub payload: Vec<u8>,
}

impl IncomingDocument {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    id: DocumentId,
    name: String,
    payload: Arc<[u8]>,
    ingested_at: DateTime<Utc>,
}

impl SourceDocument {
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Arc<[u8]> {
        &self.payload
    }

    pub fn size_bytes(&self) -> u64 {
        self.payload.len() as u64
    }

    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: Vec<DocumentId>,
    pub rejected: Vec<IngestionError>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub from: usize,
    pub to: usize,
}

impl MoveOutcome {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub document_id: DocumentId,
    pub name: String,
    pub payload: Arc<[u8]>,
}

/// Frozen copy of the collection order. Payloads are shared, not copied; the
/// snapshot is unaffected by any later mutation of the collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionSnapshot {
    entries: Vec<SnapshotEntry>,
}

impl CollectionSnapshot {
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.entries.iter().map(|entry| entry.document_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn validate_payload(name: &str, payload: &[u8]) -> Result<(), IngestionError> {
    if payload.is_empty() {
        return Err(IngestionError::EmptyPayload {
            name: name.to_string(),
        });
    }

    let window = &payload[..payload.len().min(HEADER_SEARCH_WINDOW)];
    if !window
        .windows(PDF_HEADER.len())
        .any(|candidate| candidate == PDF_HEADER)
    {
        return Err(IngestionError::UnsupportedFormat {
            name: name.to_string(),
        });
    }

    Ok(())
}

/// Ordered set of source documents. Documents live in an arena keyed by
/// identity; `order` alone decides display and merge order.
#[derive(Debug, Default)]
pub struct DocumentCollection {
    documents: HashMap<DocumentId, SourceDocument>,
    order: Vec<DocumentId>,
    last_issued_id: u64,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every valid document in input order. Invalid items are
    /// reported individually and leave the collection untouched.
    pub fn append<I>(&mut self, documents: I) -> IngestReport
    where
        I: IntoIterator<Item = IncomingDocument>,
    {
        let mut report = IngestReport::default();
        for incoming in documents {
            if let Err(err) = validate_payload(&incoming.name, &incoming.payload) {
                warn!(name = %incoming.name, error = %err, "collection: rejected document");
                report.rejected.push(err);
                continue;
            }

            let id = self.issue_id();
            let document = SourceDocument {
                id,
                name: incoming.name,
                payload: Arc::from(incoming.payload),
                ingested_at: Utc::now(),
            };
            debug!(
                document_id = %id,
                name = %document.name,
                size_bytes = document.size_bytes(),
                position = self.order.len(),
                "collection: appended document"
            );
            self.documents.insert(id, document);
            self.order.push(id);
            report.accepted.push(id);
        }
        report
    }

    pub fn remove_at(&mut self, id: DocumentId) -> Option<SourceDocument> {
        let position = self.position_of(id)?;
        self.order.remove(position);
        let removed = self.documents.remove(&id);
        debug!(document_id = %id, position, "collection: removed document");
        removed
    }

    /// Relocates `id` to `target`, shifting the documents in between by one.
    /// Out-of-range targets clamp to the last position.
    pub fn move_to(&mut self, id: DocumentId, target: usize) -> Option<MoveOutcome> {
        let from = self.position_of(id)?;
        let to = target.min(self.order.len() - 1);
        if from != to {
            let moved = self.order.remove(from);
            self.order.insert(to, moved);
            debug!(document_id = %id, from, to, "collection: moved document");
        }
        Some(MoveOutcome { from, to })
    }

    pub fn ordered_snapshot(&self) -> Vec<DocumentId> {
        self.order.clone()
    }

    pub fn merge_snapshot(&self) -> CollectionSnapshot {
        let entries = self
            .iter()
            .map(|document| SnapshotEntry {
                document_id: document.id,
                name: document.name.clone(),
                payload: Arc::clone(&document.payload),
            })
            .collect();
        CollectionSnapshot { entries }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.documents.contains_key(&id)
    }

    pub fn position_of(&self, id: DocumentId) -> Option<usize> {
        self.order.iter().position(|candidate| *candidate == id)
    }

    pub fn get(&self, id: DocumentId) -> Option<&SourceDocument> {
        self.documents.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDocument> + '_ {
        self.order.iter().filter_map(|id| self.documents.get(id))
    }

    pub fn summaries(&self) -> Vec<DocumentSummary> {
        self.iter()
            .enumerate()
            .map(|(position, document)| DocumentSummary {
                document_id: document.id,
                name: document.name.clone(),
                size_bytes: document.size_bytes(),
                position,
                ingested_at: document.ingested_at,
            })
            .collect()
    }

    /// Drops every document. Identities issued so far stay retired.
    pub fn clear(&mut self) {
        self.order.clear();
        self.documents.clear();
    }

    fn issue_id(&mut self) -> DocumentId {
        self.last_issued_id += 1;
        DocumentId(self.last_issued_id)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
