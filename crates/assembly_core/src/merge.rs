use collection::{CollectionSnapshot, SnapshotEntry};
use ports::MergeCollaborator;
use shared::{
    domain::{DocumentId, MergeSummary, MergedDocument},
    error::{MergeFailure, ParseError},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeProgress {
    pub document_id: DocumentId,
    pub page_count: usize,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub bytes: Vec<u8>,
    pub summary: MergeSummary,
}

impl MergeOutput {
    pub fn page_count(&self) -> usize {
        self.summary.page_count
    }
}

/// Concatenates the pages of every snapshot entry, strictly one document at
/// a time and in snapshot order. Any per-document failure aborts the whole
/// merge; no partial output is ever returned.
pub struct MergeOrchestrator<'a, M: MergeCollaborator> {
    collaborator: &'a M,
}

impl<'a, M: MergeCollaborator> MergeOrchestrator<'a, M> {
    pub fn new(collaborator: &'a M) -> Self {
        Self { collaborator }
    }

    pub async fn merge(&self, snapshot: &CollectionSnapshot) -> Result<MergeOutput, MergeFailure> {
        self.merge_with_progress(snapshot, |_| {}).await
    }

    pub async fn merge_with_progress<F>(
        &self,
        snapshot: &CollectionSnapshot,
        mut on_progress: F,
    ) -> Result<MergeOutput, MergeFailure>
    where
        F: FnMut(MergeProgress) + Send,
    {
        if snapshot.is_empty() {
            return Err(MergeFailure::EmptyCollection);
        }

        let total = snapshot.len();
        info!(documents = total, "merge: started");
        let mut output = self
            .collaborator
            .create_empty()
            .await
            .map_err(|err| MergeFailure::Output {
                reason: format!("{err:#}"),
            })?;

        let mut summary = MergeSummary::default();
        for (index, entry) in snapshot.entries().iter().enumerate() {
            let page_count = match self.merge_document(&mut output, entry).await {
                Ok(page_count) => page_count,
                Err(failure) => {
                    warn!(
                        document_id = %entry.document_id,
                        name = %entry.name,
                        error = %failure,
                        "merge: aborted"
                    );
                    return Err(failure);
                }
            };
            summary.page_count += page_count;
            summary.documents.push(MergedDocument {
                document_id: entry.document_id,
                page_count,
            });
            on_progress(MergeProgress {
                document_id: entry.document_id,
                page_count,
                completed: index + 1,
                total,
            });
        }

        let bytes = self
            .collaborator
            .serialize(output)
            .await
            .map_err(|err| MergeFailure::Output {
                reason: format!("{err:#}"),
            })?;
        info!(
            documents = total,
            pages = summary.page_count,
            bytes = bytes.len(),
            "merge: completed"
        );
        Ok(MergeOutput { bytes, summary })
    }

    async fn merge_document(
        &self,
        output: &mut M::Output,
        entry: &SnapshotEntry,
    ) -> Result<usize, MergeFailure> {
        let copy_failure = |reason: String| MergeFailure::CopyPages {
            document_id: entry.document_id,
            name: entry.name.clone(),
            reason,
        };

        let source = self
            .collaborator
            .load(&entry.payload)
            .await
            .map_err(|err| {
                MergeFailure::Parse(ParseError {
                    document_id: entry.document_id,
                    name: entry.name.clone(),
                    reason: format!("{err:#}"),
                })
            })?;
        let pages = self.collaborator.page_indices(&source);
        let copied = self
            .collaborator
            .copy_pages(output, source, &pages)
            .await
            .map_err(|err| copy_failure(format!("{err:#}")))?;

        if copied.len() != pages.len() {
            return Err(copy_failure(format!(
                "collaborator copied {} of {} pages",
                copied.len(),
                pages.len()
            )));
        }
        for page in copied {
            self.collaborator
                .append(output, page)
                .await
                .map_err(|err| copy_failure(format!("{err:#}")))?;
        }

        debug!(
            document_id = %entry.document_id,
            pages = pages.len(),
            "merge: appended document"
        );
        Ok(pages.len())
    }
}

#[cfg(test)]
#[path = "tests/merge_tests.rs"]
mod tests;
