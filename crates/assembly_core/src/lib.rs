use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use collection::{
    CollectionSnapshot, DocumentCollection, IncomingDocument, IngestReport, MoveOutcome,
};
use ports::{MergeCollaborator, PreviewRenderer};
use shared::{
    domain::{DocumentId, DocumentSummary, MergeSummary, SaveOutcome},
    error::{DeliveryError, ErrorPayload, MergeFailure},
    protocol::{AssemblyCommand, AssemblyEvent},
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

mod ingest;
mod merge;
mod output;
mod preview;
mod reorder;

pub use ingest::read_incoming;
pub use merge::{MergeOrchestrator, MergeOutput, MergeProgress};
pub use output::{DirectorySaveTrigger, InMemoryResourceHost, OutputEmitter};
pub use preview::{PreviewBatch, PreviewResult};
pub use reorder::{DragEvent, DragSession, DragState, ReorderController, ReorderOutcome};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Merge(#[from] MergeFailure),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub summary: MergeSummary,
    pub outcome: SaveOutcome,
    pub byte_len: usize,
}

/// One assembly workspace: the ordered collection, the drag controller that
/// rearranges it, and the event stream hosts render from.
pub struct AssemblySession {
    collection: DocumentCollection,
    reorder: ReorderController,
    events: broadcast::Sender<AssemblyEvent>,
    merge_in_flight: Arc<AtomicBool>,
}

impl Default for AssemblySession {
    fn default() -> Self {
        Self::new()
    }
}

impl AssemblySession {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            collection: DocumentCollection::new(),
            reorder: ReorderController::new(),
            events,
            merge_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AssemblyEvent> {
        self.events.subscribe()
    }

    pub fn collection(&self) -> &DocumentCollection {
        &self.collection
    }

    pub fn documents(&self) -> Vec<DocumentSummary> {
        self.collection.summaries()
    }

    pub fn drag_state(&self) -> DragState {
        self.reorder.state()
    }

    pub fn ingest<I>(&mut self, documents: I) -> IngestReport
    where
        I: IntoIterator<Item = IncomingDocument>,
    {
        let report = self.collection.append(documents);
        self.publish_ingest(&report);
        report
    }

    /// Reads `paths` from disk and ingests them in argument order. Read
    /// failures and validation failures share one rejection list, also in
    /// argument order.
    pub async fn ingest_paths(&mut self, paths: &[PathBuf]) -> IngestReport {
        let mut report = IngestReport::default();
        for result in read_incoming(paths).await {
            match result {
                Ok(document) => {
                    let part = self.collection.append([document]);
                    report.accepted.extend(part.accepted);
                    report.rejected.extend(part.rejected);
                }
                Err(err) => report.rejected.push(err),
            }
        }
        self.publish_ingest(&report);
        report
    }

    pub fn remove(&mut self, document_id: DocumentId) -> bool {
        if self.collection.remove_at(document_id).is_none() {
            return false;
        }
        self.emit(AssemblyEvent::DocumentRemoved { document_id });
        self.emit_order();
        true
    }

    pub fn move_to(&mut self, document_id: DocumentId, position: usize) -> Option<MoveOutcome> {
        let outcome = self.collection.move_to(document_id, position)?;
        if outcome.changed() {
            self.emit_order();
        }
        Some(outcome)
    }

    pub fn drag(&mut self, event: DragEvent) -> ReorderOutcome {
        let outcome = self.reorder.handle(&mut self.collection, event);
        match outcome {
            ReorderOutcome::Started { document_id } => {
                self.emit(AssemblyEvent::DragStarted { document_id })
            }
            ReorderOutcome::Moved { .. } => self.emit_order(),
            ReorderOutcome::Finished { document_id, moved } => {
                self.emit(AssemblyEvent::DragFinished { document_id, moved })
            }
            ReorderOutcome::Ignored | ReorderOutcome::Unchanged => {}
        }
        outcome
    }

    /// Applies a host command. Returns `false` when it referred to an absent
    /// document or arrived in a state that ignores it.
    pub fn apply(&mut self, command: AssemblyCommand) -> bool {
        match command {
            AssemblyCommand::Remove { document_id } => self.remove(document_id),
            AssemblyCommand::MoveTo {
                document_id,
                position,
            } => self.move_to(document_id, position).is_some(),
            AssemblyCommand::DragStart { document_id } => {
                self.drag(DragEvent::Start(document_id)) != ReorderOutcome::Ignored
            }
            AssemblyCommand::HoverEnter { document_id } => {
                self.drag(DragEvent::HoverEnter(document_id)) != ReorderOutcome::Ignored
            }
            AssemblyCommand::Drop => self.drag(DragEvent::Drop) != ReorderOutcome::Ignored,
            AssemblyCommand::DragEnd => self.drag(DragEvent::End) != ReorderOutcome::Ignored,
        }
    }

    /// Freezes the current order into a merge job. Only one job may be alive
    /// at a time; the session stays editable while it runs.
    pub fn begin_merge(&self) -> Result<MergeJob, MergeFailure> {
        if self.collection.is_empty() {
            let failure = MergeFailure::EmptyCollection;
            self.emit(AssemblyEvent::MergeFailed(ErrorPayload::from(&failure)));
            return Err(failure);
        }
        if self
            .merge_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let failure = MergeFailure::AlreadyRunning;
            self.emit(AssemblyEvent::MergeFailed(ErrorPayload::from(&failure)));
            return Err(failure);
        }

        Ok(MergeJob {
            snapshot: self.collection.merge_snapshot(),
            events: self.events.clone(),
            _guard: MergeGuard {
                in_flight: Arc::clone(&self.merge_in_flight),
            },
        })
    }

    pub fn is_merging(&self) -> bool {
        self.merge_in_flight.load(Ordering::Acquire)
    }

    pub fn preview_batch(&self) -> PreviewBatch {
        let entries = self
            .collection
            .iter()
            .map(|document| (document.id(), Arc::clone(document.payload())))
            .collect();
        PreviewBatch::new(entries, self.events.clone())
    }

    pub async fn render_previews(
        &self,
        renderer: &dyn PreviewRenderer,
        target_width: u32,
    ) -> Vec<PreviewResult> {
        self.preview_batch().render(renderer, target_width).await
    }

    /// Drops every document and any drag in progress, then announces the
    /// now empty order.
    pub fn dispose(&mut self) {
        let released = self.collection.len();
        self.collection.clear();
        self.reorder = ReorderController::new();
        self.emit_order();
        debug!(documents = released, "session: disposed");
    }

    fn publish_ingest(&self, report: &IngestReport) {
        if !report.accepted.is_empty() {
            let documents = self
                .collection
                .summaries()
                .into_iter()
                .filter(|summary| report.accepted.contains(&summary.document_id))
                .collect();
            self.emit(AssemblyEvent::DocumentsAppended { documents });
        }
        for err in &report.rejected {
            self.emit(AssemblyEvent::IngestionRejected {
                name: err.name().to_string(),
                error: ErrorPayload::from(err),
            });
        }
        info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            total = self.collection.len(),
            "session: ingested documents"
        );
    }

    fn emit_order(&self) {
        self.emit(AssemblyEvent::OrderChanged {
            order: self.collection.ordered_snapshot(),
        });
    }

    fn emit(&self, event: AssemblyEvent) {
        let _ = self.events.send(event);
    }
}

struct MergeGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for MergeGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// A merge over a frozen snapshot. Holding the job keeps the session's
/// single-flight slot taken.
pub struct MergeJob {
    snapshot: CollectionSnapshot,
    events: broadcast::Sender<AssemblyEvent>,
    _guard: MergeGuard,
}

impl MergeJob {
    pub fn snapshot(&self) -> &CollectionSnapshot {
        &self.snapshot
    }

    pub async fn run<M: MergeCollaborator>(
        self,
        collaborator: &M,
    ) -> Result<MergeOutput, MergeFailure> {
        self.merge(collaborator).await
    }

    pub async fn run_and_deliver<M: MergeCollaborator>(
        self,
        collaborator: &M,
        emitter: &OutputEmitter,
    ) -> Result<DeliveryReport, AssemblyError> {
        let output = self.merge(collaborator).await?;
        let byte_len = output.bytes.len();

        match emitter.emit(output.bytes).await {
            Ok(outcome) => {
                let _ = self.events.send(AssemblyEvent::OutputDelivered {
                    file_name: emitter.file_name().to_string(),
                    outcome: outcome.clone(),
                });
                Ok(DeliveryReport {
                    summary: output.summary,
                    outcome,
                    byte_len,
                })
            }
            Err(err) => {
                let _ = self
                    .events
                    .send(AssemblyEvent::DeliveryFailed(ErrorPayload::from(&err)));
                Err(err.into())
            }
        }
    }

    async fn merge<M: MergeCollaborator>(
        &self,
        collaborator: &M,
    ) -> Result<MergeOutput, MergeFailure> {
        let events = &self.events;
        let _ = events.send(AssemblyEvent::MergeStarted {
            document_count: self.snapshot.len(),
        });

        let result = MergeOrchestrator::new(collaborator)
            .merge_with_progress(&self.snapshot, |progress| {
                let _ = events.send(AssemblyEvent::MergeProgress {
                    document_id: progress.document_id,
                    page_count: progress.page_count,
                    completed: progress.completed,
                    total: progress.total,
                });
            })
            .await;

        let event = match &result {
            Ok(output) => AssemblyEvent::MergeCompleted {
                page_count: output.page_count(),
                byte_len: output.bytes.len(),
            },
            Err(failure) => AssemblyEvent::MergeFailed(ErrorPayload::from(failure)),
        };
        let _ = events.send(event);
        result
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
