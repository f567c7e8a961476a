use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use collection::{DocumentCollection, IncomingDocument};
use ports::PageNumber;

use super::*;

/// Payloads look like `%PDF- A1 A2 A3`; a payload containing `broken` fails
/// to load and one containing `nocopy` fails to copy.
#[derive(Default)]
struct LabelCollaborator {
    live_sources: Arc<AtomicUsize>,
    peak_sources: Arc<AtomicUsize>,
    calls: Mutex<Vec<String>>,
    live_at_append: Mutex<Vec<usize>>,
    fail_serialize: bool,
}

struct LabelSource {
    labels: Vec<String>,
    copy_fails: bool,
    live: Arc<AtomicUsize>,
}

impl Drop for LabelSource {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LabelCollaborator {
    fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl MergeCollaborator for LabelCollaborator {
    type Output = Vec<String>;
    type Source = LabelSource;
    type Page = String;

    async fn create_empty(&self) -> Result<Self::Output> {
        self.record("create_empty");
        Ok(Vec::new())
    }

    async fn load(&self, payload: &[u8]) -> Result<Self::Source> {
        let text = std::str::from_utf8(payload)?;
        self.record(format!("load {text}"));
        if text.contains("broken") {
            bail!("invalid cross-reference table");
        }
        let live = self.live_sources.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_sources.fetch_max(live, Ordering::SeqCst);
        Ok(LabelSource {
            labels: text
                .split_whitespace()
                .skip(1)
                .filter(|label| *label != "nocopy")
                .map(str::to_string)
                .collect(),
            copy_fails: text.contains("nocopy"),
            live: Arc::clone(&self.live_sources),
        })
    }

    fn page_indices(&self, source: &Self::Source) -> Vec<PageNumber> {
        (1..=source.labels.len() as PageNumber).collect()
    }

    async fn copy_pages(
        &self,
        _output: &mut Self::Output,
        source: Self::Source,
        pages: &[PageNumber],
    ) -> Result<Vec<Self::Page>> {
        if source.copy_fails {
            bail!("dangling resource reference");
        }
        pages
            .iter()
            .map(|page| {
                source
                    .labels
                    .get(*page as usize - 1)
                    .cloned()
                    .ok_or_else(|| anyhow!("page {page} does not exist"))
            })
            .collect()
    }

    async fn append(&self, output: &mut Self::Output, page: Self::Page) -> Result<()> {
        self.live_at_append
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(self.live_sources.load(Ordering::SeqCst));
        output.push(page);
        Ok(())
    }

    async fn serialize(&self, output: Self::Output) -> Result<Vec<u8>> {
        self.record("serialize");
        if self.fail_serialize {
            bail!("disk full");
        }
        Ok(output.join(",").into_bytes())
    }
}

fn snapshot_of(payloads: &[&str]) -> (CollectionSnapshot, Vec<DocumentId>) {
    let mut collection = DocumentCollection::new();
    let report = collection.append(
        payloads
            .iter()
            .enumerate()
            .map(|(index, payload)| IncomingDocument::new(format!("doc{index}.pdf"), payload.as_bytes())),
    );
    assert!(report.rejected.is_empty());
    (collection.merge_snapshot(), report.accepted)
}

#[tokio::test]
async fn pages_are_concatenated_in_snapshot_order() {
    let collaborator = LabelCollaborator::default();
    let (snapshot, ids) = snapshot_of(&["%PDF- A1 A2 A3", "%PDF- B1", "%PDF- C1 C2"]);

    let output = MergeOrchestrator::new(&collaborator)
        .merge(&snapshot)
        .await
        .expect("merge succeeds");

    assert_eq!(output.bytes, b"A1,A2,A3,B1,C1,C2");
    assert_eq!(output.page_count(), 6);
    assert_eq!(
        output.summary.documents,
        vec![
            MergedDocument {
                document_id: ids[0],
                page_count: 3
            },
            MergedDocument {
                document_id: ids[1],
                page_count: 1
            },
            MergedDocument {
                document_id: ids[2],
                page_count: 2
            },
        ]
    );
}

#[tokio::test]
async fn sources_are_processed_one_at_a_time() {
    let collaborator = LabelCollaborator::default();
    let (snapshot, _) = snapshot_of(&["%PDF- A1", "%PDF- B1 B2", "%PDF- C1", "%PDF- D1"]);

    MergeOrchestrator::new(&collaborator)
        .merge(&snapshot)
        .await
        .expect("merge succeeds");

    assert_eq!(collaborator.peak_sources.load(Ordering::SeqCst), 1);
    assert_eq!(collaborator.live_sources.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn source_is_released_before_its_pages_are_appended() {
    let collaborator = LabelCollaborator::default();
    let (snapshot, _) = snapshot_of(&["%PDF- A1 A2", "%PDF- B1"]);

    MergeOrchestrator::new(&collaborator)
        .merge(&snapshot)
        .await
        .expect("merge succeeds");

    let live_at_append = collaborator
        .live_at_append
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    assert_eq!(live_at_append, vec![0, 0, 0]);
}

#[tokio::test]
async fn empty_snapshot_fails_without_touching_the_collaborator() {
    let collaborator = LabelCollaborator::default();

    let err = MergeOrchestrator::new(&collaborator)
        .merge(&CollectionSnapshot::default())
        .await
        .expect_err("empty merge must fail");

    assert_eq!(err, MergeFailure::EmptyCollection);
    assert!(collaborator.calls().is_empty());
}

#[tokio::test]
async fn unparsable_document_aborts_and_names_the_document() {
    let collaborator = LabelCollaborator::default();
    let (snapshot, ids) = snapshot_of(&["%PDF- A1", "%PDF- broken", "%PDF- C1"]);

    let err = MergeOrchestrator::new(&collaborator)
        .merge(&snapshot)
        .await
        .expect_err("merge must fail");

    assert_eq!(err.offending_document(), Some(ids[1]));
    assert!(matches!(err, MergeFailure::Parse(ref parse) if parse.name == "doc1.pdf"));
    let calls = collaborator.calls();
    assert!(!calls.iter().any(|call| call.contains("C1")));
    assert!(!calls.iter().any(|call| call == "serialize"));
}

#[tokio::test]
async fn copy_failure_is_reported_against_its_document() {
    let collaborator = LabelCollaborator::default();
    let (snapshot, ids) = snapshot_of(&["%PDF- A1 nocopy", "%PDF- B1"]);

    let err = MergeOrchestrator::new(&collaborator)
        .merge(&snapshot)
        .await
        .expect_err("merge must fail");

    match err {
        MergeFailure::CopyPages {
            document_id,
            reason,
            ..
        } => {
            assert_eq!(document_id, ids[0]);
            assert!(reason.contains("dangling"));
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn serialize_failure_is_an_output_failure() {
    let collaborator = LabelCollaborator {
        fail_serialize: true,
        ..LabelCollaborator::default()
    };
    let (snapshot, _) = snapshot_of(&["%PDF- A1"]);

    let err = MergeOrchestrator::new(&collaborator)
        .merge(&snapshot)
        .await
        .expect_err("merge must fail");

    assert!(matches!(err, MergeFailure::Output { ref reason } if reason.contains("disk full")));
    assert_eq!(err.offending_document(), None);
}

#[tokio::test]
async fn progress_is_reported_after_each_document() {
    let collaborator = LabelCollaborator::default();
    let (snapshot, ids) = snapshot_of(&["%PDF- A1 A2", "%PDF- B1"]);
    let mut progress = Vec::new();

    MergeOrchestrator::new(&collaborator)
        .merge_with_progress(&snapshot, |step| progress.push(step))
        .await
        .expect("merge succeeds");

    assert_eq!(
        progress,
        vec![
            MergeProgress {
                document_id: ids[0],
                page_count: 2,
                completed: 1,
                total: 2
            },
            MergeProgress {
                document_id: ids[1],
                page_count: 1,
                completed: 2,
                total: 2
            },
        ]
    );
}
