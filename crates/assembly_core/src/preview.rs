use std::sync::Arc;

use futures::future::join_all;
use ports::{PreviewImage, PreviewRenderer};
use shared::{
    domain::DocumentId,
    error::{ErrorCode, ErrorPayload, PreviewError},
    protocol::AssemblyEvent,
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct PreviewResult {
    pub document_id: DocumentId,
    pub result: Result<PreviewImage, PreviewError>,
}

/// First-page previews for a set of documents. Renders run concurrently and
/// each outcome is reported on its own; one failure never blocks the rest.
pub struct PreviewBatch {
    entries: Vec<(DocumentId, Arc<[u8]>)>,
    events: broadcast::Sender<AssemblyEvent>,
}

impl PreviewBatch {
    pub fn new(
        entries: Vec<(DocumentId, Arc<[u8]>)>,
        events: broadcast::Sender<AssemblyEvent>,
    ) -> Self {
        Self { entries, events }
    }

    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    pub async fn render(
        self,
        renderer: &dyn PreviewRenderer,
        target_width: u32,
    ) -> Vec<PreviewResult> {
        let renders = self.entries.into_iter().map(|(document_id, payload)| async move {
            let result = renderer
                .render_first_page(payload, target_width)
                .await
                .map_err(|err| PreviewError {
                    document_id,
                    reason: format!("{err:#}"),
                });
            PreviewResult {
                document_id,
                result,
            }
        });
        let results = join_all(renders).await;

        for preview in &results {
            let event = match &preview.result {
                Ok(image) => {
                    debug!(
                        document_id = %preview.document_id,
                        width = image.width,
                        height = image.height,
                        "preview: rendered"
                    );
                    AssemblyEvent::PreviewReady {
                        document_id: preview.document_id,
                        width: image.width,
                        height: image.height,
                    }
                }
                Err(err) => {
                    warn!(document_id = %preview.document_id, error = %err, "preview: failed");
                    AssemblyEvent::PreviewFailed {
                        document_id: preview.document_id,
                        error: ErrorPayload::new(ErrorCode::Preview, err.to_string())
                            .for_document(preview.document_id),
                    }
                }
            };
            let _ = self.events.send(event);
        }
        results
    }
}
