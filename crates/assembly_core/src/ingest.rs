use std::path::{Path, PathBuf};

use collection::IncomingDocument;
use futures::future::join_all;
use shared::error::IngestionError;
use tracing::debug;

/// Reads every path concurrently, preserving input order in the result.
pub async fn read_incoming(paths: &[PathBuf]) -> Vec<Result<IncomingDocument, IngestionError>> {
    join_all(paths.iter().map(|path| read_one(path))).await
}

async fn read_one(path: &Path) -> Result<IncomingDocument, IngestionError> {
    let name = display_name(path);
    match tokio::fs::read(path).await {
        Ok(payload) => {
            debug!(path = %path.display(), bytes = payload.len(), "ingest: read file");
            Ok(IncomingDocument::new(name, payload))
        }
        Err(err) => Err(IngestionError::Unreadable {
            name,
            reason: err.to_string(),
        }),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
