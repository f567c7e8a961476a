//! PDF implementation of the collaborator ports, backed by `lopdf` for page
//! copying and (optionally) `pdfium-render` for first-page thumbnails.

mod merge;
#[cfg(feature = "pdfium")]
mod preview;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use merge::{page_count, CopiedPage, LoadedDocument, LopdfMergeCollaborator, MergeDocument};
#[cfg(feature = "pdfium")]
pub use preview::PdfiumPreviewRenderer;
