use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use ports::{PreviewImage, PreviewRenderer};
use tracing::debug;

/// Renders page one with pdfium. Each render binds the library on a blocking
/// thread, so no pdfium state is shared between concurrent renders.
#[derive(Debug, Clone, Default)]
pub struct PdfiumPreviewRenderer {
    library_dir: Option<PathBuf>,
}

impl PdfiumPreviewRenderer {
    pub fn system() -> Self {
        Self::default()
    }

    pub fn with_library_dir(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(library_dir.into()),
        }
    }
}

#[async_trait]
impl PreviewRenderer for PdfiumPreviewRenderer {
    async fn render_first_page(
        &self,
        payload: Arc<[u8]>,
        target_width: u32,
    ) -> Result<PreviewImage> {
        let library_dir = self.library_dir.clone();
        tokio::task::spawn_blocking(move || {
            render_first_page_blocking(library_dir.as_deref(), &payload, target_width)
        })
        .await
        .context("preview render task panicked")?
    }
}

fn render_first_page_blocking(
    library_dir: Option<&Path>,
    payload: &[u8],
    target_width: u32,
) -> Result<PreviewImage> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|err| anyhow!("failed to bind pdfium: {err}"))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(payload, None)
        .map_err(|err| anyhow!("pdfium could not open the document: {err}"))?;
    let page = document
        .pages()
        .get(0)
        .map_err(|err| anyhow!("document has no first page: {err}"))?;
    let config = PdfRenderConfig::new().set_target_width(target_width as i32);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|err| anyhow!("failed to render first page: {err}"))?;

    let width = bitmap.width() as u32;
    let height = bitmap.height() as u32;
    let pixels = image::RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
        .ok_or_else(|| anyhow!("pdfium returned a {width}x{height} bitmap of unexpected size"))?;
    let mut png = Vec::new();
    pixels
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .context("failed to encode preview as PNG")?;

    debug!(width, height, bytes = png.len(), "pdf: rendered first page preview");
    Ok(PreviewImage { width, height, png })
}
