//! PDF rasterisation: render pages to PNG files via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking thread pool
//! so Tokio worker threads never stall during CPU-heavy rendering.
//!
//! ## Why a pixel envelope, not DPI?
//!
//! Page sizes vary wildly; a DPI setting on an A0 poster would allocate a
//! gigantic bitmap. A fixed 2480×3508 envelope (A4 at 300 DPI) bounds memory
//! for any page while staying comfortably sharp for the vision model.

use crate::error::StageError;
use crate::pipeline::{PageRasterizer, PageSelection};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Target pixel envelope for rendered pages (A4 at 300 DPI).
const PAGE_WIDTH_PX: i32 = 2480;
const PAGE_HEIGHT_PX: i32 = 3508;

/// The production [`PageRasterizer`], backed by pdfium.
#[derive(Debug, Default)]
pub struct PdfiumRasterizer;

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        pdf: &Path,
        out_dir: &Path,
        pages: PageSelection,
    ) -> Result<Vec<PathBuf>, StageError> {
        let pdf = pdf.to_path_buf();
        let out_dir = out_dir.to_path_buf();

        tokio::task::spawn_blocking(move || rasterize_blocking(&pdf, &out_dir, pages))
            .await
            .map_err(|e| StageError::Conversion {
                detail: format!("render task panicked: {e}"),
            })?
    }
}

/// Blocking implementation of page rasterisation.
fn rasterize_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    pages: PageSelection,
) -> Result<Vec<PathBuf>, StageError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| StageError::Conversion {
            detail: format!("failed to open '{}': {:?}", pdf_path.display(), e),
        })?;

    let doc_pages = document.pages();
    let total_pages = doc_pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let indices: Vec<usize> = match pages {
        PageSelection::All => (0..total_pages).collect(),
        PageSelection::Single(p) if p >= 1 && p <= total_pages => vec![p - 1],
        PageSelection::Single(p) => {
            return Err(StageError::Conversion {
                detail: format!("page {p} is out of range (document has {total_pages} pages)"),
            })
        }
    };

    let render_config = PdfRenderConfig::new()
        .set_target_width(PAGE_WIDTH_PX)
        .set_maximum_height(PAGE_HEIGHT_PX);

    let mut written = Vec::with_capacity(indices.len());

    for idx in indices {
        let page = doc_pages.get(idx as u16).map_err(|e| StageError::Conversion {
            detail: format!("failed to load page {}: {:?}", idx + 1, e),
        })?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| StageError::Conversion {
                detail: format!("rasterisation failed for page {}: {:?}", idx + 1, e),
            })?;

        let image = bitmap.as_image();
        let path = out_dir.join(format!("page-{}.png", idx + 1));
        image.save(&path).map_err(|e| StageError::Conversion {
            detail: format!("failed to write '{}': {e}", path.display()),
        })?;

        debug!(
            "Rendered page {} → {}x{} px at {}",
            idx + 1,
            image.width(),
            image.height(),
            path.display()
        );
        written.push(path);
    }

    Ok(written)
}
