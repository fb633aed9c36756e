//! Pipeline stages for file-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, behind a small
//! trait so the orchestrator in [`crate::process`] can be exercised in tests
//! without a pdfium binary or network access.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ raster ──▶ normalize ──▶ recognize
//! (pdf/img)  (pdfium)   (bounded jpeg)  (hosted vision OCR)
//! ```
//!
//! 1. [`raster`]    — rasterise PDF pages to PNG files; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`normalize`] — bound resolution and re-encode as JPEG before upload;
//!    also `spawn_blocking` (pure CPU)
//! 3. [`recognize`] — submit one image to the hosted vision model and return
//!    its Markdown; the only stage with network I/O, no local retry

pub mod normalize;
pub mod raster;
pub mod recognize;

use crate::error::StageError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Which pages of a PDF to rasterise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSelection {
    /// All pages, in order (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
}

/// Converts one PDF file into an ordered sequence of page images on disk.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Rasterise the selected pages of `pdf` into `out_dir`.
    ///
    /// Returns the written image paths in ascending page order. Never
    /// deletes the source PDF.
    async fn rasterize(
        &self,
        pdf: &Path,
        out_dir: &Path,
        pages: PageSelection,
    ) -> Result<Vec<PathBuf>, StageError>;
}

/// Produces a size/quality-bounded copy of an image for remote submission.
#[async_trait]
pub trait ImageNormalizer: Send + Sync {
    /// Write a bounded derivative of `input` to `output`.
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), StageError>;
}

/// Submits one image to the external OCR capability.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognise a local image file, returning Markdown text.
    async fn recognize_file(&self, image: &Path) -> Result<String, StageError>;

    /// Recognise an image that is already reachable by URL.
    async fn recognize_url(&self, url: &str) -> Result<String, StageError>;
}
