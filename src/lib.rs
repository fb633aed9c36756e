//! # snapmd
//!
//! Convert PDF documents and images to Markdown by delegating visual
//! recognition to a hosted vision OCR model, served through two front ends:
//! an HTTP upload endpoint and a Telegram bot.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload / attachment
//!  │
//!  ├─ 1. Kind      pdf | jpeg | png from extension/MIME, fail fast otherwise
//!  ├─ 2. Raster    PDF pages → PNG via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Normalize bound to 1800×2400 px, JPEG q80, never upscaled
//!  ├─ 4. Recognize hosted vision model → Markdown per page, no local retry
//!  └─ 5. Assemble  page results joined by blank lines, scratch files gone
//! ```
//!
//! ## Front Ends
//!
//! * [`http`] — `POST /api/ocr` multipart upload, ≤10 MiB, JPEG/PNG/PDF only,
//!   `{ markdown }` on success, `{ message }` + 5xx on pipeline failure.
//! * [`bot`] — long-polling Telegram connector with an explicit lifecycle:
//!   conflict (409) backs off 30 s, any other failure 5 s, and a
//!   [`bot::Supervisor`] guarantees a single receive loop per process.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snapmd::config::Config;
//! use snapmd::pipeline::{normalize::JpegNormalizer, raster::PdfiumRasterizer, recognize::VisionOcr};
//! use snapmd::process::FilePipeline;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let pipeline = Arc::new(FilePipeline::new(
//!     Arc::new(PdfiumRasterizer),
//!     Arc::new(JpegNormalizer::default()),
//!     Arc::new(VisionOcr::new(
//!         &config.recognition_api_key,
//!         &config.recognition_base_url,
//!         &config.recognition_model,
//!     )),
//!     config.work_dir.clone(),
//! ));
//! let markdown = pipeline.process_file(std::path::Path::new("scan.pdf")).await?;
//! println!("{markdown}");
//! # Ok(())
//! # }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bot;
pub mod chunk;
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod process;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::Config;
pub use error::{ConfigError, ProcessingError, StageError};
pub use process::{FilePipeline, SourceKind};
