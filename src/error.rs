//! Error types for the snapmd library.
//!
//! Two layers reflect two distinct failure scopes:
//!
//! * [`StageError`] — a single pipeline stage failed (bad extension, pdfium
//!   could not open the document, the image would not decode, the vision API
//!   rejected the request). Stage errors carry enough detail to tell the
//!   stages apart but are never shown to end users directly.
//!
//! * [`ProcessingError`] — the stage error wrapped with the path of the file
//!   being processed. This is what the front ends see: the HTTP handler turns
//!   it into a JSON error body, the bot into a fixed apology message.
//!
//! Connector-level failures (Telegram transport, HTTP 409 conflicts) live in
//! [`crate::bot::api::BotApiError`] — they drive the reconnect state machine
//! and are deliberately kept out of the pipeline taxonomy.

use std::path::PathBuf;
use thiserror::Error;

/// A failure in one stage of the file pipeline.
#[derive(Debug, Error)]
pub enum StageError {
    /// The file extension is not one of pdf / jpg / jpeg / png.
    ///
    /// Raised before any disk I/O happens.
    #[error("unsupported file type '.{extension}' — only PDF, JPEG and PNG are accepted")]
    UnsupportedType { extension: String },

    /// PDF rasterisation failed: the source is not a valid PDF, a page could
    /// not be rendered, or the page image could not be written.
    #[error("PDF conversion failed: {detail}")]
    Conversion { detail: String },

    /// Image normalisation failed: unreadable or corrupt input, or the
    /// bounded JPEG copy could not be written.
    #[error("image normalisation failed for '{path}': {detail}")]
    Normalization { path: PathBuf, detail: String },

    /// The remote recognition call failed: transport error, invalid
    /// credential, or an empty/malformed response.
    #[error("recognition request failed: {detail}")]
    Recognition { detail: String },
}

/// A stage error wrapped with the file it occurred on.
///
/// The single error type surfaced by
/// [`FilePipeline::process_file`](crate::process::FilePipeline::process_file).
/// Partial per-page results are discarded when this is returned.
#[derive(Debug, Error)]
#[error("failed to process '{path}': {source}")]
pub struct ProcessingError {
    pub path: PathBuf,
    #[source]
    pub source: StageError,
}

impl ProcessingError {
    pub fn new(path: impl Into<PathBuf>, source: StageError) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Fatal startup configuration errors.
///
/// Unlike every other error in the crate these abort the process: a service
/// without its recognition or bot credential cannot do anything useful.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    #[error("{name} must be set\nExport it or add it to the service .env file.")]
    MissingVar { name: &'static str },

    /// The working directory could not be created.
    #[error("failed to create working directory '{path}': {detail}")]
    WorkDir { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_display_names_extension() {
        let e = StageError::UnsupportedType {
            extension: "docx".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains(".docx"), "got: {msg}");
        assert!(msg.contains("PDF"), "got: {msg}");
    }

    #[test]
    fn processing_error_display_includes_path_and_stage() {
        let e = ProcessingError::new(
            "/tmp/scan.pdf",
            StageError::Conversion {
                detail: "not a PDF".into(),
            },
        );
        let msg = e.to_string();
        assert!(msg.contains("/tmp/scan.pdf"), "got: {msg}");
        assert!(msg.contains("not a PDF"), "got: {msg}");
    }

    #[test]
    fn missing_var_display() {
        let e = ConfigError::MissingVar {
            name: "TELEGRAM_BOT_TOKEN",
        };
        assert!(e.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }
}
