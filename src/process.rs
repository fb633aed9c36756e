//! File pipeline: orchestrates raster → normalize → recognize per file.
//!
//! The pipeline is stateless and reentrant. Every invocation gets its own
//! scratch directory (a [`tempfile::TempDir`] under the shared working
//! directory), so concurrent invocations never collide and cleanup holds on
//! every exit path — the per-page unlinks bound disk usage while the run is
//! in flight, and the `TempDir` drop sweeps whatever an early error left
//! behind.
//!
//! Any stage failure aborts the remaining stages for that file and surfaces
//! one [`ProcessingError`]; partial per-page results are discarded rather
//! than returned as truncated output.

use crate::error::{ProcessingError, StageError};
use crate::pipeline::{ImageNormalizer, PageRasterizer, PageSelection, Recognizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The accepted source file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Jpeg,
    Png,
}

impl SourceKind {
    /// Classify by file extension (case-insensitive). `None` for anything
    /// outside pdf / jpg / jpeg / png.
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => Some(Self::Pdf),
            Some("jpg") | Some("jpeg") => Some(Self::Jpeg),
            Some("png") => Some(Self::Png),
            _ => None,
        }
    }

    /// Classify by declared MIME type. Both front ends validate with this
    /// before any bytes touch disk.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Orchestrates the three pipeline stages for one file at a time.
pub struct FilePipeline {
    rasterizer: Arc<dyn PageRasterizer>,
    normalizer: Arc<dyn ImageNormalizer>,
    recognizer: Arc<dyn Recognizer>,
    work_dir: PathBuf,
}

impl FilePipeline {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        normalizer: Arc<dyn ImageNormalizer>,
        recognizer: Arc<dyn Recognizer>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rasterizer,
            normalizer,
            recognizer,
            work_dir: work_dir.into(),
        }
    }

    /// The shared working directory scratch space is created under.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Convert one file to Markdown.
    ///
    /// The source file itself is never deleted — that is the caller's
    /// responsibility (both front ends hold it in an auto-deleted temp file).
    pub async fn process_file(&self, path: &Path) -> Result<String, ProcessingError> {
        // Kind check comes first: unsupported extensions fail before any
        // disk I/O, including creation of the working directory.
        let kind = SourceKind::from_extension(path).ok_or_else(|| {
            ProcessingError::new(
                path,
                StageError::UnsupportedType {
                    extension: path
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("")
                        .to_ascii_lowercase(),
                },
            )
        })?;

        let wrap = |e: StageError| ProcessingError::new(path, e);

        std::fs::create_dir_all(&self.work_dir).map_err(|e| {
            wrap(StageError::Conversion {
                detail: format!("cannot create working directory: {e}"),
            })
        })?;
        let scratch = tempfile::tempdir_in(&self.work_dir).map_err(|e| {
            wrap(StageError::Conversion {
                detail: format!("cannot create scratch directory: {e}"),
            })
        })?;

        info!("Processing '{}' as {:?}", path.display(), kind);
        let markdown = match kind {
            SourceKind::Pdf => self.process_pdf(path, scratch.path()).await,
            SourceKind::Jpeg | SourceKind::Png => self.process_image(path, scratch.path()).await,
        }
        .map_err(wrap)?;

        Ok(markdown)
    }

    /// Rasterise every page, then normalize + recognize each in page order.
    async fn process_pdf(&self, path: &Path, scratch: &Path) -> Result<String, StageError> {
        let pages = self
            .rasterizer
            .rasterize(path, scratch, PageSelection::All)
            .await?;

        if pages.is_empty() {
            return Err(StageError::Conversion {
                detail: "no content produced: the PDF yielded zero pages".to_string(),
            });
        }

        let mut full_text = String::new();
        for (i, page) in pages.iter().enumerate() {
            let normalized = scratch.join(format!("norm-{}.jpg", i + 1));
            let result = self.normalize_and_recognize(page, &normalized).await;

            // Unlink the page image and its derivative immediately, success
            // or failure, to bound disk usage. Unlink errors never propagate.
            std::fs::remove_file(page).ok();
            std::fs::remove_file(&normalized).ok();

            let text = result?;
            debug!("Page {}/{} recognised ({} chars)", i + 1, pages.len(), text.len());
            full_text.push_str(&text);
            full_text.push_str("\n\n");
        }

        Ok(full_text.trim().to_string())
    }

    /// Direct image upload: normalize then recognize, no rasterisation.
    async fn process_image(&self, path: &Path, scratch: &Path) -> Result<String, StageError> {
        let normalized = scratch.join("normalized.jpg");
        let result = self.normalize_and_recognize(path, &normalized).await;
        std::fs::remove_file(&normalized).ok();
        Ok(result?.trim().to_string())
    }

    async fn normalize_and_recognize(
        &self,
        image: &Path,
        normalized: &Path,
    ) -> Result<String, StageError> {
        self.normalizer.normalize(image, normalized).await?;
        self.recognizer.recognize_file(normalized).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Shared call journal so tests can assert stage ordering.
    #[derive(Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }
        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeRasterizer {
        pages: usize,
        calls: AtomicUsize,
        journal: Arc<Journal>,
    }

    #[async_trait]
    impl PageRasterizer for FakeRasterizer {
        async fn rasterize(
            &self,
            _pdf: &Path,
            out_dir: &Path,
            _pages: PageSelection,
        ) -> Result<Vec<PathBuf>, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.journal.push("rasterize");
            let mut out = Vec::new();
            for i in 1..=self.pages {
                let p = out_dir.join(format!("page-{i}.png"));
                std::fs::write(&p, b"png-bytes").unwrap();
                out.push(p);
            }
            Ok(out)
        }
    }

    struct FakeNormalizer {
        calls: AtomicUsize,
        journal: Arc<Journal>,
    }

    #[async_trait]
    impl ImageNormalizer for FakeNormalizer {
        async fn normalize(&self, input: &Path, output: &Path) -> Result<(), StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.journal
                .push(format!("normalize:{}", input.file_name().unwrap().to_string_lossy()));
            std::fs::copy(input, output).map_err(|e| StageError::Normalization {
                path: input.to_path_buf(),
                detail: e.to_string(),
            })?;
            Ok(())
        }
    }

    struct FakeRecognizer {
        calls: AtomicUsize,
        journal: Arc<Journal>,
        /// 1-indexed call number that should fail, if any.
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl Recognizer for FakeRecognizer {
        async fn recognize_file(&self, image: &Path) -> Result<String, StageError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.journal
                .push(format!("recognize:{}", image.file_name().unwrap().to_string_lossy()));
            if self.fail_on_call == Some(call) {
                return Err(StageError::Recognition {
                    detail: "simulated failure".to_string(),
                });
            }
            // "Page A", "Page B", …
            let letter = (b'A' + (call as u8 - 1)) as char;
            Ok(format!("Page {letter}"))
        }

        async fn recognize_url(&self, _url: &str) -> Result<String, StageError> {
            unreachable!("pipeline only submits local files")
        }
    }

    struct Fixture {
        pipeline: FilePipeline,
        journal: Arc<Journal>,
        raster_calls: Arc<FakeRasterizer>,
        normalizer: Arc<FakeNormalizer>,
        recognizer: Arc<FakeRecognizer>,
        work_dir: PathBuf,
        _root: tempfile::TempDir,
    }

    fn fixture(pdf_pages: usize, fail_on_call: Option<usize>) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("work");
        let journal = Arc::new(Journal::default());
        let raster = Arc::new(FakeRasterizer {
            pages: pdf_pages,
            calls: AtomicUsize::new(0),
            journal: Arc::clone(&journal),
        });
        let normalizer = Arc::new(FakeNormalizer {
            calls: AtomicUsize::new(0),
            journal: Arc::clone(&journal),
        });
        let recognizer = Arc::new(FakeRecognizer {
            calls: AtomicUsize::new(0),
            journal: Arc::clone(&journal),
            fail_on_call,
        });
        let pipeline = FilePipeline::new(
            Arc::clone(&raster) as Arc<dyn PageRasterizer>,
            Arc::clone(&normalizer) as Arc<dyn ImageNormalizer>,
            Arc::clone(&recognizer) as Arc<dyn Recognizer>,
            &work_dir,
        );
        Fixture {
            pipeline,
            journal,
            raster_calls: raster,
            normalizer,
            recognizer,
            work_dir,
            _root: root,
        }
    }

    /// Everything under the working directory, recursively.
    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let p = entry.path();
                if p.is_dir() {
                    found.extend(files_under(&p));
                } else {
                    found.push(p);
                }
            }
        }
        found
    }

    #[tokio::test]
    async fn single_image_normalizes_then_recognizes_exactly_once() {
        let fx = fixture(0, None);
        let source = fx._root.path().join("photo.jpg");
        std::fs::write(&source, b"jpeg-bytes").unwrap();

        let markdown = fx.pipeline.process_file(&source).await.unwrap();

        assert_eq!(markdown, "Page A");
        assert_eq!(fx.raster_calls.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.normalizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.recognizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            fx.journal.entries(),
            vec!["normalize:photo.jpg", "recognize:normalized.jpg"]
        );
        // Source survives; scratch is gone.
        assert!(source.exists());
        assert!(files_under(&fx.work_dir).is_empty());
    }

    #[tokio::test]
    async fn two_page_pdf_joins_results_in_page_order() {
        let fx = fixture(2, None);
        let source = fx._root.path().join("doc.pdf");
        std::fs::write(&source, b"%PDF-").unwrap();

        let markdown = fx.pipeline.process_file(&source).await.unwrap();

        assert_eq!(markdown, "Page A\n\nPage B");
        assert_eq!(fx.raster_calls.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.normalizer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fx.recognizer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            fx.journal.entries(),
            vec![
                "rasterize",
                "normalize:page-1.png",
                "recognize:norm-1.jpg",
                "normalize:page-2.png",
                "recognize:norm-2.jpg",
            ]
        );
        assert!(files_under(&fx.work_dir).is_empty());
    }

    #[tokio::test]
    async fn unsupported_extension_fails_before_any_io() {
        let fx = fixture(0, None);
        let source = fx._root.path().join("notes.docx");
        // Deliberately never created on disk: the kind check must not care.

        let err = fx.pipeline.process_file(&source).await.unwrap_err();

        assert!(matches!(err.source, StageError::UnsupportedType { .. }));
        assert!(fx.journal.entries().is_empty());
        // Not even the working directory was created.
        assert!(!fx.work_dir.exists());
    }

    #[tokio::test]
    async fn stage_failure_discards_partial_results_and_cleans_up() {
        let fx = fixture(3, Some(2));
        let source = fx._root.path().join("doc.pdf");
        std::fs::write(&source, b"%PDF-").unwrap();

        let err = fx.pipeline.process_file(&source).await.unwrap_err();

        assert!(matches!(err.source, StageError::Recognition { .. }));
        // Page 3 was never reached.
        assert_eq!(fx.recognizer.calls.load(Ordering::SeqCst), 2);
        // No partial markdown, no leftover files.
        assert!(files_under(&fx.work_dir).is_empty());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn zero_page_pdf_reports_no_content() {
        let fx = fixture(0, None);
        let source = fx._root.path().join("empty.pdf");
        std::fs::write(&source, b"%PDF-").unwrap();

        let err = fx.pipeline.process_file(&source).await.unwrap_err();

        match err.source {
            StageError::Conversion { detail } => {
                assert!(detail.contains("no content produced"), "got: {detail}")
            }
            other => panic!("expected Conversion, got {other:?}"),
        }
    }

    #[test]
    fn source_kind_classification() {
        assert_eq!(
            SourceKind::from_extension(Path::new("a/b/scan.PDF")),
            Some(SourceKind::Pdf)
        );
        assert_eq!(
            SourceKind::from_extension(Path::new("photo.JPEG")),
            Some(SourceKind::Jpeg)
        );
        assert_eq!(SourceKind::from_extension(Path::new("shot.png")), Some(SourceKind::Png));
        assert_eq!(SourceKind::from_extension(Path::new("archive.zip")), None);
        assert_eq!(SourceKind::from_extension(Path::new("no_extension")), None);

        assert_eq!(SourceKind::from_mime("application/pdf"), Some(SourceKind::Pdf));
        assert_eq!(SourceKind::from_mime("image/jpeg"), Some(SourceKind::Jpeg));
        assert_eq!(SourceKind::from_mime("image/png"), Some(SourceKind::Png));
        assert_eq!(SourceKind::from_mime("image/gif"), None);
    }
}
