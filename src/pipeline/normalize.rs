//! Image normalisation: bound resolution and re-encode as JPEG.
//!
//! The vision API charges and times out by payload size, so every image is
//! squeezed through a fixed envelope before upload: at most 1800×2400 px,
//! aspect preserved, never upscaled, JPEG quality 80. The transform is
//! deterministic — the same input and settings always produce the same bytes.
//!
//! JPEG cannot carry an alpha channel, so RGBA sources (rasterised PDF pages
//! come out of pdfium as RGBA) are flattened to RGB before encoding.

use crate::error::StageError;
use crate::pipeline::ImageNormalizer;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

/// The production [`ImageNormalizer`]: bounded resize + JPEG re-encode.
#[derive(Debug, Clone, Copy)]
pub struct JpegNormalizer {
    /// Maximum output width in pixels.
    pub max_width: u32,
    /// Maximum output height in pixels.
    pub max_height: u32,
    /// JPEG encoding quality (0–100).
    pub quality: u8,
}

impl Default for JpegNormalizer {
    fn default() -> Self {
        Self {
            max_width: 1800,
            max_height: 2400,
            quality: 80,
        }
    }
}

#[async_trait]
impl ImageNormalizer for JpegNormalizer {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), StageError> {
        let cfg = *self;
        let input_owned = input.to_path_buf();
        let output = output.to_path_buf();

        tokio::task::spawn_blocking(move || normalize_blocking(&cfg, &input_owned, &output))
            .await
            .map_err(|e| StageError::Normalization {
                path: input.to_path_buf(),
                detail: format!("normalise task panicked: {e}"),
            })?
    }
}

/// Blocking implementation of the resize + re-encode.
fn normalize_blocking(cfg: &JpegNormalizer, input: &Path, output: &Path) -> Result<(), StageError> {
    let err = |detail: String| StageError::Normalization {
        path: input.to_path_buf(),
        detail,
    };

    let img = image::open(input).map_err(|e| err(format!("unreadable image: {e}")))?;

    let (w, h) = (img.width(), img.height());
    let img = if w > cfg.max_width || h > cfg.max_height {
        img.resize(cfg.max_width, cfg.max_height, FilterType::Lanczos3)
    } else {
        img
    };

    // Flatten to RGB: JPEG has no alpha, and encoding RGBA is an error.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let file =
        std::fs::File::create(output).map_err(|e| err(format!("cannot create output: {e}")))?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, cfg.quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| err(format!("JPEG encode failed: {e}")))?;

    debug!(
        "Normalised '{}' ({}x{}) → '{}' ({}x{})",
        input.display(),
        w,
        h,
        output.display(),
        rgb.width(),
        rgb.height()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([12, 200, 90, 255])));
        let path = dir.join(name);
        img.save(&path).expect("write fixture png");
        path
    }

    #[tokio::test]
    async fn small_image_is_not_upscaled() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), "small.png", 20, 10);
        let output = dir.path().join("small.jpg");

        JpegNormalizer::default()
            .normalize(&input, &output)
            .await
            .expect("normalise");

        let out = image::open(&output).expect("output decodes");
        assert_eq!((out.width(), out.height()), (20, 10));
    }

    #[tokio::test]
    async fn oversized_image_fits_envelope_preserving_aspect() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_png(dir.path(), "big.png", 3600, 2400);
        let output = dir.path().join("big.jpg");

        JpegNormalizer::default()
            .normalize(&input, &output)
            .await
            .expect("normalise");

        let out = image::open(&output).expect("output decodes");
        assert!(out.width() <= 1800 && out.height() <= 2400);
        // 3:2 aspect survives the resize
        assert_eq!(out.width(), 1800);
        assert_eq!(out.height(), 1200);
    }

    #[tokio::test]
    async fn corrupt_input_is_a_normalization_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("junk.png");
        std::fs::write(&input, b"not an image").unwrap();

        let err = JpegNormalizer::default()
            .normalize(&input, &dir.path().join("out.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Normalization { .. }));
    }
}
