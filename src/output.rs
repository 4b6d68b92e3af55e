//! Output surfaces: file saves, results view and exports

use crate::capture::{CapturedImage, ImageFormat};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use image::codecs::jpeg::JpegEncoder;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Default JPEG export quality
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// `screenshot-<ISO 8601 timestamp with ':' and '.' as '-'>.<ext>`
pub fn screenshot_filename(at: DateTime<Utc>, format: ImageFormat) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("screenshot-{}.{}", stamp, format.extension())
}

/// Where finished images go
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Save an encoded image under `filename`, returning where it landed
    async fn save(&self, image: &CapturedImage, filename: &str) -> Result<PathBuf>;

    /// Hand a full-page result to the results view
    async fn present(&self, image: &CapturedImage) -> Result<()>;
}

/// Renders an image into a single-page PDF
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// PDF bytes with one page sized to the image
    async fn render_pdf(&self, image: &CapturedImage) -> Result<Vec<u8>>;
}

/// Saves into a directory on disk
#[derive(Debug, Clone)]
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    /// Save into `dir`, creating it on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl OutputSink for DownloadDir {
    #[instrument(skip(self, image), fields(bytes = image.size()))]
    async fn save(&self, image: &CapturedImage, filename: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(filename);
        tokio::fs::write(&path, &image.data).await?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    async fn present(&self, image: &CapturedImage) -> Result<()> {
        debug!(
            width = image.width,
            height = image.height,
            "No results view attached; skipping presentation"
        );
        Ok(())
    }
}

/// Re-encodes captures into export formats
pub struct ImageExporter<'a> {
    jpeg_quality: u8,
    pdf: Option<&'a dyn PdfRenderer>,
}

impl<'a> Default for ImageExporter<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ImageExporter<'a> {
    /// PNG/JPEG exporter with the default JPEG quality
    pub fn new() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            pdf: None,
        }
    }

    /// JPEG quality, 1-100
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Enable PDF export through `renderer`
    pub fn with_pdf(mut self, renderer: &'a dyn PdfRenderer) -> Self {
        self.pdf = Some(renderer);
        self
    }

    /// Encode `image` as `format`
    #[instrument(skip(self, image), fields(source = ?image.format))]
    pub async fn export(&self, image: &CapturedImage, format: ImageFormat) -> Result<CapturedImage> {
        if image.format == format {
            return Ok(image.clone());
        }

        let data = match format {
            ImageFormat::Png => CapturedImage::from_raster(&image.decode()?)?.data,
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = image.decode()?.to_rgb8();
                let mut data = Vec::new();
                JpegEncoder::new_with_quality(&mut data, self.jpeg_quality).encode_image(&rgb)?;
                data
            }
            ImageFormat::Pdf => {
                let renderer = self.pdf.ok_or_else(|| {
                    crate::error::Error::generic("PDF export needs a rendering backend")
                })?;
                renderer.render_pdf(image).await?
            }
        };

        debug!(?format, bytes = data.len(), "Exported image");
        Ok(CapturedImage {
            data,
            format,
            width: image.width,
            height: image.height,
        })
    }
}
