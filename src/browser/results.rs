//! Results view
//!
//! Full-page captures are shown in a browser tab of their own, with a link
//! to download the image. The same tab renders PDF exports: the image is
//! laid out on a single page sized to it and printed.

use crate::browser::PageHandle;
use crate::capture::{CapturedImage, ImageFormat};
use crate::error::{CaptureError, Error, Result};
use crate::output::{screenshot_filename, DownloadDir, OutputSink, PdfRenderer};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// CSS pixels per inch, for PDF paper sizes
const CSS_PX_PER_INCH: f64 = 96.0;

/// Results tab backed by a browser page; saves go to a download directory
pub struct CdpResultsView {
    page: PageHandle,
    downloads: DownloadDir,
}

impl CdpResultsView {
    /// Show results in `page`, saving into `downloads`
    pub fn new(page: PageHandle, downloads: DownloadDir) -> Self {
        Self { page, downloads }
    }

    /// The results tab
    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    async fn show(&self, html: &str) -> Result<()> {
        self.page
            .inner()
            .set_content(html)
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;
        Ok(())
    }
}

/// Page showing `image` with a download link
pub fn results_html(image: &CapturedImage, filename: &str) -> String {
    let src = image.to_data_url();
    format!(
        concat!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Screenshot</title>",
            "<style>body{{margin:0;background:#f1f3f4;font:14px sans-serif}}",
            "header{{position:sticky;top:0;padding:8px 16px;background:#202124;color:#fff}}",
            "header a{{color:#8ab4f8;margin-left:16px}}",
            "img{{display:block;margin:16px auto;max-width:calc(100% - 32px);box-shadow:0 2px 8px rgba(0,0,0,.3)}}",
            "</style></head><body>",
            "<header>{width} &times; {height}<a download=\"{filename}\" href=\"{src}\">Download</a></header>",
            "<img src=\"{src}\" alt=\"Screenshot\"></body></html>"
        ),
        width = image.width,
        height = image.height,
        filename = filename,
        src = src,
    )
}

/// Single page exactly the size of `image`
pub fn print_html(image: &CapturedImage) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head><style>",
            "@page{{size:{w}px {h}px;margin:0}}html,body{{margin:0;padding:0}}",
            "img{{display:block;width:{w}px;height:{h}px}}",
            "</style></head><body><img src=\"{src}\"></body></html>"
        ),
        w = image.width,
        h = image.height,
        src = image.to_data_url(),
    )
}

#[async_trait]
impl OutputSink for CdpResultsView {
    async fn save(&self, image: &CapturedImage, filename: &str) -> Result<PathBuf> {
        self.downloads.save(image, filename).await
    }

    #[instrument(skip(self, image), fields(width = image.width, height = image.height))]
    async fn present(&self, image: &CapturedImage) -> Result<()> {
        let filename = screenshot_filename(Utc::now(), image.format);
        self.show(&results_html(image, &filename)).await?;
        info!("Results view opened");
        Ok(())
    }
}

#[async_trait]
impl PdfRenderer for CdpResultsView {
    #[instrument(skip(self, image), fields(width = image.width, height = image.height))]
    async fn render_pdf(&self, image: &CapturedImage) -> Result<Vec<u8>> {
        if image.format == ImageFormat::Pdf {
            return Ok(image.data.clone());
        }

        self.show(&print_html(image)).await?;

        // One page sized to the image, no margins
        let params = PrintToPdfParams::builder()
            .print_background(true)
            .prefer_css_page_size(true)
            .paper_width(image.width as f64 / CSS_PX_PER_INCH)
            .paper_height(image.height as f64 / CSS_PX_PER_INCH)
            .margin_top(0.0)
            .margin_bottom(0.0)
            .margin_left(0.0)
            .margin_right(0.0)
            .build();

        let data = self
            .page
            .inner()
            .pdf(params)
            .await
            .map_err(|e| CaptureError::ExportFailed(e.to_string()))?;

        debug!("PDF generated: {} bytes", data.len());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn sample() -> CapturedImage {
        let raster = RgbaImage::from_pixel(30, 20, Rgba([0, 0, 255, 255]));
        CapturedImage::from_raster(&DynamicImage::ImageRgba8(raster)).unwrap()
    }

    #[test]
    fn test_results_html_links_download() {
        let html = results_html(&sample(), "screenshot-x.png");
        assert!(html.contains("download=\"screenshot-x.png\""));
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("30 &times; 20"));
    }

    #[test]
    fn test_print_html_sizes_page_to_image() {
        let html = print_html(&sample());
        assert!(html.contains("@page{size:30px 20px;margin:0}"));
        assert!(html.contains("width:30px;height:20px"));
    }
}
