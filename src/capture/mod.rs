//! Capture pipeline
//!
//! This module holds the viewport capture seam and the full-page pipeline
//! built on top of it: render-hazard suppression, the scroll sweep and the
//! compositor that stitches the sweep's slices into one image.

pub mod compositor;
pub mod render_prep;
pub mod sequencer;

pub use compositor::Compositor;
pub use render_prep::{
    DocumentOverflow, ElementRef, ElementRestore, InlineStyle, PageDom, PositionedElement,
    RenderPrep, RestoreOutcome, RestoreRecord,
};
pub use sequencer::{plan_offsets, FullPageCapture, ScrollSequencer, SweepTiming};

use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, ImageFormat as RasterFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Rasterizes whatever is currently rendered in the visible viewport.
///
/// One request, one response: no cropping, no scaling, no retries. Callers
/// pace repeated calls themselves.
#[async_trait]
pub trait ViewportCapturer: Send + Sync {
    /// Capture the visible viewport as PNG bytes
    async fn capture_visible(&self) -> Result<Vec<u8>>;
}

/// Encodings an image can be exported as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG image
    #[default]
    Png,
    /// JPEG image
    Jpeg,
    /// Single-page PDF document sized to the image
    Pdf,
}

impl ImageFormat {
    /// MIME type for this format
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Pdf => "application/pdf",
        }
    }

    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Pdf => "pdf",
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "pdf" => Ok(ImageFormat::Pdf),
            other => Err(Error::generic(format!("Unsupported export format: {other}"))),
        }
    }
}

/// Page geometry snapshot taken once before a sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDimensions {
    /// Visible viewport width in CSS pixels
    pub viewport_width: u32,
    /// Visible viewport height in CSS pixels
    pub viewport_height: u32,
    /// Full document width in CSS pixels
    pub total_width: u32,
    /// Full document height in CSS pixels
    pub total_height: u32,
    /// Image pixels per CSS pixel
    #[serde(default = "default_pixel_ratio")]
    pub device_pixel_ratio: f64,
}

fn default_pixel_ratio() -> f64 {
    1.0
}

impl PageDimensions {
    /// Dimensions at a device pixel ratio of 1
    pub fn new(viewport_width: u32, viewport_height: u32, total_width: u32, total_height: u32) -> Self {
        Self {
            viewport_width,
            viewport_height,
            total_width,
            total_height,
            device_pixel_ratio: 1.0,
        }
    }

    /// Number of viewport-height steps needed to cover the document
    pub fn step_count(&self) -> usize {
        if self.viewport_height == 0 {
            return 0;
        }
        (self.total_height.div_ceil(self.viewport_height) as usize).max(1)
    }
}

/// One viewport capture taken at a specific scroll offset during a sweep
#[derive(Debug, Clone)]
pub struct CaptureSlice {
    /// Encoded viewport image
    pub image: Vec<u8>,
    /// Scroll offset in CSS pixels the image was captured at
    pub vertical_offset: u32,
}

/// An encoded image produced by the pipeline
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// The encoded data
    pub data: Vec<u8>,
    /// The encoding of `data`
    pub format: ImageFormat,
    /// Width in image pixels
    pub width: u32,
    /// Height in image pixels
    pub height: u32,
}

impl CapturedImage {
    /// Encode a raster as PNG
    pub fn from_raster(raster: &DynamicImage) -> Result<Self> {
        let mut data = Vec::new();
        raster.write_to(&mut Cursor::new(&mut data), RasterFormat::Png)?;
        Ok(Self {
            data,
            format: ImageFormat::Png,
            width: raster.width(),
            height: raster.height(),
        })
    }

    /// Wrap already encoded PNG bytes, reading their dimensions
    pub fn from_png(data: Vec<u8>) -> Result<Self> {
        let (width, height) =
            image::ImageReader::with_format(Cursor::new(&data), RasterFormat::Png)
                .into_dimensions()?;
        Ok(Self {
            data,
            format: ImageFormat::Png,
            width,
            height,
        })
    }

    /// Decode into a raster
    pub fn decode(&self) -> Result<DynamicImage> {
        Ok(image::load_from_memory(&self.data)?)
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get data as base64
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// Get data as a `data:` URL
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), self.to_base64())
    }
}
