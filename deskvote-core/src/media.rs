use std::io::Cursor;

use deskvote_dependencies::async_trait::async_trait;
use deskvote_dependencies::image::{self, DynamicImage, ImageFormat, ImageOutputFormat};
use deskvote_dependencies::mime::{self, Mime};
use deskvote_dependencies::new_mime_guess;
use deskvote_dependencies::tokio::task::spawn_blocking;

use crate::error::{DeskError, DeskResult};

const JPEG_QUALITY: u8 = 85;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolutionLimit {
    pub height: u32,
    pub width: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub height: u32,
    pub width: u32,
}

impl From<(u32, u32)> for ResolutionLimit {
    fn from(f: (u32, u32)) -> Self {
        Self {
            width: f.1,
            height: f.0,
        }
    }
}

impl ResolutionLimit {
    pub fn new(height: u32, width: u32) -> Self {
        (height, width).into()
    }

    pub fn contains(&self, height: u32, width: u32) -> bool {
        height <= self.height && width <= self.width
    }

    /// Largest resolution within the limit that keeps the aspect ratio.
    /// Images already inside the limit keep their size.
    pub fn clamp_resolution(&self, height: u32, width: u32) -> Resolution {
        if self.contains(height, width) || height == 0 || width == 0 {
            return Resolution { height, width };
        }
        let ratio = (self.height as f64 / height as f64).min(self.width as f64 / width as f64);
        let height = ((height as f64 * ratio).round() as u32).clamp(1, self.height);
        let width = ((width as f64 * ratio).round() as u32).clamp(1, self.width);
        Resolution { height, width }
    }
}

/// Bytes ready to be handed to a blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime: Mime,
    /// Including the leading dot
    pub ext: String,
}

/// Resizes and reformats uploads before they are stored.
#[async_trait]
pub trait ImageTransform: Send + Sync + std::fmt::Debug {
    async fn transform(&self, bytes: Vec<u8>, mime: &Mime) -> DeskResult<PreparedImage>;
}

/// Stores uploads as they came in.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

#[async_trait]
impl ImageTransform for Passthrough {
    async fn transform(&self, bytes: Vec<u8>, mime: &Mime) -> DeskResult<PreparedImage> {
        Ok(PreparedImage {
            bytes,
            mime: mime.clone(),
            ext: extension_for(mime),
        })
    }
}

/// Decodes the upload, scales it into the resolution limit and re-encodes it.
/// PNG stays PNG to keep transparency, everything else becomes JPEG.
#[derive(Debug, Clone, Copy)]
pub struct ResizeTransform {
    limit: ResolutionLimit,
}

impl ResizeTransform {
    pub fn new(limit: ResolutionLimit) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl ImageTransform for ResizeTransform {
    #[instrument(skip(bytes), fields(len = bytes.len()))]
    async fn transform(&self, bytes: Vec<u8>, mime: &Mime) -> DeskResult<PreparedImage> {
        let limit = self.limit;
        spawn_blocking(move || reencode(&bytes, limit)).await?
    }
}

fn reencode(bytes: &[u8], limit: ResolutionLimit) -> DeskResult<PreparedImage> {
    let format = image::guess_format(bytes)
        .map_err(|e| DeskError::Validation(format!("Could not recognize image: {}", e)))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DeskError::Validation(format!("Could not decode image: {}", e)))?;
    let img = if limit.contains(img.height(), img.width()) {
        img
    } else {
        let res = limit.clamp_resolution(img.height(), img.width());
        debug!(
            "Clamping image from {}, {} -> {}, {}",
            img.width(),
            img.height(),
            res.width,
            res.height,
        );
        img.thumbnail_exact(res.width, res.height)
    };
    let mut out = Cursor::new(Vec::new());
    let prepared = if format == ImageFormat::Png {
        img.write_to(&mut out, ImageOutputFormat::Png)?;
        PreparedImage {
            bytes: out.into_inner(),
            mime: mime::IMAGE_PNG,
            ext: ".png".to_string(),
        }
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut out, ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
        PreparedImage {
            bytes: out.into_inner(),
            mime: mime::IMAGE_JPEG,
            ext: ".jpg".to_string(),
        }
    };
    Ok(prepared)
}

/// File extension for an image type, including the leading dot.
pub fn extension_for(mime: &Mime) -> String {
    let ext = match mime.essence_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/x-icon" => "ico",
        "image/tiff" => "tiff",
        other => new_mime_guess::get_mime_extensions_str(other)
            .and_then(|x| x.first().copied())
            .unwrap_or("bin"),
    };
    format!(".{}", ext)
}
