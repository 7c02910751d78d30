use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, ImageReader};
use tagmeister_core::{media_type_for, CaptionError, Result};
use tracing::{debug, instrument};

pub const MIN_DIMENSION: u32 = 200;
pub const MAX_DIMENSION: u32 = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub base64: String,
    pub media_type: String,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }
}

#[async_trait]
pub trait ImageEncoder: Send + Sync {
    async fn read_base64_with_type(&self, path: &Path) -> Result<EncodedImage>;

    async fn read_base64(&self, path: &Path) -> Result<String> {
        Ok(self.read_base64_with_type(path).await?.base64)
    }
}

/// Reads images from disk and rejects ones the hosted APIs refuse to process.
#[derive(Debug, Clone)]
pub struct FsImageEncoder {
    validate_dimensions: bool,
}

impl Default for FsImageEncoder {
    fn default() -> Self {
        Self {
            validate_dimensions: true,
        }
    }
}

impl FsImageEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_validation() -> Self {
        Self {
            validate_dimensions: false,
        }
    }
}

#[async_trait]
impl ImageEncoder for FsImageEncoder {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_base64_with_type(&self, path: &Path) -> Result<EncodedImage> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            CaptionError::Image(format!("Failed to read image file {}: {}", path.display(), e))
        })?;

        let detected = if self.validate_dimensions {
            let (format, width, height) = inspect(&bytes)?;
            check_dimensions(width, height)?;
            debug!(width, height, ?format, "Image dimensions ok");
            format
        } else {
            image::guess_format(&bytes).ok()
        };

        let media_type = detected
            .and_then(mime_for_format)
            .unwrap_or_else(|| media_type_for(path));

        Ok(EncodedImage {
            base64: BASE64.encode(&bytes),
            media_type: media_type.to_string(),
        })
    }
}

/// Media type for a sniffed format the hosted APIs accept.
fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

fn inspect(bytes: &[u8]) -> Result<(Option<ImageFormat>, u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CaptionError::Image(e.to_string()))?;
    let format = reader.format();
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CaptionError::Image(format!("Unreadable image: {}", e)))?;
    Ok((format, width, height))
}

pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CaptionError::Image(format!(
            "Image dimensions {}x{} exceed maximum allowed ({}x{})",
            width, height, MAX_DIMENSION, MAX_DIMENSION
        )));
    }
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(CaptionError::Image(format!(
            "Image dimensions {}x{} are below minimum required ({}x{})",
            width, height, MIN_DIMENSION, MIN_DIMENSION
        )));
    }
    Ok(())
}
