use std::path::Path;

use async_trait::async_trait;
use tagmeister_core::{PromptStyle, Result};

use crate::encoder::{EncodedImage, ImageEncoder};
use crate::CaptionRequest;

/// Encoder that never touches the disk; "QUJD" is base64 for "ABC".
pub struct StubEncoder {
    media_type: &'static str,
}

impl StubEncoder {
    pub fn jpeg() -> Self {
        Self { media_type: "image/jpeg" }
    }

    pub fn png() -> Self {
        Self { media_type: "image/png" }
    }
}

#[async_trait]
impl ImageEncoder for StubEncoder {
    async fn read_base64_with_type(&self, _path: &Path) -> Result<EncodedImage> {
        Ok(EncodedImage {
            base64: "QUJD".to_string(),
            media_type: self.media_type.to_string(),
        })
    }
}

pub fn request(model: &str) -> CaptionRequest {
    CaptionRequest::new("/photos/fox.jpg", model, PromptStyle::NaturalLanguage)
}
