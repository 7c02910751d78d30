//! Image files and the captions attached to them

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extensions picked up when scanning a directory
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

pub fn is_image_path(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Media type used when the encoder is not told otherwise.
pub fn media_type_for(path: &Path) -> &'static str {
    match lowercase_extension(path).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    }
}

/// Caption file sharing the image's base name.
pub fn sidecar_path(image: &Path) -> PathBuf {
    image.with_extension("txt")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageFile {
    pub path: PathBuf,
    pub display_name: String,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self { path, display_name }
    }
}

/// Current caption text per image path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionStore {
    captions: HashMap<PathBuf, String>,
}

impl CaptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.captions.get(path).map(String::as_str)
    }

    pub fn set(&mut self, path: impl Into<PathBuf>, caption: impl Into<String>) {
        self.captions.insert(path.into(), caption.into());
    }

    /// Append a streamed fragment to the in-progress draft for `path`.
    pub fn append_draft(&mut self, path: &Path, fragment: &str) {
        self.captions
            .entry(path.to_path_buf())
            .or_default()
            .push_str(fragment);
    }

    pub fn remove(&mut self, path: &Path) -> Option<String> {
        self.captions.remove(path)
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_from_extension() {
        assert_eq!(media_type_for(Path::new("a/cat.JPG")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("a/cat.jpeg")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("a/cat.png")), "image/png");
        assert_eq!(media_type_for(Path::new("a/cat.webp")), "image/png");
    }

    #[test]
    fn sidecar_replaces_extension() {
        assert_eq!(sidecar_path(Path::new("/d/cat.jpeg")), PathBuf::from("/d/cat.txt"));
        assert_eq!(sidecar_path(Path::new("/d/dog.PNG")), PathBuf::from("/d/dog.txt"));
    }

    #[test]
    fn only_listed_extensions_are_images() {
        assert!(is_image_path(Path::new("x.Png")));
        assert!(!is_image_path(Path::new("x.gif")));
        assert!(!is_image_path(Path::new("README")));
    }

    #[test]
    fn drafts_accumulate() {
        let mut store = CaptionStore::new();
        let path = Path::new("/d/cat.png");
        store.set(path, "");
        store.append_draft(path, "A cat");
        store.append_draft(path, " sleeping");
        assert_eq!(store.get(path), Some("A cat sleeping"));
    }
}
