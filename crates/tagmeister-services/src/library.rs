use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tagmeister_core::library::is_image_path;
use tagmeister_core::{ImageFile, Result};
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
}

/// Directories first, then case-insensitive name.
fn listing_order(a: &DirEntryInfo, b: &DirEntryInfo) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

#[instrument]
pub async fn list_directory(dir: &Path) -> Result<Vec<DirEntryInfo>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = reader.next_entry().await? {
        let metadata = entry.metadata().await?;
        entries.push(DirEntryInfo {
            name: entry.file_name().to_string_lossy().to_string(),
            path: entry.path(),
            is_dir: metadata.is_dir(),
            size: metadata.len(),
        });
    }

    entries.sort_by(listing_order);
    debug!(count = entries.len(), "Directory listed");
    Ok(entries)
}

/// Images in `dir`, in listing order.
pub async fn scan_images(dir: &Path) -> Result<Vec<ImageFile>> {
    let images = list_directory(dir)
        .await?
        .into_iter()
        .filter(|e| !e.is_dir && is_image_path(&e.path))
        .map(|e| ImageFile::new(e.path))
        .collect();
    Ok(images)
}
