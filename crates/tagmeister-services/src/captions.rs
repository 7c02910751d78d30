use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tagmeister_core::{sidecar_path, CaptionStore, ImageFile, Result};
use tracing::{debug, info, warn};

/// Where finished captions are written.
#[async_trait]
pub trait CaptionSink: Send + Sync {
    /// Returns the number of captions written.
    async fn save_captions(&self, captions: &HashMap<PathBuf, String>) -> Result<usize>;
}

/// Writes `<stem>.txt` next to each image.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarWriter;

#[async_trait]
impl CaptionSink for SidecarWriter {
    async fn save_captions(&self, captions: &HashMap<PathBuf, String>) -> Result<usize> {
        let mut written = 0;
        for (image, caption) in captions {
            if !tokio::fs::try_exists(image).await.unwrap_or(false) {
                debug!(image = %image.display(), "Image gone, caption not written");
                continue;
            }
            let target = sidecar_path(image);
            tokio::fs::write(&target, caption).await?;
            debug!(path = %target.display(), "Caption written");
            written += 1;
        }
        Ok(written)
    }
}

/// Persist one caption edited by hand.
pub async fn save_caption(sink: &dyn CaptionSink, image: &Path, caption: &str) -> Result<usize> {
    let mut one = HashMap::with_capacity(1);
    one.insert(image.to_path_buf(), caption.to_string());
    sink.save_captions(&one).await
}

/// Read existing sidecar captions for `images`. A sidecar that is missing or
/// unreadable leaves that image without a caption.
pub async fn load_captions(images: &[ImageFile]) -> Result<CaptionStore> {
    let mut store = CaptionStore::new();
    for image in images {
        let sidecar = sidecar_path(&image.path);
        match tokio::fs::read_to_string(&sidecar).await {
            Ok(text) => store.set(image.path.clone(), text.trim()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %sidecar.display(), error = %e, "Skipping unreadable caption"),
        }
    }
    info!(loaded = store.len(), images = images.len(), "Loaded existing captions");
    Ok(store)
}
