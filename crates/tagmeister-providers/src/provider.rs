use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tagmeister_core::{LocalModel, PromptStyle, ProviderKind, Result};

/// Text fragments in arrival order. Dropping the stream closes the response body.
pub type CaptionStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pub const DEFAULT_MAX_TOKENS: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRequest {
    pub image_path: PathBuf,
    /// Model id as the backend expects it (routing prefix already removed)
    pub model: String,
    pub style: PromptStyle,
    pub max_tokens: u32,
}

impl CaptionRequest {
    pub fn new(image_path: impl Into<PathBuf>, model: impl Into<String>, style: PromptStyle) -> Self {
        Self {
            image_path: image_path.into(),
            model: model.into(),
            style,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn prompt(&self) -> &'static str {
        self.style.template()
    }
}

#[async_trait]
pub trait CaptionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Fails with `Configuration` when a credential or endpoint is missing.
    fn ensure_configured(&self) -> Result<()>;

    /// One request, full text back.
    async fn caption(&self, request: &CaptionRequest) -> Result<String>;

    /// One streaming request. Backends without streaming yield their full text once.
    async fn caption_stream(&self, request: &CaptionRequest) -> Result<CaptionStream> {
        let text = self.caption(request).await?;
        let fragments = (!text.is_empty()).then_some(Ok(text));
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}

/// Model listing for servers running on the user's machine
#[async_trait]
pub trait ModelDiscovery: Send + Sync {
    async fn list_models(&self) -> Result<Vec<LocalModel>>;
}

/// Generate one caption. With `on_chunk`, the request streams and every fragment is
/// forwarded before the concatenated text is returned.
pub async fn generate_caption<F>(
    provider: &dyn CaptionProvider,
    request: &CaptionRequest,
    on_chunk: Option<F>,
) -> Result<String>
where
    F: FnMut(&str) + Send,
{
    let Some(mut on_chunk) = on_chunk else {
        return provider.caption(request).await;
    };

    let mut stream = provider.caption_stream(request).await?;
    let mut full = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        on_chunk(&fragment);
        full.push_str(&fragment);
    }
    Ok(full)
}
