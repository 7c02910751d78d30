use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tagmeister_core::{CaptionError, LocalModel, LocalServer, ProviderKind, Result};
use tracing::{debug, info, instrument};

use crate::encoder::ImageEncoder;
use crate::http::{ensure_success, read_json, transport_error};
use crate::openai_compat::ChatCompletions;
use crate::{CaptionProvider, CaptionRequest, CaptionStream, ModelDiscovery};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// LM Studio ignores the token but its OpenAI shim requires the header.
const LMSTUDIO_TOKEN: &str = "lm-studio";

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    name: Option<String>,
}

pub struct LmStudioProvider {
    http: Client,
    base_url: String,
    encoder: Arc<dyn ImageEncoder>,
    chat: ChatCompletions,
}

impl LmStudioProvider {
    pub fn new(server: &LocalServer, http: Client, encoder: Arc<dyn ImageEncoder>) -> Self {
        let base_url = server.base_url.trim().trim_end_matches('/').to_string();
        Self {
            chat: ChatCompletions::new(http.clone(), &base_url, LMSTUDIO_TOKEN),
            http,
            base_url,
            encoder,
        }
    }
}

#[async_trait]
impl CaptionProvider for LmStudioProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LmStudio
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(CaptionError::Configuration(
                "LM Studio base URL is not set".to_string(),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn caption(&self, request: &CaptionRequest) -> Result<String> {
        self.ensure_configured()?;
        let image = self.encoder.read_base64_with_type(&request.image_path).await?;
        self.chat.complete(request, &image).await
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn caption_stream(&self, request: &CaptionRequest) -> Result<CaptionStream> {
        self.ensure_configured()?;
        let image = self.encoder.read_base64_with_type(&request.image_path).await?;
        self.chat.stream(request, &image).await
    }
}

#[async_trait]
impl ModelDiscovery for LmStudioProvider {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn list_models(&self) -> Result<Vec<LocalModel>> {
        self.ensure_configured()?;
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;
        let listing: ModelsResponse = read_json(ensure_success(response).await?).await?;

        let models: Vec<LocalModel> = listing
            .data
            .into_iter()
            .map(|m| LocalModel {
                name: m.name.unwrap_or_else(|| m.id.clone()),
                id: m.id,
            })
            .collect();
        info!(count = models.len(), "LM Studio models discovered");
        debug!(?models);
        Ok(models)
    }
}
