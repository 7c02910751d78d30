use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tagmeister_core::{CaptionError, LocalModel, LocalServer, ProviderKind, Result};
use tracing::{debug, info, instrument};

use crate::encoder::ImageEncoder;
use crate::http::{ensure_success, read_json, transport_error};
use crate::lmstudio::PROBE_TIMEOUT;
use crate::stream::{decode_body, FieldExtractor, Framing};
use crate::{CaptionProvider, CaptionRequest, CaptionStream, ModelDiscovery};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

fn response_text(value: &Value) -> Option<&str> {
    value.get("response").and_then(Value::as_str)
}

fn is_done(value: &Value) -> bool {
    value.get("done").and_then(Value::as_bool).unwrap_or(false)
}

const GENERATE: FieldExtractor = FieldExtractor {
    text: response_text,
    is_final: is_done,
};

pub struct OllamaProvider {
    http: Client,
    base_url: String,
    encoder: Arc<dyn ImageEncoder>,
}

impl OllamaProvider {
    pub fn new(server: &LocalServer, http: Client, encoder: Arc<dyn ImageEncoder>) -> Self {
        Self {
            http,
            base_url: server.base_url.trim().trim_end_matches('/').to_string(),
            encoder,
        }
    }

    async fn generate(&self, request: &CaptionRequest, stream: bool) -> Result<reqwest::Response> {
        self.ensure_configured()?;
        let image = self.encoder.read_base64(&request.image_path).await?;
        let body = GenerateRequest {
            model: &request.model,
            prompt: request.prompt(),
            stream,
            images: vec![image],
        };

        debug!(model = %request.model, stream, "Sending Ollama generate request");
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await
    }
}

#[async_trait]
impl CaptionProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(CaptionError::Configuration(
                "Ollama host is not set".to_string(),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn caption(&self, request: &CaptionRequest) -> Result<String> {
        let response = self.generate(request, false).await?;
        let parsed: GenerateResponse = read_json(response).await?;
        parsed
            .response
            .ok_or_else(|| CaptionError::ResponseFormat("Missing response field".to_string()))
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn caption_stream(&self, request: &CaptionRequest) -> Result<CaptionStream> {
        let response = self.generate(request, true).await?;
        let body = response.bytes_stream().map(|chunk| chunk.map_err(transport_error));
        Ok(decode_body(body, Framing::NdJson, GENERATE))
    }
}

#[async_trait]
impl ModelDiscovery for OllamaProvider {
    #[instrument(skip(self), fields(host = %self.base_url))]
    async fn list_models(&self) -> Result<Vec<LocalModel>> {
        self.ensure_configured()?;
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;
        let tags: TagsResponse = read_json(ensure_success(response).await?).await?;

        let models: Vec<LocalModel> = tags
            .models
            .into_iter()
            .map(|m| LocalModel {
                id: m.name.clone(),
                name: m.name,
            })
            .collect();
        info!(count = models.len(), "Ollama models discovered");
        Ok(models)
    }
}
