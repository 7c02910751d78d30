use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tagmeister_core::{CaptionError, CloudCredential, ProviderKind, Result};
use tracing::{debug, instrument};

use crate::encoder::ImageEncoder;
use crate::http::{ensure_success, read_json, transport_error};
use crate::{CaptionProvider, CaptionRequest};

pub const DEFAULT_API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<Block<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

/// Claude messages API. Streaming falls back to one full-text fragment.
pub struct AnthropicProvider {
    http: Client,
    api_key: Option<String>,
    endpoint: String,
    version: String,
    encoder: Arc<dyn ImageEncoder>,
}

impl AnthropicProvider {
    pub fn new(
        credential: &CloudCredential,
        version: &str,
        http: Client,
        encoder: Arc<dyn ImageEncoder>,
    ) -> Self {
        let version = match version.trim() {
            "" => DEFAULT_API_VERSION,
            v => v,
        };
        Self {
            http,
            api_key: credential.api_key.clone(),
            endpoint: format!("{}/messages", credential.base_url.trim_end_matches('/')),
            version: version.to_string(),
            encoder,
        }
    }
}

#[async_trait]
impl CaptionProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn ensure_configured(&self) -> Result<()> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(CaptionError::Configuration(
                "Anthropic API key is required for Claude models".to_string(),
            )),
        }
    }

    #[instrument(skip(self, request), fields(model = %request.model, image = %request.image_path.display()))]
    async fn caption(&self, request: &CaptionRequest) -> Result<String> {
        self.ensure_configured()?;
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let image = self.encoder.read_base64_with_type(&request.image_path).await?;

        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            messages: vec![Message {
                role: "user",
                content: vec![
                    Block::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: &image.media_type,
                            data: &image.base64,
                        },
                    },
                    Block::Text {
                        text: request.prompt(),
                    },
                ],
            }],
            stream: false,
        };

        debug!(endpoint = %self.endpoint, "Sending messages request");
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.version)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let parsed: MessagesResponse = read_json(ensure_success(response).await?).await?;

        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| {
                CaptionError::ResponseFormat("No text content found in Claude response".to_string())
            })
    }
}
