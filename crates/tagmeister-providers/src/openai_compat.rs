//! Chat-completions wire format shared by OpenAI and LM Studio

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tagmeister_core::{CaptionError, Result};
use tracing::debug;

use crate::encoder::EncodedImage;
use crate::http::{ensure_success, read_json, transport_error};
use crate::stream::{decode_body, FieldExtractor, Framing};
use crate::{CaptionRequest, CaptionStream};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn delta_content(value: &Value) -> Option<&str> {
    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
}

fn never_final(_: &Value) -> bool {
    false
}

const DELTA: FieldExtractor = FieldExtractor {
    text: delta_content,
    is_final: never_final,
};

pub(crate) struct ChatCompletions {
    http: Client,
    endpoint: String,
    bearer: String,
}

impl ChatCompletions {
    pub fn new(http: Client, base_url: &str, bearer: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            bearer: bearer.into(),
        }
    }

    fn body<'a>(request: &'a CaptionRequest, image: &EncodedImage, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: request.prompt(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
            max_tokens: request.max_tokens,
            stream,
        }
    }

    async fn send(&self, request: &CaptionRequest, image: &EncodedImage, stream: bool) -> Result<reqwest::Response> {
        debug!(endpoint = %self.endpoint, model = %request.model, stream, "Sending chat completion");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.bearer)
            .json(&Self::body(request, image, stream))
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await
    }

    pub async fn complete(&self, request: &CaptionRequest, image: &EncodedImage) -> Result<String> {
        let response = self.send(request, image, false).await?;
        let parsed: ChatResponse = read_json(response).await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| CaptionError::ResponseFormat("No message content in response".to_string()))
    }

    pub async fn stream(&self, request: &CaptionRequest, image: &EncodedImage) -> Result<CaptionStream> {
        let response = self.send(request, image, true).await?;
        let body = response.bytes_stream().map(|chunk| chunk.map_err(transport_error));
        Ok(decode_body(body, Framing::Sse, DELTA))
    }
}
