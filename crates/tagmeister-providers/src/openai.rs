use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tagmeister_core::{CaptionError, CloudCredential, ProviderKind, Result};
use tracing::instrument;

use crate::encoder::ImageEncoder;
use crate::openai_compat::ChatCompletions;
use crate::{CaptionProvider, CaptionRequest, CaptionStream};

pub struct OpenAiProvider {
    api_key: Option<String>,
    encoder: Arc<dyn ImageEncoder>,
    chat: ChatCompletions,
}

impl OpenAiProvider {
    pub fn new(credential: &CloudCredential, http: Client, encoder: Arc<dyn ImageEncoder>) -> Self {
        let api_key = credential.api_key.clone();
        Self {
            chat: ChatCompletions::new(http, &credential.base_url, api_key.clone().unwrap_or_default()),
            api_key,
            encoder,
        }
    }
}

#[async_trait]
impl CaptionProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn ensure_configured(&self) -> Result<()> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(CaptionError::Configuration(
                "OpenAI API key is required for OpenAI models".to_string(),
            )),
        }
    }

    #[instrument(skip(self, request), fields(model = %request.model, image = %request.image_path.display()))]
    async fn caption(&self, request: &CaptionRequest) -> Result<String> {
        self.ensure_configured()?;
        let image = self.encoder.read_base64_with_type(&request.image_path).await?;
        self.chat.complete(request, &image).await
    }

    #[instrument(skip(self, request), fields(model = %request.model, image = %request.image_path.display()))]
    async fn caption_stream(&self, request: &CaptionRequest) -> Result<CaptionStream> {
        self.ensure_configured()?;
        let image = self.encoder.read_base64_with_type(&request.image_path).await?;
        self.chat.stream(request, &image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{request, StubEncoder};
    use futures::StreamExt;
    use mockito::Matcher;
    use serde_json::json;
    use tagmeister_core::PromptStyle;

    fn provider(server: &mockito::Server, key: Option<&str>) -> OpenAiProvider {
        let credential = CloudCredential::new(key.map(str::to_string), server.url());
        OpenAiProvider::new(&credential, Client::new(), Arc::new(StubEncoder::jpeg()))
    }

    #[tokio::test]
    async fn missing_key_fails_before_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/chat/completions").expect(0).create_async().await;

        let err = provider(&server, None).caption(&request("gpt-4o-mini")).await.unwrap_err();
        assert!(matches!(err, CaptionError::Configuration(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_streaming_caption() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o",
                "max_tokens": 300,
                "stream": false
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"A red fox."}}]}"#)
            .create_async()
            .await;

        let text = provider(&server, Some("sk-test")).caption(&request("gpt-4o")).await.unwrap();
        assert_eq!(text, "A red fox.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn streaming_caption() {
        let mut server = mockito::Server::new_async().await;
        let body = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"A red\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\" fox.\"}}]}\n\n\
data: [DONE]\n\n";
        server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let stream = provider(&server, Some("sk-test"))
            .caption_stream(&request("gpt-4o-mini"))
            .await
            .unwrap();
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec!["A red", " fox."]);
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        let mut server = mockito::Server::new_async().await;
        let openai = provider(&server, Some("sk-bad"));

        let cases: [(usize, &str); 4] = [
            (401, r#"{"error":{"message":"Incorrect API key"}}"#),
            (429, r#"{"error":{"message":"Rate limit"}}"#),
            (400, r#"{"error":{"message":"Invalid image"}}"#),
            (500, "upstream exploded"),
        ];
        for (status, body) in cases {
            let mock = server
                .mock("POST", "/chat/completions")
                .with_status(status)
                .with_body(body)
                .create_async()
                .await;
            let err = openai.caption(&request("gpt-4o")).await.unwrap_err();
            match status {
                401 => assert!(matches!(err, CaptionError::Authentication(_))),
                429 => assert!(matches!(err, CaptionError::RateLimit(_))),
                400 => assert!(matches!(&err, CaptionError::BadRequest(m) if m == "Invalid image")),
                _ => assert!(matches!(err, CaptionError::Provider { status: Some(500), .. })),
            }
            mock.remove_async().await;
        }
    }

    #[tokio::test]
    async fn empty_choices_is_a_format_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = provider(&server, Some("sk-test"))
            .caption(&CaptionRequest::new("x.jpg", "gpt-4o", PromptStyle::NaturalLanguage))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptionError::ResponseFormat(_)));
    }
}
