use thiserror::Error;

use crate::ProviderKind;

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API authentication failed: 401 {0}")]
    Authentication(String),

    #[error("API rate limit exceeded: 429 {0}")]
    RateLimit(String),

    #[error("API bad request: 400 {0}")]
    BadRequest(String),

    #[error("Unexpected response format: {0}")]
    ResponseFormat(String),

    #[error("{}", provider_error_text(.status, .body))]
    Provider { status: Option<u16>, body: String },

    #[error("Please select at least one image")]
    NoSelection,

    #[error("Image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn provider_error_text(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("API request failed: {} {}", code, body),
        None => format!("Request failed: {}", body),
    }
}

impl CaptionError {
    pub fn transport(message: impl ToString) -> Self {
        CaptionError::Provider {
            status: None,
            body: message.to_string(),
        }
    }

    /// Single user-facing message for a failed batch.
    pub fn user_message(&self, provider: ProviderKind) -> String {
        let name = provider.display_name();
        match self {
            CaptionError::RateLimit(_) => {
                format!("{} API rate limit exceeded. Please try again later.", name)
            }
            CaptionError::Authentication(_) => {
                format!("Invalid API key. Please check your {} API key.", name)
            }
            CaptionError::BadRequest(detail) if !detail.trim().is_empty() => {
                format!("Bad request: {}", detail.trim())
            }
            CaptionError::BadRequest(_) => {
                format!("Bad request to {} API. Please try again.", name)
            }
            other => format!("Error: {}", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_names_provider() {
        let err = CaptionError::RateLimit("slow down".into());
        assert_eq!(
            err.user_message(ProviderKind::Anthropic),
            "Anthropic API rate limit exceeded. Please try again later."
        );
    }

    #[test]
    fn auth_failure_names_provider() {
        let err = CaptionError::Authentication("{}".into());
        assert_eq!(
            err.user_message(ProviderKind::OpenAi),
            "Invalid API key. Please check your OpenAI API key."
        );
    }

    #[test]
    fn bad_request_passes_detail_through() {
        let err = CaptionError::BadRequest("image too large".into());
        assert_eq!(err.user_message(ProviderKind::OpenAi), "Bad request: image too large");

        let bare = CaptionError::BadRequest(String::new());
        assert_eq!(
            bare.user_message(ProviderKind::Anthropic),
            "Bad request to Anthropic API. Please try again."
        );
    }

    #[test]
    fn other_errors_are_generic() {
        let err = CaptionError::Provider {
            status: Some(500),
            body: "boom".into(),
        };
        assert_eq!(
            err.user_message(ProviderKind::Ollama),
            "Error: API request failed: 500 boom"
        );
    }
}
