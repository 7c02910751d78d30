use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tagmeister_core::{CaptionError, Result};
use tracing::warn;

/// Pass a 2xx response through; classify anything else.
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Provider returned an error status");
    Err(classify_status(status.as_u16(), body))
}

pub fn classify_status(status: u16, body: String) -> CaptionError {
    match status {
        401 => CaptionError::Authentication(body),
        429 => CaptionError::RateLimit(body),
        400 => CaptionError::BadRequest(server_message(&body)),
        code => CaptionError::Provider {
            status: Some(code),
            body,
        },
    }
}

/// Best-effort human message out of an error body.
pub fn server_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

pub(crate) fn transport_error(e: reqwest::Error) -> CaptionError {
    match e.status() {
        Some(status) => CaptionError::Provider {
            status: Some(status.as_u16()),
            body: e.to_string(),
        },
        None => CaptionError::transport(e),
    }
}

/// Read and decode a JSON body; a body that does not match `T` is a format error.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&text).map_err(|e| CaptionError::ResponseFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert!(matches!(
            classify_status(401, "nope".into()),
            CaptionError::Authentication(_)
        ));
        assert!(matches!(
            classify_status(429, String::new()),
            CaptionError::RateLimit(_)
        ));
        assert!(matches!(
            classify_status(503, "busy".into()),
            CaptionError::Provider { status: Some(503), .. }
        ));
    }

    #[test]
    fn bad_request_keeps_server_message() {
        let body = r#"{"error":{"message":"image too large","type":"invalid_request_error"}}"#;
        match classify_status(400, body.into()) {
            CaptionError::BadRequest(msg) => assert_eq!(msg, "image too large"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn server_message_shapes() {
        assert_eq!(server_message(r#"{"error":"model not found"}"#), "model not found");
        assert_eq!(server_message(r#"{"message":"bad"}"#), "bad");
        assert_eq!(server_message("  plain text \n"), "plain text");
        assert_eq!(server_message(r#"{"other":1}"#), r#"{"other":1}"#);
    }
}
