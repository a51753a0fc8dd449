// HTTP transport primitive
// Performs one request and returns a normalized outcome: decoded body on
// success, status plus extracted message on failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

use crate::error::ApiError;

/// Everything needed to issue (and later replay) one API call
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach an extra header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// One network exchange. The gateway passes the access token explicitly;
/// replays after a refresh carry the new token rather than re-reading the
/// store.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &RequestDescriptor,
        access_token: Option<&str>,
    ) -> Result<Value, ApiError>;
}

/// Production transport over a pooled reqwest client
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, connect_timeout: u64, request_timeout: u64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        access_token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let url = self.url_for(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, url = %url, "Sending HTTP request");
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            if text.is_empty() {
                return Ok(Value::Null);
            }
            // Some endpoints answer with plain text; surface it as a JSON string
            Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        } else {
            let text = response.text().await.unwrap_or_default();
            let message = extract_error_message(&text);
            tracing::warn!(
                status = status.as_u16(),
                message = %message,
                url = %url,
                "Received error response"
            );
            Err(ApiError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Best-effort extraction of a human-readable message from an error body.
/// The backend nests it inconsistently: tries the raw string body, then the
/// `error` field, then `message`, else empty.
pub fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("error")
            .and_then(Value::as_str)
            .or_else(|| map.get("message").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        Ok(Value::String(s)) => s,
        Ok(_) => String::new(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_extract_message_from_error_field() {
        assert_eq!(
            extract_error_message(r#"{"error":"token revoked"}"#),
            "token revoked"
        );
    }

    #[test]
    fn test_extract_message_from_message_field() {
        assert_eq!(
            extract_error_message(r#"{"message":"account banned"}"#),
            "account banned"
        );
    }

    #[test]
    fn test_extract_message_prefers_error_over_message() {
        assert_eq!(
            extract_error_message(r#"{"error":"first","message":"second"}"#),
            "first"
        );
    }

    #[test]
    fn test_extract_message_skips_non_string_error() {
        assert_eq!(
            extract_error_message(r#"{"error":{"code":1},"message":"fallback"}"#),
            "fallback"
        );
    }

    #[test]
    fn test_extract_message_from_json_string_body() {
        assert_eq!(extract_error_message(r#""plain json string""#), "plain json string");
    }

    #[test]
    fn test_extract_message_from_raw_text_body() {
        assert_eq!(extract_error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(extract_error_message("  spaced  "), "spaced");
    }

    #[test]
    fn test_extract_message_empty_cases() {
        assert_eq!(extract_error_message(""), "");
        assert_eq!(extract_error_message("{}"), "");
        assert_eq!(extract_error_message("[1,2,3]"), "");
        assert_eq!(extract_error_message("42"), "");
    }

    proptest! {
        #[test]
        fn test_extract_message_never_panics(body in ".*") {
            let _ = extract_error_message(&body);
        }
    }

    #[test]
    fn test_url_join() {
        let transport = HttpTransport::new("http://localhost:3000/api/", 5, 30).unwrap();
        assert_eq!(transport.url_for("/posts"), "http://localhost:3000/api/posts");
        assert_eq!(transport.url_for("posts"), "http://localhost:3000/api/posts");
    }

    #[tokio::test]
    async fn test_send_attaches_bearer_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/posts")
            .match_header("authorization", "Bearer access-123")
            .with_status(200)
            .with_body(r#"{"items":[]}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(&server.url(), 5, 30).unwrap();
        let value = transport
            .send(&RequestDescriptor::get("/posts"), Some("access-123"))
            .await
            .unwrap();

        assert_eq!(value, json!({"items": []}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_without_token_has_no_auth_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/posts")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let transport = HttpTransport::new(&server.url(), 5, 30).unwrap();
        let value = transport
            .send(&RequestDescriptor::get("/posts"), None)
            .await
            .unwrap();

        assert_eq!(value, json!([]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_normalizes_error_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/posts/99")
            .with_status(404)
            .with_body(r#"{"message":"post not found"}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(&server.url(), 5, 30).unwrap();
        let err = transport
            .send(&RequestDescriptor::get("/posts/99"), None)
            .await
            .unwrap_err();

        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "post not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_posts_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/refresh")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({"refresh_token": "r-1"})))
            .with_status(200)
            .with_body(r#"{"access_token":"a-2","refresh_token":"r-2"}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(&server.url(), 5, 30).unwrap();
        let value = transport
            .send(
                &RequestDescriptor::post("/auth/refresh")
                    .with_json(json!({"refresh_token": "r-1"})),
                None,
            )
            .await
            .unwrap();

        assert_eq!(value["access_token"], "a-2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_empty_success_body_is_null() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/posts/7")
            .with_status(204)
            .create_async()
            .await;

        let transport = HttpTransport::new(&server.url(), 5, 30).unwrap();
        let value = transport
            .send(&RequestDescriptor::delete("/posts/7"), Some("tok"))
            .await
            .unwrap();

        assert_eq!(value, Value::Null);
    }
}
