use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;

use crate::core::services::{ApiBody, ApiMethod, ApiRequest, ApiTransport, ServiceError};

/// Google REST transport on top of reqwest.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("google-mcp-server/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Value, ServiceError> {
        let url = request_url(&request)?;
        let mut builder = self
            .client
            .request(http_method(request.method), url)
            .bearer_auth(&request.bearer_token);

        builder = match request.body {
            ApiBody::Empty => builder,
            ApiBody::Json(body) => builder.json(&body),
            ApiBody::Multipart {
                metadata,
                media,
                mime_type,
            } => {
                let boundary = boundary();
                builder
                    .header(
                        CONTENT_TYPE,
                        format!("multipart/related; boundary={}", boundary),
                    )
                    .body(multipart_body(&boundary, &metadata, &media, &mime_type))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ServiceError::Http {
                status: status.as_u16(),
                message: error_message(status, &bytes),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

fn http_method(method: ApiMethod) -> Method {
    match method {
        ApiMethod::Get => Method::GET,
        ApiMethod::Post => Method::POST,
        ApiMethod::Put => Method::PUT,
        ApiMethod::Patch => Method::PATCH,
        ApiMethod::Delete => Method::DELETE,
    }
}

/// Base URL plus percent-encoded path segments and query pairs.
fn request_url(request: &ApiRequest) -> Result<Url, ServiceError> {
    let mut url = Url::parse(&request.base_url)
        .map_err(|e| ServiceError::Transport(format!("invalid base URL: {}", e)))?;

    if !request.path.is_empty() {
        let mut segments = url.path_segments_mut().map_err(|_| {
            ServiceError::Transport(format!("base URL cannot take a path: {}", request.base_url))
        })?;
        segments.pop_if_empty();
        for segment in &request.path {
            segments.push(segment);
        }
    }

    if !request.query.is_empty() {
        url.query_pairs_mut().extend_pairs(request.query.iter());
    }

    Ok(url)
}

fn boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("mcp_boundary_{}", suffix)
}

fn multipart_body(boundary: &str, metadata: &Value, media: &[u8], mime_type: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + 512);
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{}\r\n--{}\r\nContent-Type: {}\r\n\r\n",
            boundary, metadata, boundary, mime_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

/// Google wraps API errors as `{"error": {"code", "message", ...}}`; fall back
/// to the status line when the body says nothing useful.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let message = parsed.as_ref().and_then(|v| match v.get("error") {
        Some(Value::Object(error)) => error.get("message").and_then(Value::as_str),
        Some(Value::String(error)) => v
            .get("error_description")
            .and_then(Value::as_str)
            .or(Some(error.as_str())),
        _ => None,
    });

    match message {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string()),
    }
}
