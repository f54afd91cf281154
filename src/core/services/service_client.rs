// =============================================================================
// REMOTE SERVICE CLIENTS
// =============================================================================
//
// The three Google services we talk to (Docs, Sheets, Drive) are plain JSON
// over HTTPS. The core never touches HTTP directly: it builds an `ApiRequest`
// and hands it to an `ApiTransport`. The infra layer provides the reqwest
// implementation, tests provide a recording fake.
//
// A `ServiceClient` is bound to one service family AND one credential snapshot.
// When the credential is superseded the factory throws the client away and
// builds a new one, it never patches the token in place.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::credentials::CredentialSnapshot;

/// The remote service families behind the tool catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceFamily {
    Documents,
    Spreadsheets,
    Files,
}

impl fmt::Display for ServiceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceFamily::Documents => "documents",
            ServiceFamily::Spreadsheets => "spreadsheets",
            ServiceFamily::Files => "files",
        };
        f.write_str(name)
    }
}

/// Base URLs of each service. Overridable so the server can sit behind a proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub documents: String,
    pub spreadsheets: String,
    pub files: String,
    pub file_uploads: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            documents: "https://docs.googleapis.com/v1/documents".to_string(),
            spreadsheets: "https://sheets.googleapis.com/v4/spreadsheets".to_string(),
            files: "https://www.googleapis.com/drive/v3/files".to_string(),
            file_uploads: "https://www.googleapis.com/upload/drive/v3/files".to_string(),
        }
    }
}

impl ServiceEndpoints {
    pub fn base_url(&self, family: ServiceFamily) -> &str {
        match family {
            ServiceFamily::Documents => &self.documents,
            ServiceFamily::Spreadsheets => &self.spreadsheets,
            ServiceFamily::Files => &self.files,
        }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Empty,
    Json(Value),
    /// Metadata plus file content, sent as `multipart/related`.
    Multipart {
        metadata: Value,
        media: Vec<u8>,
        mime_type: String,
    },
}

/// One authenticated call to a Google API.
///
/// `path` holds raw (unencoded) segments appended to `base_url`; the transport
/// is responsible for percent-encoding them, which matters for A1 ranges such
/// as `My Sheet!A1:B2`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: ApiMethod,
    pub base_url: String,
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: ApiBody,
    pub bearer_token: String,
}

impl ApiRequest {
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.path.push(segment.into());
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = ApiBody::Json(body);
        self
    }

    pub fn multipart(mut self, metadata: Value, media: Vec<u8>, mime_type: &str) -> Self {
        self.body = ApiBody::Multipart {
            metadata,
            media,
            mime_type: mime_type.to_string(),
        };
        self
    }

    #[cfg(test)]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// What went wrong talking to a remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

// =============================================================================
// TRANSPORT (PORT)
// =============================================================================

#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Executes the request. An empty response body comes back as `Value::Null`.
    async fn execute(&self, request: ApiRequest) -> Result<Value, ServiceError>;
}

// =============================================================================
// SERVICE CLIENT HANDLE
// =============================================================================

pub struct ServiceClient {
    family: ServiceFamily,
    base_url: String,
    upload_url: String,
    credential: CredentialSnapshot,
    transport: Arc<dyn ApiTransport>,
}

impl ServiceClient {
    pub fn new(
        family: ServiceFamily,
        endpoints: &ServiceEndpoints,
        credential: CredentialSnapshot,
        transport: Arc<dyn ApiTransport>,
    ) -> Self {
        Self {
            family,
            base_url: endpoints.base_url(family).to_string(),
            upload_url: endpoints.file_uploads.clone(),
            credential,
            transport,
        }
    }

    #[cfg(test)]
    pub fn family(&self) -> ServiceFamily {
        self.family
    }

    /// Generation of the credential snapshot this handle is bound to.
    pub fn generation(&self) -> u64 {
        self.credential.generation
    }

    /// Starts a request against this family's base URL.
    pub fn request(&self, method: ApiMethod) -> ApiRequest {
        self.request_at(method, &self.base_url)
    }

    /// Starts a media upload request (Drive only accepts uploads on a separate host path).
    pub fn upload_request(&self) -> ApiRequest {
        self.request_at(ApiMethod::Post, &self.upload_url)
            .query("uploadType", "multipart")
    }

    fn request_at(&self, method: ApiMethod, base_url: &str) -> ApiRequest {
        ApiRequest {
            method,
            base_url: base_url.to_string(),
            path: Vec::new(),
            query: Vec::new(),
            body: ApiBody::Empty,
            bearer_token: self.credential.access_token().to_string(),
        }
    }

    pub async fn send(&self, request: ApiRequest) -> Result<Value, ServiceError> {
        tracing::debug!(
            family = %self.family,
            method = ?request.method,
            path = %request.path.join("/"),
            "Calling Google API"
        );
        self.transport.execute(request).await
    }
}
