// =============================================================================
// SERVER CONFIGURATION
// =============================================================================
//
// Everything is read from environment variables (a `.env` file is loaded by
// `main` before this runs). Nothing here is mandatory: without any variables
// the server uses `credentials.json` / `token.json` in the working directory
// and the public Google endpoints.
//
// **Environment Variables:**
// - `GOOGLE_CREDENTIALS_PATH` - OAuth client secrets file (default: credentials.json)
// - `GOOGLE_TOKEN_PATH` - Where the user's token is stored (default: token.json)
// - `GOOGLE_SERVICE_ACCOUNT_KEY` - Path to a service account JSON key
// - `GOOGLE_SERVICE_ACCOUNT_JSON` - Service account JSON content (alternative)
// - `GOOGLE_TOKEN_REFRESH_MARGIN_SECS` - Refresh this long before expiry (default: 60)
// - `GOOGLE_OAUTH_FLOW_TIMEOUT_SECS` - How long to wait for browser consent (default: 300)
// - `GOOGLE_DOCS_API_URL`, `GOOGLE_SHEETS_API_URL`, `GOOGLE_DRIVE_API_URL`,
//   `GOOGLE_DRIVE_UPLOAD_URL` - Endpoint overrides

use std::path::PathBuf;
use std::time::Duration;

use crate::core::services::ServiceEndpoints;

const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;
const DEFAULT_FLOW_TIMEOUT_SECS: u64 = 300;

/// Where the service account key comes from, when one is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAccountSource {
    KeyFile(PathBuf),
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub service_account: Option<ServiceAccountSource>,
    pub refresh_margin: Duration,
    pub flow_timeout: Duration,
    pub endpoints: ServiceEndpoints,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests don't have to
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let service_account = non_empty("GOOGLE_SERVICE_ACCOUNT_KEY")
            .map(|path| ServiceAccountSource::KeyFile(PathBuf::from(path)))
            .or_else(|| non_empty("GOOGLE_SERVICE_ACCOUNT_JSON").map(ServiceAccountSource::Json));

        let defaults = ServiceEndpoints::default();
        let endpoints = ServiceEndpoints {
            documents: non_empty("GOOGLE_DOCS_API_URL").unwrap_or(defaults.documents),
            spreadsheets: non_empty("GOOGLE_SHEETS_API_URL").unwrap_or(defaults.spreadsheets),
            files: non_empty("GOOGLE_DRIVE_API_URL").unwrap_or(defaults.files),
            file_uploads: non_empty("GOOGLE_DRIVE_UPLOAD_URL").unwrap_or(defaults.file_uploads),
        };

        Self {
            credentials_path: non_empty("GOOGLE_CREDENTIALS_PATH")
                .unwrap_or_else(|| "credentials.json".to_string())
                .into(),
            token_path: non_empty("GOOGLE_TOKEN_PATH")
                .unwrap_or_else(|| "token.json".to_string())
                .into(),
            service_account,
            refresh_margin: seconds(
                "GOOGLE_TOKEN_REFRESH_MARGIN_SECS",
                non_empty("GOOGLE_TOKEN_REFRESH_MARGIN_SECS"),
                DEFAULT_REFRESH_MARGIN_SECS,
            ),
            flow_timeout: seconds(
                "GOOGLE_OAUTH_FLOW_TIMEOUT_SECS",
                non_empty("GOOGLE_OAUTH_FLOW_TIMEOUT_SECS"),
                DEFAULT_FLOW_TIMEOUT_SECS,
            ),
            endpoints,
        }
    }
}

fn seconds(key: &str, raw: Option<String>, default: u64) -> Duration {
    let value = match raw {
        None => default,
        Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
    };
    Duration::from_secs(value)
}
