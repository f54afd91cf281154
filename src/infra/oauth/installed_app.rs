// =============================================================================
// INSTALLED APPLICATION OAUTH2 FLOW
// =============================================================================
//
// The default way to obtain a user credential. The consent happens in the
// user's browser; Google redirects back to a one-shot HTTP listener on the
// loopback interface and we trade the code for tokens.
//
// **Setup Instructions:**
//
// 1. Go to Google Cloud Console: https://console.cloud.google.com/
// 2. Enable the Google Docs, Google Sheets and Google Drive APIs
// 3. Create OAuth credentials:
//    - "APIs & Services" > "Credentials" > "Create Credentials" > "OAuth client ID"
//    - Application type: "Desktop app"
// 4. Download the JSON and save it as `credentials.json`
//    (or point `GOOGLE_CREDENTIALS_PATH` at it)
//
// The consent URL goes to stderr. stdout carries the protocol stream and must
// never see anything else.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::{request_token, GOOGLE_TOKEN_URI};
use crate::core::credentials::{AuthError, TokenExchange, TokenGrant};

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

const SUCCESS_PAGE: &str = "<html><body><h1>Authentication complete.</h1>\
<p>You may close this window and return to your MCP client.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h1>Authentication failed.</h1>\
<p>Check the server log for details.</p></body></html>";

// =============================================================================
// CLIENT SECRETS
// =============================================================================

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

/// The OAuth client registration downloaded from the Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl ClientSecrets {
    pub fn parse(text: &str) -> Result<Self, AuthError> {
        let file: ClientSecretsFile = serde_json::from_str(text)
            .map_err(|e| AuthError::InvalidClientConfig(e.to_string()))?;

        file.installed.or(file.web).ok_or_else(|| {
            AuthError::InvalidClientConfig(
                "expected an \"installed\" or \"web\" client section".to_string(),
            )
        })
    }
}

// =============================================================================
// FLOW
// =============================================================================

pub struct InstalledAppFlow {
    credentials_path: PathBuf,
    http: Client,
    timeout: Duration,
}

impl InstalledAppFlow {
    pub fn new(credentials_path: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            credentials_path: credentials_path.as_ref().to_path_buf(),
            http: Client::new(),
            timeout,
        }
    }

    /// Read on every exchange so a secrets file dropped in after startup is
    /// picked up without a restart.
    async fn client_secrets(&self) -> Result<ClientSecrets, AuthError> {
        let text = match tokio::fs::read_to_string(&self.credentials_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AuthError::MissingClientSecrets(
                    self.credentials_path.display().to_string(),
                ));
            }
            Err(e) => {
                return Err(AuthError::InvalidClientConfig(format!(
                    "cannot read {}: {}",
                    self.credentials_path.display(),
                    e
                )));
            }
        };
        ClientSecrets::parse(&text)
    }
}

#[async_trait]
impl TokenExchange for InstalledAppFlow {
    async fn refresh(
        &self,
        refresh_token: &str,
        _scopes: &[String],
    ) -> Result<TokenGrant, AuthError> {
        let secrets = self.client_secrets().await?;

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", secrets.client_id.as_str()),
        ];
        if let Some(secret) = secrets.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        tracing::debug!("Refreshing Google access token");
        request_token(&self.http, &secrets.token_uri, &form).await
    }

    async fn authorize(&self, scopes: &[String]) -> Result<TokenGrant, AuthError> {
        let secrets = self.client_secrets().await?;

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| AuthError::Flow(format!("cannot open loopback listener: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Flow(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);

        let verifier = random_string(64);
        let state = random_string(32);
        let url = consent_url(
            &secrets,
            &redirect_uri,
            scopes,
            &state,
            &pkce_challenge(&verifier),
        )?;

        eprintln!(
            "Please visit this URL to authorize this application:\n{}",
            url
        );
        tracing::info!(port, "Waiting for OAuth consent on the loopback redirect");

        let code = tokio::time::timeout(self.timeout, wait_for_code(&listener, &state))
            .await
            .map_err(|_| {
                AuthError::Flow(format!(
                    "no authorization response within {} seconds",
                    self.timeout.as_secs()
                ))
            })??;

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", secrets.client_id.as_str()),
            ("code_verifier", verifier.as_str()),
        ];
        if let Some(secret) = secrets.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let grant = request_token(&self.http, &secrets.token_uri, &form).await?;
        tracing::info!("Google authorization completed");
        Ok(grant)
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// S256 code challenge for a PKCE verifier.
fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn consent_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
    challenge: &str,
) -> Result<Url, AuthError> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", state),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| AuthError::InvalidClientConfig(format!("invalid auth_uri: {}", e)))
}

// =============================================================================
// LOOPBACK REDIRECT
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Redirect {
    Code(String),
    /// Not the redirect (a favicon probe, for instance); keep listening.
    Ignored,
}

fn parse_redirect(target: &str, expected_state: &str) -> Result<Redirect, AuthError> {
    let url = Url::parse("http://127.0.0.1/")
        .and_then(|base| base.join(target))
        .map_err(|e| AuthError::Flow(format!("malformed redirect: {}", e)))?;

    let (mut code, mut state, mut error) = (None, None, None);
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::Flow(format!("consent was not granted: {}", error)));
    }
    let Some(code) = code else {
        return Ok(Redirect::Ignored);
    };
    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::Flow(
            "state mismatch in authorization redirect".to_string(),
        ));
    }
    Ok(Redirect::Code(code))
}

async fn wait_for_code(listener: &TcpListener, state: &str) -> Result<String, AuthError> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .map_err(|e| AuthError::Flow(e.to_string()))?;

        let target = match read_request_target(&mut stream).await {
            Ok(target) => target,
            Err(e) => {
                tracing::debug!("Ignoring loopback connection: {}", e);
                continue;
            }
        };

        match parse_redirect(&target, state) {
            Ok(Redirect::Code(code)) => {
                respond(&mut stream, "200 OK", SUCCESS_PAGE).await;
                return Ok(code);
            }
            Ok(Redirect::Ignored) => respond(&mut stream, "404 Not Found", "").await,
            Err(e) => {
                respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await;
                return Err(e);
            }
        }
    }
}

async fn read_request_target(stream: &mut TcpStream) -> io::Result<String> {
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < 16 * 1024 {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..read]);
    }

    let head = String::from_utf8_lossy(&head);
    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    match (request_line.next(), request_line.next()) {
        (Some("GET"), Some(target)) => Ok(target.to_string()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "expected an HTTP GET request",
        )),
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("Failed to answer loopback request: {}", e);
    }
    let _ = stream.shutdown().await;
}
