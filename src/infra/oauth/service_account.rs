// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Headless alternative to the browser flow, selected when
// `GOOGLE_SERVICE_ACCOUNT_KEY` (path) or `GOOGLE_SERVICE_ACCOUNT_JSON`
// (content) is set. Every exchange signs a fresh JWT assertion with the
// account's private key and trades it for an access token.
//
// Service accounts never get a refresh token, so once the token goes stale the
// credential manager falls through to `authorize`, which simply signs a new
// assertion. Files have to be shared with the service account's email before
// it can see them.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{request_token, GOOGLE_TOKEN_URI};
use crate::core::credentials::{AuthError, TokenExchange, TokenGrant};

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    /// The service account email (used as issuer in the JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    /// At most one hour after `iat`.
    exp: i64,
}

pub struct ServiceAccountExchange {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    http: Client,
}

impl ServiceAccountExchange {
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AuthError::InvalidClientConfig(format!(
                "cannot read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let key: ServiceAccountKey = serde_json::from_str(json).map_err(|e| {
            AuthError::InvalidClientConfig(format!("invalid service account key: {}", e))
        })?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            AuthError::InvalidClientConfig(format!("invalid service account private key: {}", e))
        })?;

        Ok(Self {
            key,
            signing_key,
            http: Client::new(),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn assertion(&self, scopes: &[String]) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: scopes.join(" "),
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| AuthError::Exchange(format!("cannot sign assertion: {}", e)))
    }

    async fn exchange(&self, scopes: &[String]) -> Result<TokenGrant, AuthError> {
        let jwt = self.assertion(scopes)?;
        let mut grant = request_token(
            &self.http,
            &self.key.token_uri,
            &[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ],
        )
        .await?;

        // The token endpoint doesn't echo scopes for assertions; the grant
        // covers exactly what was signed for.
        if grant.scope.is_none() {
            grant.scope = Some(scopes.join(" "));
        }
        tracing::debug!(account = %self.key.client_email, "Obtained service account token");
        Ok(grant)
    }
}

#[async_trait]
impl TokenExchange for ServiceAccountExchange {
    async fn refresh(
        &self,
        _refresh_token: &str,
        scopes: &[String],
    ) -> Result<TokenGrant, AuthError> {
        self.exchange(scopes).await
    }

    async fn authorize(&self, scopes: &[String]) -> Result<TokenGrant, AuthError> {
        self.exchange(scopes).await
    }
}
