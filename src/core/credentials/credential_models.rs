use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::credential_manager::AuthError;

/// OAuth2 scopes every credential must carry to serve the whole tool catalog.
pub const REQUIRED_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

pub fn required_scopes() -> Vec<String> {
    REQUIRED_SCOPES.iter().map(|s| s.to_string()).collect()
}

/// The OAuth2 access/refresh token pair used to authenticate remote calls.
///
/// This is also the on-disk record: the field names match the `token.json`
/// files written by Google's own client libraries, so an existing token file
/// keeps working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "token")]
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub expiry: DateTime<Utc>,

    #[serde(default)]
    pub scopes: BTreeSet<String>,
}

impl Credential {
    /// A credential is valid while its expiry is more than `margin` away.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expiry > now + margin
    }

    /// Expired credentials without a refresh token need a full authorization flow.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }

    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|s| self.scopes.contains(s))
    }

    /// Builds the credential that supersedes `previous` after a token exchange.
    ///
    /// Google only sends a refresh token on the first consent, so a refresh
    /// grant without one keeps the token we already had. The same goes for
    /// scopes: a grant that doesn't echo them back inherits the requested set.
    /// A lifetime too large to represent as a timestamp fails the exchange.
    pub fn from_grant(
        grant: TokenGrant,
        previous: Option<&Credential>,
        requested_scopes: &[String],
        now: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        let expiry = Duration::try_seconds(grant.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::Exchange(format!("expires_in {} is out of range", grant.expires_in))
            })?;

        let refresh_token = grant
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        let scopes: BTreeSet<String> = match grant.scope.as_deref() {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => requested_scopes.iter().cloned().collect(),
        };

        Ok(Self {
            access_token: grant.access_token,
            refresh_token,
            expiry,
            scopes,
        })
    }
}

/// Response body of a successful token endpoint exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Lifetime of the access token in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,

    /// Space separated list of granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// A credential together with the generation it belongs to.
///
/// The generation increases every time the manager supersedes its credential,
/// which lets holders of derived state (client handles) notice that they are
/// bound to an outdated token.
#[derive(Debug, Clone)]
pub struct CredentialSnapshot {
    pub credential: Arc<Credential>,
    pub generation: u64,
}

impl CredentialSnapshot {
    pub fn access_token(&self) -> &str {
        &self.credential.access_token
    }
}
