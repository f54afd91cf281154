// This module owns the one credential the whole server authenticates with.
// Every tool invocation funnels through `ensure_valid()`, so this is the place
// where concurrent requests meet. The rule is simple: the stale check, the token
// exchange and the write to the store all happen under one async mutex. Callers
// that arrive while an exchange is in flight wait on the lock and then find the
// fresh credential already in place, so N concurrent callers cost exactly one
// round trip to Google.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use super::credential_models::{Credential, CredentialSnapshot, TokenGrant};
use super::credential_store::{CredentialStore, StoreError};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(
        "Credentials file not found at {0}. Please download OAuth2 credentials from Google Cloud Console."
    )]
    MissingClientSecrets(String),

    #[error("Invalid OAuth client configuration: {0}")]
    InvalidClientConfig(String),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Authorization flow failed: {0}")]
    Flow(String),
}

// ============================================================================
// TOKEN EXCHANGE (PORT)
// ============================================================================

/// Talks to an OAuth2 token endpoint. The infra layer provides the
/// installed-app flow and the service account flow.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Trades a refresh token for a new access token.
    async fn refresh(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<TokenGrant, AuthError>;

    /// Runs the full authorization flow from scratch.
    async fn authorize(&self, scopes: &[String]) -> Result<TokenGrant, AuthError>;
}

// ============================================================================
// MANAGER
// ============================================================================

#[derive(Default)]
struct CredentialState {
    loaded: bool,
    current: Option<Arc<Credential>>,
    generation: u64,
}

impl CredentialState {
    fn snapshot(&self) -> Option<CredentialSnapshot> {
        self.current.as_ref().map(|credential| CredentialSnapshot {
            credential: Arc::clone(credential),
            generation: self.generation,
        })
    }

    fn publish(&mut self, credential: Credential) -> CredentialSnapshot {
        let credential = Arc::new(credential);
        self.current = Some(Arc::clone(&credential));
        self.generation += 1;
        CredentialSnapshot {
            credential,
            generation: self.generation,
        }
    }
}

pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    exchange: Arc<dyn TokenExchange>,
    scopes: Vec<String>,
    refresh_margin: Duration,
    state: Mutex<CredentialState>,
}

impl CredentialManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        exchange: Arc<dyn TokenExchange>,
        scopes: Vec<String>,
        refresh_margin: std::time::Duration,
    ) -> Self {
        Self {
            store,
            exchange,
            scopes,
            refresh_margin: Duration::from_std(refresh_margin)
                .unwrap_or_else(|_| Duration::seconds(60)),
            state: Mutex::new(CredentialState::default()),
        }
    }

    /// Returns a credential that is valid for at least the safety margin.
    ///
    /// Loads the stored record on first use, refreshes it when stale, and falls
    /// back to the full authorization flow when there is nothing to refresh.
    /// Failures leave the in-memory credential untouched.
    pub async fn ensure_valid(&self) -> Result<CredentialSnapshot, AuthError> {
        let mut state = self.state.lock().await;

        if !state.loaded {
            if let Some(stored) = self.store.load().await? {
                tracing::info!(expiry = %stored.expiry, "Loaded stored Google credential");
                state.current = Some(Arc::new(stored));
                state.generation += 1;
            }
            state.loaded = true;
        }

        if let Some(snapshot) = state.snapshot() {
            let credential = &snapshot.credential;
            if credential.covers(&self.scopes)
                && credential.is_valid_at(Utc::now(), self.refresh_margin)
            {
                return Ok(snapshot);
            }
        }

        let next = match self.acquire(state.current.as_deref()).await {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!("Could not obtain a Google credential: {}", e);
                return Err(e);
            }
        };

        // Persist before anyone can observe the new token.
        self.store.save(&next).await?;
        let snapshot = state.publish(next);

        tracing::info!(
            generation = snapshot.generation,
            expiry = %snapshot.credential.expiry,
            "Google credential updated"
        );
        Ok(snapshot)
    }

    /// The credential currently held in memory, without any staleness check.
    #[cfg(test)]
    pub async fn current(&self) -> Option<CredentialSnapshot> {
        self.state.lock().await.snapshot()
    }

    async fn acquire(&self, current: Option<&Credential>) -> Result<Credential, AuthError> {
        match current {
            Some(credential) if credential.covers(&self.scopes) && credential.can_refresh() => {
                tracing::info!("Refreshing stale Google credential");
                let refresh_token = credential.refresh_token.as_deref().unwrap_or_default();
                let grant = self.exchange.refresh(refresh_token, &self.scopes).await?;
                Credential::from_grant(grant, Some(credential), &self.scopes, Utc::now())
            }
            Some(credential) if !credential.covers(&self.scopes) => {
                tracing::info!("Stored credential lacks required scopes, re-authorizing");
                self.authorize().await
            }
            _ => {
                tracing::info!("No usable Google credential, starting authorization flow");
                self.authorize().await
            }
        }
    }

    async fn authorize(&self) -> Result<Credential, AuthError> {
        let grant = self.exchange.authorize(&self.scopes).await?;
        Credential::from_grant(grant, None, &self.scopes, Utc::now())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::required_scopes;
    use crate::test_support::{
        expired_credential, valid_credential, CountingExchange, MemoryCredentialStore,
    };
    use std::time::Duration as StdDuration;

    fn manager(
        store: Arc<MemoryCredentialStore>,
        exchange: Arc<CountingExchange>,
    ) -> Arc<CredentialManager> {
        Arc::new(CredentialManager::new(
            store,
            exchange,
            required_scopes(),
            StdDuration::from_secs(60),
        ))
    }

    #[tokio::test]
    async fn valid_stored_credential_needs_no_exchange() {
        let store = Arc::new(MemoryCredentialStore::with(valid_credential("ya29.stored")));
        let exchange = Arc::new(CountingExchange::new("ya29.fresh"));
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let snapshot = manager.ensure_valid().await.unwrap();

        assert_eq!(snapshot.access_token(), "ya29.stored");
        assert_eq!(snapshot.generation, 1);
        assert_eq!(exchange.refreshes(), 0);
        assert_eq!(exchange.authorizations(), 0);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn stale_credential_is_refreshed_and_persisted() {
        let store = Arc::new(MemoryCredentialStore::with(expired_credential(
            "ya29.old",
            Some("1//refresh"),
        )));
        let exchange = Arc::new(CountingExchange::new("ya29.fresh"));
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let snapshot = manager.ensure_valid().await.unwrap();

        assert_eq!(snapshot.access_token(), "ya29.fresh");
        assert_eq!(exchange.refreshes(), 1);
        assert_eq!(exchange.last_refresh_token().as_deref(), Some("1//refresh"));
        assert_eq!(store.saves(), 1);

        let persisted = store.stored().unwrap();
        assert_eq!(&persisted, snapshot.credential.as_ref());
        assert_eq!(persisted.refresh_token.as_deref(), Some("1//refresh"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let store = Arc::new(MemoryCredentialStore::with(expired_credential(
            "ya29.old",
            Some("1//refresh"),
        )));
        let exchange = Arc::new(
            CountingExchange::new("ya29.fresh").with_delay(StdDuration::from_millis(50)),
        );
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            tasks.spawn(async move { manager.ensure_valid().await });
        }

        let mut tokens = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let snapshot = joined.unwrap().unwrap();
            tokens.push((snapshot.access_token().to_string(), snapshot.generation));
        }

        assert_eq!(tokens.len(), 16);
        assert_eq!(exchange.refreshes(), 1);
        assert_eq!(store.saves(), 1);
        assert!(tokens.iter().all(|(t, g)| t == "ya29.fresh" && *g == 2));
    }

    #[tokio::test]
    async fn missing_record_runs_authorization_flow_once() {
        let store = Arc::new(MemoryCredentialStore::empty());
        let exchange = Arc::new(CountingExchange::new("ya29.first"));
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let first = manager.ensure_valid().await.unwrap();
        let second = manager.ensure_valid().await.unwrap();

        assert_eq!(first.access_token(), "ya29.first");
        assert_eq!(first.generation, second.generation);
        assert_eq!(exchange.authorizations(), 1);
        assert_eq!(exchange.refreshes(), 0);
        assert!(store.stored().is_some());
    }

    #[tokio::test]
    async fn expired_credential_without_refresh_token_reauthorizes() {
        let store = Arc::new(MemoryCredentialStore::with(expired_credential(
            "ya29.old", None,
        )));
        let exchange = Arc::new(CountingExchange::new("ya29.fresh"));
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let snapshot = manager.ensure_valid().await.unwrap();

        assert_eq!(snapshot.access_token(), "ya29.fresh");
        assert_eq!(exchange.authorizations(), 1);
        assert_eq!(exchange.refreshes(), 0);
    }

    #[tokio::test]
    async fn credential_missing_scopes_reauthorizes() {
        let mut narrow = valid_credential("ya29.narrow");
        narrow.scopes = ["https://www.googleapis.com/auth/drive".to_string()]
            .into_iter()
            .collect();
        let store = Arc::new(MemoryCredentialStore::with(narrow));
        let exchange = Arc::new(CountingExchange::new("ya29.wide"));
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let snapshot = manager.ensure_valid().await.unwrap();

        assert_eq!(snapshot.access_token(), "ya29.wide");
        assert_eq!(exchange.authorizations(), 1);
        assert!(snapshot.credential.covers(&required_scopes()));
    }

    #[tokio::test]
    async fn failed_refresh_leaves_credential_unchanged() {
        let stale = expired_credential("ya29.old", Some("1//refresh"));
        let store = Arc::new(MemoryCredentialStore::with(stale.clone()));
        let exchange = Arc::new(CountingExchange::new("ya29.fresh").failing());
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let err = manager.ensure_valid().await.unwrap_err();
        assert!(matches!(err, AuthError::Exchange(_)));

        let current = manager.current().await.unwrap();
        assert_eq!(current.credential.as_ref(), &stale);
        assert_eq!(current.generation, 1);
        assert_eq!(store.saves(), 0);
        // No fallback to the interactive flow when a refresh fails.
        assert_eq!(exchange.authorizations(), 0);
    }

    #[tokio::test]
    async fn failed_persist_does_not_publish_new_token() {
        let stale = expired_credential("ya29.old", Some("1//refresh"));
        let store = Arc::new(MemoryCredentialStore::with(stale.clone()).failing_saves());
        let exchange = Arc::new(CountingExchange::new("ya29.fresh"));
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let err = manager.ensure_valid().await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));

        let current = manager.current().await.unwrap();
        assert_eq!(current.credential.access_token, "ya29.old");
    }

    #[tokio::test]
    async fn store_failure_on_load_is_an_auth_failure() {
        let store = Arc::new(MemoryCredentialStore::empty().failing_loads());
        let exchange = Arc::new(CountingExchange::new("ya29.fresh"));
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let err = manager.ensure_valid().await.unwrap_err();

        assert!(err.to_string().starts_with("Credential store error"));
        assert_eq!(exchange.authorizations(), 0);
    }

    #[tokio::test]
    async fn absurd_token_lifetime_fails_without_persisting() {
        let stale = expired_credential("ya29.old", Some("1//refresh"));
        let store = Arc::new(MemoryCredentialStore::with(stale.clone()));
        let exchange = Arc::new(CountingExchange::new("ya29.fresh").with_expires_in(i64::MAX));
        let manager = manager(Arc::clone(&store), Arc::clone(&exchange));

        let err = manager.ensure_valid().await.unwrap_err();

        assert!(matches!(err, AuthError::Exchange(_)));
        assert_eq!(exchange.refreshes(), 1);
        assert_eq!(store.saves(), 0);
        assert_eq!(manager.current().await.unwrap().credential.as_ref(), &stale);
    }
}
