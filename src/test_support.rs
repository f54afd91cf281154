// Shared test doubles for the credential, transport and tool layers.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::core::credentials::{
    required_scopes, AuthError, Credential, CredentialManager, CredentialStore, StoreError,
    TokenExchange, TokenGrant,
};
use crate::core::services::{
    ApiRequest, ApiTransport, ServiceClientFactory, ServiceEndpoints, ServiceError,
};

// ============================================================================
// CREDENTIALS
// ============================================================================

pub fn valid_credential(token: &str) -> Credential {
    Credential {
        access_token: token.to_string(),
        refresh_token: Some("1//refresh".to_string()),
        expiry: Utc::now() + chrono::Duration::hours(1),
        scopes: required_scopes().into_iter().collect(),
    }
}

pub fn expired_credential(token: &str, refresh_token: Option<&str>) -> Credential {
    Credential {
        access_token: token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expiry: Utc::now() - chrono::Duration::minutes(5),
        scopes: required_scopes().into_iter().collect(),
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<Credential>>,
    saves: AtomicUsize,
    fail_saves: bool,
    fail_loads: bool,
}

impl MemoryCredentialStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(credential: Credential) -> Self {
        Self {
            record: Mutex::new(Some(credential)),
            ..Self::default()
        }
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn failing_loads(mut self) -> Self {
        self.fail_loads = true;
        self
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<Credential> {
        self.record.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        if self.fail_loads {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "token file unreadable",
            )));
        }
        Ok(self.record.lock().unwrap().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "disk full",
            )));
        }
        *self.record.lock().unwrap() = Some(credential.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Token exchange that hands out a fixed access token and counts calls.
pub struct CountingExchange {
    token: String,
    delay: Option<Duration>,
    fail: bool,
    expires_in: i64,
    refreshes: AtomicUsize,
    authorizations: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
}

impl CountingExchange {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            delay: None,
            fail: false,
            expires_in: 3600,
            refreshes: AtomicUsize::new(0),
            authorizations: AtomicUsize::new(0),
            last_refresh_token: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = seconds;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn authorizations(&self) -> usize {
        self.authorizations.load(Ordering::SeqCst)
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }

    async fn grant(
        &self,
        refresh_token: Option<&str>,
        scopes: &[String],
    ) -> Result<TokenGrant, AuthError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AuthError::Exchange(
                "invalid_grant: Token has been revoked".to_string(),
            ));
        }
        Ok(TokenGrant {
            access_token: self.token.clone(),
            refresh_token: refresh_token.map(str::to_string),
            expires_in: self.expires_in,
            scope: Some(scopes.join(" ")),
        })
    }
}

#[async_trait]
impl TokenExchange for CountingExchange {
    async fn refresh(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<TokenGrant, AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_string());
        // Refresh grants don't repeat the refresh token.
        self.grant(None, scopes).await
    }

    async fn authorize(&self, scopes: &[String]) -> Result<TokenGrant, AuthError> {
        self.authorizations.fetch_add(1, Ordering::SeqCst);
        self.grant(Some("1//granted"), scopes).await
    }
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// Records every request and answers from a queue of canned responses.
/// An empty queue answers `{}`.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<ApiRequest>>,
    responses: Mutex<VecDeque<Result<Value, ServiceError>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, body: Value) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn fail(&self, error: ServiceError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

#[async_trait]
impl ApiTransport for RecordingTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Value, ServiceError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({})))
    }
}

/// A client factory backed by a valid stored credential and the given transport.
pub fn factory_with(transport: Arc<RecordingTransport>) -> Arc<ServiceClientFactory> {
    let manager = Arc::new(CredentialManager::new(
        Arc::new(MemoryCredentialStore::with(valid_credential("ya29.test"))),
        Arc::new(CountingExchange::new("ya29.unused")),
        required_scopes(),
        Duration::from_secs(60),
    ));
    Arc::new(ServiceClientFactory::new(
        manager,
        transport,
        ServiceEndpoints::default(),
    ))
}
