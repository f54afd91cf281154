use super::credential_models::Credential;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable home of the single credential record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `None` when nothing has been stored yet.
    async fn load(&self) -> Result<Option<Credential>, StoreError>;
    async fn save(&self, credential: &Credential) -> Result<(), StoreError>;
}
