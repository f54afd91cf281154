pub mod credential_manager;
pub mod credential_models;
pub mod credential_store;

pub use credential_manager::{AuthError, CredentialManager, TokenExchange};
pub use credential_models::{required_scopes, Credential, CredentialSnapshot, TokenGrant};
pub use credential_store::{CredentialStore, StoreError};
