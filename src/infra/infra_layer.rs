// The infra module contains implementations of core traits (token exchanges,
// the credential file, the HTTP transport) and the process configuration.

#[path = "config/server_config.rs"]
pub mod config;

#[path = "credentials/json_credential_store.rs"]
pub mod credentials;

#[path = "oauth/mod.rs"]
pub mod oauth;

#[path = "http/reqwest_transport.rs"]
pub mod http;
