// This is the entry point of the Google Workspace tool server.
//
// **Architecture Overview:**
// - `core/` = Credential lifecycle, service clients, tool registry + dispatcher
// - `infra/` = Implementations of core traits (token file, OAuth, HTTP) and config
// - `workspace/` = Docs, Sheets and Drive adapters exposed as tools
// - `mcp/` = JSON-RPC over stdin/stdout
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Make sure we hold a usable Google credential
// 4. Serve tool calls until stdin closes

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "mcp/mcp_layer.rs"]
mod mcp;
#[path = "workspace/workspace_layer.rs"]
mod workspace;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::core::credentials::{required_scopes, CredentialManager, TokenExchange};
use crate::core::services::ServiceClientFactory;
use crate::core::tools::Dispatcher;
use crate::infra::config::{ServerConfig, ServiceAccountSource};
use crate::infra::credentials::JsonCredentialStore;
use crate::infra::http::ReqwestTransport;
use crate::infra::oauth::{InstalledAppFlow, ServiceAccountExchange};
use crate::workspace::catalog::build_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // stdout carries the protocol, so logs have to go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let exchange: Arc<dyn TokenExchange> = match &config.service_account {
        Some(source) => {
            let account = match source {
                ServiceAccountSource::KeyFile(path) => ServiceAccountExchange::from_file(path)
                    .await
                    .with_context(|| format!("loading service account key {}", path.display()))?,
                ServiceAccountSource::Json(json) => ServiceAccountExchange::from_json(json)
                    .context("parsing GOOGLE_SERVICE_ACCOUNT_JSON")?,
            };
            tracing::info!("Authenticating as service account {}", account.client_email());
            Arc::new(account)
        }
        None => {
            tracing::info!(
                "Using OAuth client secrets from {}",
                config.credentials_path.display()
            );
            Arc::new(InstalledAppFlow::new(
                &config.credentials_path,
                config.flow_timeout,
            ))
        }
    };

    let store = JsonCredentialStore::new(&config.token_path);
    tracing::info!("Token file: {}", store.path().display());

    let credentials = Arc::new(CredentialManager::new(
        Arc::new(store),
        exchange,
        required_scopes(),
        config.refresh_margin,
    ));

    let transport = ReqwestTransport::new().context("building HTTP client")?;
    let clients = Arc::new(ServiceClientFactory::new(
        Arc::clone(&credentials),
        Arc::new(transport),
        config.endpoints.clone(),
    ));

    // Duplicate tool names are a programming error; refuse to start.
    let registry = build_registry(clients).context("building tool registry")?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry)));

    // ========================================================================
    // STARTUP AUTHENTICATION
    // ========================================================================
    // Get the browser flow out of the way before the client starts calling
    // tools. If it fails we keep serving; each call will report the problem.

    match credentials.ensure_valid().await {
        Ok(snapshot) => tracing::info!(
            "Google credential ready (expires {})",
            snapshot.credential.expiry.to_rfc3339()
        ),
        Err(e) => tracing::warn!("Google authentication failed at startup: {}", e),
    }

    mcp::stdio::serve_stdio(dispatcher)
        .await
        .context("serving stdio")?;

    tracing::info!("Shutting down");
    Ok(())
}
