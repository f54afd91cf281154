use std::sync::Arc;

use dashmap::DashMap;

use super::service_client::{ApiTransport, ServiceClient, ServiceEndpoints, ServiceFamily};
use crate::core::credentials::{AuthError, CredentialManager, CredentialSnapshot};

/// Hands out one cached client per service family.
///
/// Every lookup asks the credential manager for a valid credential first (a
/// cheap check while the token is fresh). If the manager answers with a newer
/// generation than a cached handle was built from, that handle is stale and gets
/// rebuilt; handles of the other families are dropped at the same time.
pub struct ServiceClientFactory {
    credentials: Arc<CredentialManager>,
    transport: Arc<dyn ApiTransport>,
    endpoints: ServiceEndpoints,
    handles: DashMap<ServiceFamily, Arc<ServiceClient>>,
}

impl ServiceClientFactory {
    pub fn new(
        credentials: Arc<CredentialManager>,
        transport: Arc<dyn ApiTransport>,
        endpoints: ServiceEndpoints,
    ) -> Self {
        Self {
            credentials,
            transport,
            endpoints,
            handles: DashMap::new(),
        }
    }

    pub async fn client(&self, family: ServiceFamily) -> Result<Arc<ServiceClient>, AuthError> {
        let snapshot = self.credentials.ensure_valid().await?;

        self.handles
            .retain(|_, handle| handle.generation() >= snapshot.generation);

        let handle = self
            .handles
            .entry(family)
            .and_modify(|existing| {
                if existing.generation() < snapshot.generation {
                    *existing = self.build(family, &snapshot);
                }
            })
            .or_insert_with(|| self.build(family, &snapshot));

        Ok(Arc::clone(handle.value()))
    }

    fn build(&self, family: ServiceFamily, snapshot: &CredentialSnapshot) -> Arc<ServiceClient> {
        tracing::debug!(
            family = %family,
            generation = snapshot.generation,
            "Building Google service client"
        );
        Arc::new(ServiceClient::new(
            family,
            &self.endpoints,
            snapshot.clone(),
            Arc::clone(&self.transport),
        ))
    }
}
