// =============================================================================
// TOOL CATALOG
// =============================================================================
//
// Registers every domain adapter's tools in one registry. Adding a new
// adapter means appending its descriptors here; name collisions are caught by
// `ToolRegistry::new` at startup.

use std::sync::Arc;

use crate::core::services::ServiceClientFactory;
use crate::core::tools::{RegistryError, ToolRegistry};

use super::docs::DocsTools;
use super::drive::DriveTools;
use super::sheets::SheetsTools;

pub fn build_registry(clients: Arc<ServiceClientFactory>) -> Result<ToolRegistry, RegistryError> {
    let mut descriptors = Arc::new(DocsTools::new(Arc::clone(&clients))).descriptors();
    descriptors.extend(Arc::new(SheetsTools::new(Arc::clone(&clients))).descriptors());
    descriptors.extend(Arc::new(DriveTools::new(clients)).descriptors());

    let registry = ToolRegistry::new(descriptors)?;
    tracing::info!("Registered {} tools", registry.len());
    Ok(registry)
}
