use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::tool_schema::{ArgumentError, InputSchema, ToolArguments};
use crate::core::credentials::AuthError;
use crate::core::services::ServiceError;

// ============================================================================
// HANDLER ERRORS
// ============================================================================

/// Everything a tool handler can fail with.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[from] ArgumentError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Failed to {action}: {source}")]
    Remote {
        action: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("Failed to {action}: {message}")]
    Local {
        action: &'static str,
        message: String,
    },
}

impl ToolError {
    pub fn remote(action: &'static str) -> impl FnOnce(ServiceError) -> ToolError {
        move |source| ToolError::Remote { action, source }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// The function behind a tool. Receives arguments that already passed the
/// tool's schema and returns the success payload.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        (self.0)(arguments).await
    }
}

/// Wraps an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(
        name: &str,
        description: &str,
        input_schema: InputSchema,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            handler,
        }
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is registered more than once")]
    DuplicateTool(String),

    #[error("Tool '{tool}' has an invalid input schema: {message}")]
    InvalidSchema { tool: String, message: String },
}

/// Immutable name → descriptor catalog, built once at startup.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
    // Registration order, only used to keep the published listing stable.
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new(descriptors: Vec<ToolDescriptor>) -> Result<Self, RegistryError> {
        let mut tools = HashMap::with_capacity(descriptors.len());
        let mut order = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if tools.contains_key(&descriptor.name) {
                return Err(RegistryError::DuplicateTool(descriptor.name));
            }
            if let Some(message) = descriptor.input_schema.compile_error() {
                return Err(RegistryError::InvalidSchema {
                    tool: descriptor.name.clone(),
                    message: message.to_string(),
                });
            }
            order.push(descriptor.name.clone());
            tools.insert(descriptor.name.clone(), descriptor);
        }

        Ok(Self { tools, order })
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::PropertyDef;
    use serde_json::json;

    fn echo(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(
            name,
            "Echoes its arguments",
            InputSchema::new(vec![PropertyDef::string("text")]),
            handler_fn(|args: ToolArguments| async move {
                Ok(json!({ "text": args.opt_str("text") }))
            }),
        )
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ToolRegistry::new(vec![echo("get_sheet_data"), echo("get_sheet_data")])
            .unwrap_err();

        assert_eq!(err, RegistryError::DuplicateTool("get_sheet_data".to_string()));
        assert_eq!(
            err.to_string(),
            "Tool 'get_sheet_data' is registered more than once"
        );
    }

    #[test]
    fn lookup_finds_registered_tools_only() {
        let registry = ToolRegistry::new(vec![echo("a"), echo("b")]).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("a").map(|d| d.name.as_str()), Some("a"));
        assert!(registry.lookup("not_a_tool").is_none());
    }

    #[test]
    fn descriptors_keep_registration_order() {
        let registry = ToolRegistry::new(vec![echo("zeta"), echo("alpha"), echo("mid")]).unwrap();
        let names: Vec<&str> = registry.descriptors().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn closure_handlers_receive_validated_arguments() {
        let descriptor = echo("echo");
        let args = descriptor
            .input_schema
            .validate(&json!({"text": "hi"}))
            .unwrap();

        let result = descriptor.handler.call(args).await.unwrap();
        assert_eq!(result, json!({"text": "hi"}));
    }

    #[test]
    fn remote_errors_name_the_failed_action() {
        let err = ToolError::remote("update sheet data")(ServiceError::Http {
            status: 404,
            message: "Requested entity was not found.".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Failed to update sheet data: HTTP 404: Requested entity was not found."
        );
    }
}
