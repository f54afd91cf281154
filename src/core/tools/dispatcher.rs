// =============================================================================
// TOOL DISPATCHER
// =============================================================================
//
// One call per inbound request: look the tool up, check the arguments against
// its schema, run the handler, and fold whatever happened into a `ToolResult`.
//
// The dispatcher is the error boundary of the whole server. Unknown names,
// malformed arguments, remote failures, auth failures and even a panicking
// handler all come out as a `Failure` carrying the tool name and a readable
// message. Nothing escapes to the transport.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use super::tool_registry::{ToolError, ToolRegistry};

/// An inbound invocation: tool name plus the caller's argument bag.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub name: String,
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UnknownTool,
    InvalidArguments,
    /// Remote failures and credential failures during the call.
    HandlerError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub tool: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Value),
    Failure(ToolFailure),
}

impl ToolResult {
    fn failure(kind: FailureKind, tool: &str, message: String) -> Self {
        ToolResult::Failure(ToolFailure {
            kind,
            tool: tool.to_string(),
            message,
        })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToolResult::Failure(_))
    }

    /// The document returned to the caller: the success payload as-is, or the
    /// `{error, tool}` envelope.
    pub fn to_json(&self) -> Value {
        match self {
            ToolResult::Success(payload) => payload.clone(),
            ToolResult::Failure(failure) => json!({
                "error": failure.message,
                "tool": failure.tool,
            }),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, request: ToolRequest) -> ToolResult {
        let ToolRequest { name, arguments } = request;

        let Some(descriptor) = self.registry.lookup(&name) else {
            tracing::warn!(tool = %name, "Unknown tool requested");
            return ToolResult::failure(
                FailureKind::UnknownTool,
                &name,
                format!("Unknown tool: {}", name),
            );
        };

        let arguments = match descriptor.input_schema.validate(&arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                tracing::warn!(tool = %name, "Rejected arguments: {}", e);
                return ToolResult::failure(
                    FailureKind::InvalidArguments,
                    &name,
                    ToolError::from(e).to_string(),
                );
            }
        };

        let started = Instant::now();
        let handler = Arc::clone(&descriptor.handler);

        // Running the handler on its own task turns a panic into a JoinError
        // instead of tearing down the caller.
        let outcome = tokio::spawn(async move { handler.call(arguments).await }).await;

        let result = match outcome {
            Ok(Ok(payload)) => ToolResult::Success(payload),
            Ok(Err(e)) => {
                tracing::error!("Error executing tool {}: {}", name, e);
                let kind = match e {
                    ToolError::InvalidArguments(_) => FailureKind::InvalidArguments,
                    _ => FailureKind::HandlerError,
                };
                ToolResult::failure(kind, &name, e.to_string())
            }
            Err(join_error) => {
                tracing::error!("Tool {} terminated unexpectedly: {}", name, join_error);
                ToolResult::failure(
                    FailureKind::HandlerError,
                    &name,
                    format!("Tool handler terminated unexpectedly: {}", join_error),
                )
            }
        };

        tracing::debug!(
            tool = %name,
            failed = result.is_failure(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool call finished"
        );
        result
    }
}
