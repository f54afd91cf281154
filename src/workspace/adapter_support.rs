use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::core::services::ServiceError;
use crate::core::tools::{handler_fn, ToolArguments, ToolError, ToolHandler};

/// Names a remote operation for error reporting: `context` goes to the log,
/// `action` into the caller-facing "Failed to <action>: ..." message.
#[derive(Debug, Clone, Copy)]
pub struct RemoteAction {
    context: &'static str,
    action: &'static str,
}

impl RemoteAction {
    pub const fn new(context: &'static str, action: &'static str) -> Self {
        Self { context, action }
    }

    pub fn fail(self, error: ServiceError) -> ToolError {
        tracing::error!("{}: {}", self.context, error);
        ToolError::remote(self.action)(error)
    }

    /// A failure detected before anything was sent to Google.
    pub fn reject(self, message: String) -> ToolError {
        tracing::error!("{}: {}", self.context, message);
        ToolError::Local {
            action: self.action,
            message,
        }
    }
}

pub trait RemoteResultExt<T> {
    fn or_fail(self, action: RemoteAction) -> Result<T, ToolError>;
}

impl<T> RemoteResultExt<T> for Result<T, ServiceError> {
    fn or_fail(self, action: RemoteAction) -> Result<T, ToolError> {
        self.map_err(|e| action.fail(e))
    }
}

/// A string field the remote service always returns on success.
pub fn required_str<'a>(response: &'a Value, key: &str) -> Result<&'a str, ServiceError> {
    response
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::Decode(format!("response is missing '{}'", key)))
}

pub fn str_or_empty<'a>(response: &'a Value, key: &str) -> &'a str {
    response.get(key).and_then(Value::as_str).unwrap_or("")
}

pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Binds a tool handler to a shared adapter.
pub fn route<T, F, Fut>(adapter: &Arc<T>, call: F) -> Arc<dyn ToolHandler>
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>, ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    let adapter = Arc::clone(adapter);
    handler_fn(move |arguments| call(Arc::clone(&adapter), arguments))
}
