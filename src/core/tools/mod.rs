pub mod dispatcher;
pub mod tool_registry;
pub mod tool_schema;

pub use dispatcher::{Dispatcher, ToolRequest};
pub use tool_registry::{
    handler_fn, RegistryError, ToolDescriptor, ToolError, ToolHandler, ToolRegistry,
};
pub use tool_schema::{InputSchema, PropertyDef, ToolArguments};
