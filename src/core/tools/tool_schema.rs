// =============================================================================
// TOOL INPUT SCHEMAS
// =============================================================================
//
// Every tool declares the shape of its arguments up front. The declaration does
// double duty:
// - it is published to callers as a JSON Schema object in the tool listing
// - the very same document is compiled once and checked by the dispatcher
//   before a handler is invoked
//
// Validation is structural only: required fields, primitive types, and no
// undeclared names. Whether a document ID actually exists is the remote
// service's business.

use std::fmt;
use std::sync::Arc;

use jsonschema::{Draft, Validator};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Why a set of arguments does not fit a tool's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("arguments must be an object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("arguments do not match schema: {0}")]
    Mismatch(String),

    #[error("tool schema does not compile: {0}")]
    InvalidSchema(String),
}

// =============================================================================
// PROPERTY TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Integer,
    Boolean,
    Object,
    Array { items: Option<Box<PropertyType>> },
}

impl PropertyType {
    fn schema_name(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Boolean => "boolean",
            PropertyType::Object => "object",
            PropertyType::Array { .. } => "array",
        }
    }

    fn to_json(&self) -> Value {
        match self {
            PropertyType::Array { items: Some(items) } => json!({
                "type": "array",
                "items": items.to_json(),
            }),
            other => json!({ "type": other.schema_name() }),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// PROPERTY DEFINITIONS
// =============================================================================

/// One named argument of a tool.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub prop_type: PropertyType,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
}

impl PropertyDef {
    fn new(name: &str, prop_type: PropertyType) -> Self {
        Self {
            name: name.to_string(),
            prop_type,
            description: None,
            required: false,
            default: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, PropertyType::String)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, PropertyType::Integer)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, PropertyType::Boolean)
    }

    pub fn object(name: &str) -> Self {
        Self::new(name, PropertyType::Object)
    }

    /// A two dimensional array, e.g. spreadsheet rows.
    pub fn rows(name: &str) -> Self {
        Self::new(
            name,
            PropertyType::Array {
                items: Some(Box::new(PropertyType::Array { items: None })),
            },
        )
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn to_json(&self) -> Value {
        let mut schema = self.prop_type.to_json();
        if let Some(obj) = schema.as_object_mut() {
            if let Some(description) = &self.description {
                obj.insert("description".to_string(), json!(description));
            }
            if let Some(default) = &self.default {
                obj.insert("default".to_string(), default.clone());
            }
        }
        schema
    }
}

// =============================================================================
// INPUT SCHEMA
// =============================================================================

fn compile_schema(document: &Value) -> Result<Validator, String> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(document)
        .map_err(|err| err.to_string())
}

#[derive(Clone)]
pub struct InputSchema {
    properties: Vec<PropertyDef>,
    document: Value,
    validator: Result<Arc<Validator>, String>,
}

impl fmt::Debug for InputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSchema")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InputSchema {
    pub fn new(properties: Vec<PropertyDef>) -> Self {
        let document = schema_document(&properties);
        let validator = compile_schema(&document).map(Arc::new);
        Self {
            properties,
            document,
            validator,
        }
    }

    /// JSON Schema form published in the tool listing.
    pub fn to_json(&self) -> Value {
        self.document.clone()
    }

    /// Set when the published document is not a valid JSON Schema.
    pub fn compile_error(&self) -> Option<&str> {
        self.validator.as_ref().err().map(String::as_str)
    }

    /// Checks `arguments` against the schema and fills in declared defaults.
    ///
    /// A missing or `null` argument bag counts as empty, and an explicit `null`
    /// on any field counts as absent.
    pub fn validate(&self, arguments: &Value) -> Result<ToolArguments, ArgumentError> {
        let validator = self
            .validator
            .as_ref()
            .map_err(|e| ArgumentError::InvalidSchema(e.clone()))?;

        let mut values: Map<String, Value> = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            other => return Err(ArgumentError::NotAnObject(json_type_name(other))),
        };

        let instance = Value::Object(values.clone());
        let problems: Vec<String> = validator
            .iter_errors(&instance)
            .map(|error| error.to_string())
            .collect();
        if !problems.is_empty() {
            return Err(ArgumentError::Mismatch(problems.join("; ")));
        }

        for property in &self.properties {
            if let Some(default) = &property.default {
                values
                    .entry(property.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        Ok(ToolArguments { values })
    }
}

fn schema_document(properties: &[PropertyDef]) -> Value {
    let declared: Map<String, Value> = properties
        .iter()
        .map(|p| (p.name.clone(), p.to_json()))
        .collect();

    let required: Vec<&str> = properties
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    let mut schema = json!({
        "type": "object",
        "properties": declared,
        "additionalProperties": false,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

// =============================================================================
// VALIDATED ARGUMENTS
// =============================================================================

/// Arguments that passed schema validation, with defaults filled in.
///
/// Handlers only ever receive this type. The accessors still return `Result`
/// so a handler asking for a field its schema never declared fails cleanly
/// instead of panicking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: Map<String, Value>,
}

impl ToolArguments {
    pub fn str(&self, key: &str) -> Result<&str, ArgumentError> {
        self.opt_str(key)
            .ok_or_else(|| ArgumentError::MissingField(key.to_string()))
    }

    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn int(&self, key: &str) -> Result<i64, ArgumentError> {
        self.opt_int(key)
            .ok_or_else(|| ArgumentError::MissingField(key.to_string()))
    }

    pub fn opt_int(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn bool(&self, key: &str) -> Result<bool, ArgumentError> {
        self.opt_bool(key)
            .ok_or_else(|| ArgumentError::MissingField(key.to_string()))
    }

    pub fn opt_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn opt_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.values.get(key).and_then(Value::as_object)
    }

    /// Raw access for values passed through to the remote API unchanged.
    pub fn value(&self, key: &str) -> Result<&Value, ArgumentError> {
        self.values
            .get(key)
            .ok_or_else(|| ArgumentError::MissingField(key.to_string()))
    }
}
