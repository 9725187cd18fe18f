//! Retrieval tools the language model can call.
//!
//! Each tool describes itself with a [`ToolDescriptor`] (the exact wire shape
//! sent to the model provider) and executes against named JSON arguments.
//! Execution never fails outward with a panic or a transport error: a tool
//! either returns a [`ToolOutput`] whose text the model can read, or a
//! [`ToolError`] that the [`ToolRegistry`] renders into text.

mod outline;
mod registry;
mod search;

pub use outline::{CourseOutline, CourseOutlineTool, OutlineLesson};
pub use registry::{ToolName, ToolRegistry};
pub use search::CourseSearchTool;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A tool the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Describe the tool. Pure and deterministic.
    fn describe(&self) -> ToolDescriptor;

    /// Run the tool with the model-supplied arguments.
    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError>;
}

/// Tool description in the provider's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    /// Start a descriptor with no parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: InputSchema::default(),
        }
    }

    /// Add a parameter. Parameter order is preserved.
    pub fn param(
        mut self,
        name: &str,
        param_type: ParamType,
        description: &str,
        required: bool,
    ) -> Self {
        self.input_schema.properties.insert(
            name.to_string(),
            PropertySchema {
                property_type: param_type,
                description: description.to_string(),
            },
        );
        if required && !self.input_schema.required.iter().any(|r| r == name) {
            self.input_schema.required.push(name.to_string());
        }
        self
    }
}

/// JSON schema of a tool's input object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    /// Always `"object"`.
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: IndexMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: IndexMap::new(),
            required: Vec::new(),
        }
    }
}

/// Schema of a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub property_type: ParamType,
    pub description: String,
}

/// JSON schema primitive types used by tool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

/// A citation string identifying where retrieved content came from,
/// e.g. `"Python Fundamentals - Lesson 2"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Source(String);

impl Source {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Source {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<&str> for Source {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Text handed back to the model.
    pub content: String,
    /// Replacement for the tool's last sources. `None` leaves them untouched.
    pub sources: Option<Vec<Source>>,
}

impl ToolOutput {
    /// Text output that does not touch the tool's sources.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: None,
        }
    }

    /// Text output that replaces the tool's sources.
    pub fn with_sources(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            content: content.into(),
            sources: Some(sources),
        }
    }
}

/// Failure classes the registry renders distinctly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("{0}")]
    MissingParameter(String),

    #[error("{0}")]
    InvalidValue(String),

    #[error("{0}")]
    Failed(String),
}

/// Named arguments supplied by the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(serde_json::Map<String, Value>);

impl ToolArgs {
    /// Wrap a JSON object. `null` is treated as no arguments.
    pub fn from_value(value: &Value) -> Result<Self, ToolError> {
        match value {
            Value::Object(map) => Ok(Self(map.clone())),
            Value::Null => Ok(Self::default()),
            other => Err(ToolError::InvalidValue(format!(
                "tool input must be an object, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Raw argument; JSON `null` counts as absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// A required string argument.
    pub fn required_str(&self, name: &str) -> Result<&str, ToolError> {
        match self.get(name) {
            None => Err(ToolError::MissingParameter(format!(
                "missing required argument '{}'",
                name
            ))),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ToolError::InvalidValue(format!(
                "'{}' must be a string, got {}",
                name,
                json_type_name(other)
            ))),
        }
    }
}

impl From<serde_json::Map<String, Value>> for ToolArgs {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Name of a JSON value's type, for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
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

/// Render a metadata value without JSON quoting.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
