//! Tool registry.
//!
//! Stores tools by validated name in registration order, dispatches execution,
//! and keeps each tool's last sources. A registry is cheap to clone (tools are
//! shared behind `Arc`), so every request can own one and source state never
//! leaks between concurrent queries.

use super::{Source, Tool, ToolArgs, ToolDescriptor, ToolError};
use crate::error::{Result, SyllabusError};
use indexmap::IndexMap;
use serde_json::Value;
use std::borrow::Borrow;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A tool name accepted by model providers: 1-64 ASCII letters, digits,
/// `_` or `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolName(String);

impl ToolName {
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(SyllabusError::Tool(
                "Tool must have a 'name' in its descriptor".to_string(),
            ));
        }
        if name.len() > 64
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(SyllabusError::Tool(format!("Invalid tool name '{}'", name)));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ToolName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
struct Entry {
    tool: Arc<dyn Tool>,
    descriptor: ToolDescriptor,
    last_sources: Vec<Source>,
}

/// Registry of available tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<ToolName, Entry>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under the name from its descriptor.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let descriptor = tool.describe();
        let name = ToolName::parse(&descriptor.name)?;
        if self.tools.contains_key(&name) {
            return Err(SyllabusError::Tool(format!(
                "Tool '{}' is already registered",
                name
            )));
        }

        info!("Registered tool: {}", name);
        self.tools.insert(
            name,
            Entry {
                tool,
                descriptor,
                last_sources: Vec::new(),
            },
        );
        Ok(())
    }

    /// Builder-style registration.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Result<Self> {
        self.register(Arc::new(tool))?;
        Ok(self)
    }

    /// Descriptors of all tools, in registration order.
    pub fn describe_all(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|e| e.descriptor.clone()).collect()
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(ToolName::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name. Every outcome is rendered as text.
    #[instrument(skip(self, input))]
    pub async fn execute(&mut self, name: &str, input: &Value) -> String {
        let available = self.names().join(", ");
        let Some(entry) = self.tools.get_mut(name) else {
            debug!("Model requested unknown tool '{}'", name);
            return format!("Tool '{}' not found. Available tools: {}.", name, available);
        };

        let result = match ToolArgs::from_value(input) {
            Ok(args) => entry.tool.execute(&args).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => {
                if let Some(sources) = output.sources {
                    entry.last_sources = sources;
                }
                output.content
            }
            Err(ToolError::MissingParameter(detail)) => format!(
                "Error: Missing required parameter for tool '{}'. {}",
                name, detail
            ),
            Err(ToolError::InvalidValue(detail)) => format!(
                "Error: Invalid parameter value for tool '{}': {}",
                name, detail
            ),
            Err(ToolError::Failed(detail)) => {
                format!("Unexpected error in tool '{}': {}", name, detail)
            }
        }
    }

    /// The first non-empty source list, scanning tools in registration order.
    pub fn last_sources(&self) -> Vec<Source> {
        self.tools
            .values()
            .find(|e| !e.last_sources.is_empty())
            .map(|e| e.last_sources.clone())
            .unwrap_or_default()
    }

    /// Clear every tool's sources.
    pub fn reset_sources(&mut self) {
        for entry in self.tools.values_mut() {
            entry.last_sources.clear();
        }
    }
}
