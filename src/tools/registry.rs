//! Tool registry for dynamic tool registration.

use crate::error::ToolResult;
use crate::protocol::{Arguments, Tool};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A tool implementation: a pure function of its arguments.
///
/// The input schema is never checked before `call`; handlers validate their
/// own arguments.
pub trait ToolHandler: Send + Sync {
    fn call(&self, arguments: &Arguments) -> ToolResult<Value>;
}

impl<F> ToolHandler for F
where
    F: Fn(&Arguments) -> ToolResult<Value> + Send + Sync,
{
    fn call(&self, arguments: &Arguments) -> ToolResult<Value> {
        self(arguments)
    }
}

struct RegisteredTool {
    definition: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Name-keyed tool table. Registration happens before traffic starts;
/// lookups are lock-free reads afterwards.
pub struct ToolRegistry {
    tools: DashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    /// Register a tool. A second registration under the same name replaces
    /// the first.
    pub fn register<H: ToolHandler + 'static>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: H,
    ) {
        let name = name.into();
        debug!("Registering tool: {}", name);
        let definition = Tool {
            name: name.clone(),
            description: description.into(),
            input_schema,
        };
        self.tools.insert(
            name,
            RegisteredTool {
                definition,
                handler: Arc::new(handler),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|r| Arc::clone(&r.handler))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool metadata in no particular order.
    pub fn list(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|r| r.value().definition.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
