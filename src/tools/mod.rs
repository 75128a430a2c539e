//! MCP tool definitions and registry.

pub mod basic_math;
pub mod registry;

pub use registry::{ToolHandler, ToolRegistry};

/// Create a registry with all built-in tools.
pub fn create_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();

    registry.register(
        basic_math::NAME,
        basic_math::DESCRIPTION,
        basic_math::input_schema(),
        basic_math::handle,
    );

    registry
}
