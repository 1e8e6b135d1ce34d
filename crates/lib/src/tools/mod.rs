//! Tool layer: aggregated listing and calls over connected tool-provider servers.

mod facade;

pub use facade::{
    qualified_name, split_qualified_name, McpToolset, ToolDefinition, ToolFunctionDefinition,
    QUALIFIED_SEPARATOR,
};
