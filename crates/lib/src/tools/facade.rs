//! Aggregated tool listing and one call entry point over the connection manager.
//!
//! Tools are exposed to the model under qualified names `<server>__<tool>`, so two
//! servers may advertise the same tool name.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::{ConnectionManager, ToolDescriptor, ToolResult};

pub const QUALIFIED_SEPARATOR: &str = "__";

/// One tool in function-calling shape (`{"type":"function","function":{...}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub typ: String,
    pub function: ToolFunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

pub fn qualified_name(server_name: &str, tool_name: &str) -> String {
    format!("{}{}{}", server_name, QUALIFIED_SEPARATOR, tool_name)
}

/// Split `<server>__<tool>` at the first separator. None when either side is empty.
pub fn split_qualified_name(name: &str) -> Option<(&str, &str)> {
    let (server, tool) = name.split_once(QUALIFIED_SEPARATOR)?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}

impl From<&ToolDescriptor> for ToolDefinition {
    fn from(t: &ToolDescriptor) -> Self {
        ToolDefinition {
            typ: "function".to_string(),
            function: ToolFunctionDefinition {
                name: qualified_name(&t.server_name, &t.name),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        }
    }
}

/// What the chat layer holds to list and call tools.
#[derive(Clone)]
pub struct McpToolset {
    manager: Arc<ConnectionManager>,
}

impl McpToolset {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Cached descriptors across all servers.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.manager.get_all_tools().await
    }

    /// Cached descriptors as function-calling definitions with qualified names.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.list_tools()
            .await
            .iter()
            .map(ToolDefinition::from)
            .collect()
    }

    pub async fn call(&self, server_name: &str, tool_name: &str, args: Value) -> ToolResult {
        self.manager.call_tool(server_name, tool_name, args).await
    }

    /// Call by qualified name. A malformed name is an error result, like every other failure here.
    pub async fn call_qualified(&self, name: &str, args: Value) -> ToolResult {
        match split_qualified_name(name) {
            Some((server, tool)) => self.call(server, tool, args).await,
            None => ToolResult::error(format!(
                "invalid tool name '{}': expected <server>{}<tool>",
                name, QUALIFIED_SEPARATOR
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_split_at_first_separator() {
        assert_eq!(qualified_name("fs", "read_file"), "fs__read_file");
        assert_eq!(split_qualified_name("fs__read_file"), Some(("fs", "read_file")));
        assert_eq!(split_qualified_name("fs__a__b"), Some(("fs", "a__b")));
        assert_eq!(split_qualified_name("read_file"), None);
        assert_eq!(split_qualified_name("__tool"), None);
        assert_eq!(split_qualified_name("fs__"), None);
    }

    #[test]
    fn descriptor_converts_to_function_definition() {
        let d = ToolDescriptor {
            server_name: "git".to_string(),
            name: "status".to_string(),
            description: Some("Show status".to_string()),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        };
        let def = ToolDefinition::from(&d);
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "git__status");
        assert_eq!(json["function"]["description"], "Show status");
        assert_eq!(json["function"]["parameters"]["type"], "object");
    }
}
