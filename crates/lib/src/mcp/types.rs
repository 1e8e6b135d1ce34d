//! Shared types for tool-provider connections: status, tool descriptors, call results, errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::settings::ServerConfig;

/// Connection status of one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Connected,
    Connecting,
    Disconnected,
    Error,
    Disabled,
}

impl ServerStatus {
    /// Whether `self -> next` is an edge of the connection state machine.
    ///
    /// `disconnected -> connecting -> {connected, error}`; anything but `connecting` may be
    /// disabled; `disabled` and `error` may start connecting again; every state may drop to
    /// `disconnected`.
    pub fn can_transition_to(self, next: ServerStatus) -> bool {
        use ServerStatus::*;
        match (self, next) {
            (_, Disconnected) => true,
            (Connecting, Connected) | (Connecting, Error) => true,
            (Disconnected, Connecting)
            | (Disabled, Connecting)
            | (Error, Connecting)
            | (Connected, Connecting) => true,
            (Connected, Disabled) | (Error, Disabled) | (Disconnected, Disabled) => true,
            (Disabled, Disabled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServerStatus::Connected => "connected",
            ServerStatus::Connecting => "connecting",
            ServerStatus::Disconnected => "disconnected",
            ServerStatus::Error => "error",
            ServerStatus::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool advertised by a connected server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub server_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Result of a tool call. `content` items are forwarded as the server sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    /// Failure carrying a single text content item.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![serde_json::json!({ "type": "text", "text": message.into() })],
            is_error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error == Some(true)
    }

    /// Concatenated `text` of all text content items.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Last-known view of one configured server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub config: ServerConfig,
    pub status: ServerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tools: Vec<ToolDescriptor>,
}

/// Connection-level failures.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("failed to spawn server process: {0}")]
    Spawn(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("Connection timed out after {ms}ms")]
    Timeout { ms: u128 },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("server '{0}' is not connected")]
    NotConnected(String),
    #[error("unknown server '{0}'")]
    UnknownServer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_machine_edges() {
        use ServerStatus::*;
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(Error));
        assert!(Connected.can_transition_to(Disabled));
        assert!(Disabled.can_transition_to(Connecting));
        assert!(Error.can_transition_to(Disconnected));

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disabled.can_transition_to(Connected));
        assert!(!Connecting.can_transition_to(Disabled));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ServerStatus::Disabled).unwrap(), r#""disabled""#);
        assert_eq!(ServerStatus::Error.to_string(), "error");
    }

    #[test]
    fn timeout_message_names_the_limit() {
        let e = McpError::Timeout { ms: 15000 };
        assert_eq!(e.to_string(), "Connection timed out after 15000ms");
    }

    #[test]
    fn error_result_is_single_text_item() {
        let r = ToolResult::error("boom");
        assert!(r.is_error());
        assert_eq!(r.content.len(), 1);
        assert_eq!(r.text(), "boom");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["isError"], Value::Bool(true));
    }
}
