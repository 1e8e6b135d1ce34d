//! Tool-provider servers: settings, connection lifecycle, and the per-server tool cache.
//!
//! Servers are external processes spawned from `mcp_settings.json` and spoken to over
//! stdio. The [`ConnectionManager`] owns their connections; the stdio protocol itself
//! sits behind the [`Connector`] / [`ToolSession`] traits.

mod client;
mod manager;
mod settings;
mod types;

pub use client::{Connector, StdioConnector, ToolSession};
pub use manager::ConnectionManager;
pub use settings::{McpSettings, ServerConfig, SettingsStore};
pub use types::{McpError, ServerInfo, ServerStatus, ToolDescriptor, ToolResult};
