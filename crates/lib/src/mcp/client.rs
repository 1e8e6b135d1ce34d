//! Protocol client seam: spawn a server process and talk to it over stdio.
//!
//! The manager only sees [`Connector`] and [`ToolSession`]. [`StdioConnector`] is the
//! production implementation on top of rmcp; tests plug in their own.

use std::path::Path;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, Tool as McpTool};
use rmcp::service::{Peer, RoleClient, RunningService, ServiceExt};
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::ClientHandler;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::settings::ServerConfig;
use super::types::{McpError, ToolDescriptor, ToolResult};

/// A live, handshaken connection to one server.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Ask the server for its current tool list.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError>;

    /// Invoke one tool. `args` must be a JSON object or null.
    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, McpError>;

    /// Close the transport and release the process. Later calls fail.
    async fn close(&self) -> Result<(), McpError>;
}

/// Spawns a server and completes the protocol handshake.
#[async_trait]
pub trait Connector: Send + Sync {
    /// `cwd` is the working directory for the spawned process; `config.env` is layered over
    /// the inherited environment.
    async fn connect(
        &self,
        server_name: &str,
        config: &ServerConfig,
        cwd: &Path,
    ) -> Result<Box<dyn ToolSession>, McpError>;
}

/// We only call tools; server-initiated requests get rmcp's defaults.
#[derive(Debug, Clone, Copy, Default)]
struct MinimalClientHandler;

impl ClientHandler for MinimalClientHandler {}

/// Launches servers as child processes and speaks the tool protocol over their stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioConnector;

#[async_trait]
impl Connector for StdioConnector {
    async fn connect(
        &self,
        server_name: &str,
        config: &ServerConfig,
        cwd: &Path,
    ) -> Result<Box<dyn ToolSession>, McpError> {
        log::debug!(
            "launching server '{}': {} {}",
            server_name,
            config.command,
            config.args.join(" ")
        );
        let args = config.args.clone();
        let env = config.env.clone();
        let cwd = cwd.to_path_buf();
        // The child dies with the transport, so a dropped (timed out) handshake leaves no process behind.
        let transport = TokioChildProcess::new(Command::new(&config.command).configure(move |cmd| {
            cmd.args(&args).envs(&env).current_dir(&cwd).kill_on_drop(true);
        }))
        .map_err(|e| McpError::Spawn(e.to_string()))?;

        let service = MinimalClientHandler
            .serve(transport)
            .await
            .map_err(|e| McpError::Handshake(e.to_string()))?;

        Ok(Box::new(StdioSession {
            server_name: server_name.to_string(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        }))
    }
}

struct StdioSession {
    server_name: String,
    /// Cloneable request handle; calls go through it without holding `service`.
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, MinimalClientHandler>>>,
}

#[async_trait]
impl ToolSession for StdioSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let tools = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(tools
            .into_iter()
            .map(|t| descriptor_from_tool(&self.server_name, t))
            .collect())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult, McpError> {
        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(McpError::Protocol(format!(
                    "tool arguments must be an object, got {}",
                    other
                )))
            }
        };
        let result = self
            .peer
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments,
            })
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        let content = match serde_json::to_value(&result.content)
            .map_err(|e| McpError::Protocol(e.to_string()))?
        {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            item => vec![item],
        };
        Ok(ToolResult {
            content,
            is_error: result.is_error,
        })
    }

    async fn close(&self) -> Result<(), McpError> {
        if let Some(service) = self.service.lock().await.take() {
            service
                .cancel()
                .await
                .map_err(|e| McpError::Protocol(format!("cancel failed: {}", e)))?;
        }
        Ok(())
    }
}

fn descriptor_from_tool(server_name: &str, tool: McpTool) -> ToolDescriptor {
    ToolDescriptor {
        server_name: server_name.to_string(),
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: Value::Object((*tool.input_schema).clone()),
    }
}
