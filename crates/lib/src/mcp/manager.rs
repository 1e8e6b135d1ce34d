//! Connection manager: named server configs -> live connections + per-server tool cache.
//!
//! One explicit instance per settings file, shared by reference (`Arc<ConnectionManager>`).
//! Reconnect is always teardown then connect; a live connection is never mutated in place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use super::client::{Connector, StdioConnector, ToolSession};
use super::settings::{ServerConfig, SettingsStore};
use super::types::{McpError, ServerInfo, ServerStatus, ToolDescriptor, ToolResult};
use crate::config::{self, Config, DEFAULT_CONNECT_TIMEOUT_MS};

const DISABLED_MESSAGE: &str = "Server is disabled";

/// State of one server. `session` is set only while `status` is `Connected`.
/// `attempt` identifies the `connect_server` call that owns the entry; a call only
/// ever writes to an entry carrying its own attempt.
struct ServerConnection {
    attempt: u64,
    status: ServerStatus,
    error: Option<String>,
    session: Option<Arc<dyn ToolSession>>,
}

impl ServerConnection {
    fn new(attempt: u64, status: ServerStatus) -> Self {
        Self {
            attempt,
            status,
            error: None,
            session: None,
        }
    }
}

/// Owns every server connection and the tool cache built from them.
pub struct ConnectionManager {
    settings: Mutex<SettingsStore>,
    connections: RwLock<HashMap<String, ServerConnection>>,
    tools: RwLock<HashMap<String, Vec<ToolDescriptor>>>,
    connector: Arc<dyn Connector>,
    project_root: PathBuf,
    connect_timeout: Duration,
    next_attempt: AtomicU64,
}

impl ConnectionManager {
    /// Manager over the settings file at `settings_path`, spawning servers in `project_root`.
    pub fn new(
        settings_path: impl Into<PathBuf>,
        project_root: impl Into<PathBuf>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            settings: Mutex::new(SettingsStore::new(settings_path)),
            connections: RwLock::new(HashMap::new()),
            tools: RwLock::new(HashMap::new()),
            connector,
            project_root: project_root.into(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            next_attempt: AtomicU64::new(1),
        }
    }

    /// Manager with the stdio connector and paths resolved from the application config.
    pub fn from_config(config: &Config, config_path: &Path) -> Self {
        Self::new(
            config::resolve_settings_path(config, config_path),
            config::resolve_project_root(config, config_path),
            Arc::new(StdioConnector),
        )
        .with_connect_timeout(config::connect_timeout(config))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub async fn settings_path(&self) -> PathBuf {
        self.settings.lock().await.path().to_path_buf()
    }

    /// Load settings (missing or corrupt file => empty) and connect every server in file order.
    /// Each attempt finishes (connected, error, or timeout) before the next one starts.
    pub async fn initialize(&self) {
        let servers: Vec<(String, ServerConfig)> = {
            let mut settings = self.settings.lock().await;
            settings
                .load()
                .await
                .mcp_servers
                .iter()
                .map(|(name, config)| (name.clone(), config.clone()))
                .collect()
        };
        log::info!("connecting {} configured server(s)", servers.len());
        for (name, config) in servers {
            self.connect_server(&name, &config).await;
        }
    }

    /// Bring `name` to the state `config` implies. Any existing connection is torn down first.
    /// When a newer call for the same name overtakes this one, this call's outcome is dropped
    /// (and its session closed) instead of overwriting the newer state.
    pub async fn connect_server(&self, name: &str, config: &ServerConfig) {
        self.disconnect_server(name).await;
        let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed);

        if config.disabled {
            let mut conn = ServerConnection::new(attempt, ServerStatus::Disabled);
            conn.error = Some(DISABLED_MESSAGE.to_string());
            self.record(name, conn).await;
            log::debug!("server '{}' is disabled, not spawning", name);
            return;
        }

        self.record(name, ServerConnection::new(attempt, ServerStatus::Connecting))
            .await;

        let outcome = tokio::time::timeout(
            self.connect_timeout,
            self.connector.connect(name, config, &self.project_root),
        )
        .await;
        let session: Arc<dyn ToolSession> = match outcome {
            Ok(Ok(session)) => Arc::from(session),
            Ok(Err(e)) => {
                log::warn!("failed to connect to server '{}': {}", name, e);
                self.fail(name, attempt, e.to_string()).await;
                return;
            }
            Err(_) => {
                let e = McpError::Timeout {
                    ms: self.connect_timeout.as_millis(),
                };
                log::warn!("failed to connect to server '{}': {}", name, e);
                self.fail(name, attempt, e.to_string()).await;
                return;
            }
        };

        let stored = {
            let mut connections = self.connections.write().await;
            match connections.get_mut(name) {
                Some(conn) if conn.attempt == attempt && conn.status == ServerStatus::Connecting => {
                    conn.status = ServerStatus::Connected;
                    conn.error = None;
                    conn.session = Some(Arc::clone(&session));
                    true
                }
                _ => false,
            }
        };
        if !stored {
            log::debug!("server '{}' was torn down or replaced during connect, closing", name);
            close_session(name, session).await;
            return;
        }

        let tools = match session.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                log::warn!("failed to list tools for server '{}': {}", name, e);
                Vec::new()
            }
        };

        // Cache only while this session is still the live connection.
        let connections = self.connections.read().await;
        let live = matches!(
            connections.get(name),
            Some(ServerConnection {
                attempt: a,
                status: ServerStatus::Connected,
                session: Some(current),
                ..
            }) if *a == attempt && Arc::ptr_eq(current, &session)
        );
        if !live {
            log::debug!("server '{}' went away while listing tools, dropping them", name);
            return;
        }
        log::info!("connected to server '{}' with {} tools", name, tools.len());
        self.tools.write().await.insert(name.to_string(), tools);
    }

    /// Close and forget the connection and tool cache for `name`. No-op when absent.
    pub async fn disconnect_server(&self, name: &str) {
        let removed = {
            let mut connections = self.connections.write().await;
            self.tools.write().await.remove(name);
            connections.remove(name)
        };
        if let Some(session) = removed.and_then(|c| c.session) {
            close_session(name, session).await;
            log::info!("disconnected from server '{}'", name);
        }
    }

    /// Tear down and connect again from the persisted config. Caller-initiated retry.
    pub async fn reconnect_server(&self, name: &str) -> Result<ServerInfo> {
        let config = self
            .settings
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| McpError::UnknownServer(name.to_string()))?;
        self.connect_server(name, &config).await;
        Ok(self.server_info(name, config).await)
    }

    /// Add (or replace) a server, persist, and connect it.
    pub async fn add_server(&self, name: &str, config: ServerConfig) -> Result<ServerInfo> {
        self.settings.lock().await.add(name, config.clone()).await?;
        self.connect_server(name, &config).await;
        Ok(self.server_info(name, config).await)
    }

    /// Remove a server from settings, persist, and disconnect it. False when the name is unknown.
    pub async fn remove_server(&self, name: &str) -> Result<bool> {
        let removed = self.settings.lock().await.remove(name).await?;
        self.disconnect_server(name).await;
        Ok(removed)
    }

    /// Flip the `disabled` flag, persist, then disconnect-and-mark-disabled or connect.
    pub async fn toggle_server(&self, name: &str, disabled: bool) -> Result<ServerInfo> {
        let config = self
            .settings
            .lock()
            .await
            .set_disabled(name, disabled)
            .await?
            .ok_or_else(|| McpError::UnknownServer(name.to_string()))?;
        self.connect_server(name, &config).await;
        Ok(self.server_info(name, config).await)
    }

    /// Last-known state of every configured server, in settings order. Does not query servers.
    pub async fn get_servers(&self) -> Vec<ServerInfo> {
        let servers: Vec<(String, ServerConfig)> = {
            let settings = self.settings.lock().await;
            settings
                .servers()
                .iter()
                .map(|(n, c)| (n.clone(), c.clone()))
                .collect()
        };
        let mut out = Vec::with_capacity(servers.len());
        for (name, config) in servers {
            out.push(self.server_info(&name, config).await);
        }
        out
    }

    pub async fn get_server(&self, name: &str) -> Option<ServerInfo> {
        let config = self.settings.lock().await.get(name).cloned()?;
        Some(self.server_info(name, config).await)
    }

    /// Cached tools of every connected server, in settings order. No live re-query.
    pub async fn get_all_tools(&self) -> Vec<ToolDescriptor> {
        let names: Vec<String> = self.settings.lock().await.servers().keys().cloned().collect();
        let connections = self.connections.read().await;
        let tools = self.tools.read().await;
        let connected = |name: &String| {
            connections
                .get(name)
                .is_some_and(|c| c.status == ServerStatus::Connected)
        };
        let mut out: Vec<ToolDescriptor> = names
            .iter()
            .filter(|n| connected(*n))
            .filter_map(|n| tools.get(n))
            .flatten()
            .cloned()
            .collect();
        // Servers connected directly through connect_server without a settings entry.
        for (name, list) in tools.iter() {
            if !names.contains(name) && connected(name) {
                out.extend(list.iter().cloned());
            }
        }
        out
    }

    /// Call a tool on a connected server. Never fails: problems come back as `is_error: true`.
    pub async fn call_tool(&self, server_name: &str, tool_name: &str, args: Value) -> ToolResult {
        let session = {
            let connections = self.connections.read().await;
            match connections.get(server_name) {
                Some(ServerConnection {
                    status: ServerStatus::Connected,
                    session: Some(session),
                    ..
                }) => Arc::clone(session),
                _ => {
                    return ToolResult::error(
                        McpError::NotConnected(server_name.to_string()).to_string(),
                    )
                }
            }
        };
        log::debug!("calling tool '{}' on server '{}'", tool_name, server_name);
        match session.call_tool(tool_name, args).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(format!(
                "error calling tool '{}' on server '{}': {}",
                tool_name, server_name, e
            )),
        }
    }

    /// Close every connection (continuing past failures) and clear all state.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, ServerConnection)> = {
            let mut connections = self.connections.write().await;
            self.tools.write().await.clear();
            connections.drain().collect()
        };
        for (name, conn) in drained {
            if let Some(session) = conn.session {
                close_session(&name, session).await;
            }
        }
        log::info!("all server connections closed");
    }

    async fn server_info(&self, name: &str, config: ServerConfig) -> ServerInfo {
        let (status, error) = match self.connections.read().await.get(name) {
            Some(conn) => (conn.status, conn.error.clone()),
            None => (ServerStatus::Disconnected, None),
        };
        let tools = match status {
            ServerStatus::Connected => self
                .tools
                .read()
                .await
                .get(name)
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        ServerInfo {
            name: name.to_string(),
            config,
            status,
            error,
            tools,
        }
    }

    /// Install `conn` as the entry for `name`, dropping cached tools. A displaced live
    /// session is closed.
    async fn record(&self, name: &str, conn: ServerConnection) {
        let displaced = {
            let mut connections = self.connections.write().await;
            let prev = connections
                .get(name)
                .map(|c| c.status)
                .unwrap_or(ServerStatus::Disconnected);
            if !prev.can_transition_to(conn.status) {
                log::debug!(
                    "server '{}': unexpected transition {} -> {}",
                    name,
                    prev,
                    conn.status
                );
            }
            self.tools.write().await.remove(name);
            connections.insert(name.to_string(), conn)
        };
        if let Some(session) = displaced.and_then(|c| c.session) {
            close_session(name, session).await;
        }
    }

    /// Mark this attempt failed, unless a newer attempt or a teardown owns the entry by now.
    async fn fail(&self, name: &str, attempt: u64, message: String) {
        let mut connections = self.connections.write().await;
        match connections.get_mut(name) {
            Some(conn) if conn.attempt == attempt => {
                conn.status = ServerStatus::Error;
                conn.error = Some(message);
                conn.session = None;
                self.tools.write().await.remove(name);
            }
            _ => log::debug!(
                "server '{}': dropping stale connect failure: {}",
                name,
                message
            ),
        }
    }
}

async fn close_session(name: &str, session: Arc<dyn ToolSession>) {
    if let Err(e) = session.close().await {
        log::warn!("error closing connection to server '{}': {}", name, e);
    }
}
