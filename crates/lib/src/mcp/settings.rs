//! Settings store: the JSON document listing named tool-provider servers.
//!
//! Shape: `{ "mcpServers": { "<name>": { "command", "args"?, "env"?, "disabled"? } } }`.
//! Entries keep file order. Every mutation is written back immediately. There is no
//! file locking; one store per settings path.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// How to launch one tool-provider server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Overrides applied on top of the inherited process environment.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// Root of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpSettings {
    #[serde(default)]
    pub mcp_servers: IndexMap<String, ServerConfig>,
}

/// Loads and persists [`McpSettings`] at a fixed path.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: McpSettings,
}

impl SettingsStore {
    /// Empty store bound to `path`; nothing is read until [`SettingsStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: McpSettings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings file. A missing or unparsable file leaves an empty configuration; never fails.
    pub async fn load(&mut self) -> &McpSettings {
        self.settings = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => match serde_json::from_str::<McpSettings>(&s) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!(
                        "settings file {} is not valid, starting empty: {}",
                        self.path.display(),
                        e
                    );
                    McpSettings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("settings file not found, starting empty: {}", self.path.display());
                McpSettings::default()
            }
            Err(e) => {
                log::warn!("reading settings from {}: {}", self.path.display(), e);
                McpSettings::default()
            }
        };
        &self.settings
    }

    /// Write the current settings as pretty JSON, creating parent directories.
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating settings directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.settings).context("serializing settings")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("writing settings to {}", self.path.display()))
    }

    pub fn settings(&self) -> &McpSettings {
        &self.settings
    }

    pub fn servers(&self) -> &IndexMap<String, ServerConfig> {
        &self.settings.mcp_servers
    }

    pub fn get(&self, name: &str) -> Option<&ServerConfig> {
        self.settings.mcp_servers.get(name)
    }

    /// Insert or replace a server and persist. A replaced entry keeps its position.
    pub async fn add(&mut self, name: &str, config: ServerConfig) -> Result<()> {
        self.settings.mcp_servers.insert(name.to_string(), config);
        self.save().await
    }

    /// Remove a server and persist. Returns false (and writes nothing) when the name is unknown.
    pub async fn remove(&mut self, name: &str) -> Result<bool> {
        if self.settings.mcp_servers.shift_remove(name).is_none() {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    /// Set the `disabled` flag and persist. Returns the updated config, or None for an unknown name.
    pub async fn set_disabled(&mut self, name: &str, disabled: bool) -> Result<Option<ServerConfig>> {
        let Some(entry) = self.settings.mcp_servers.get_mut(name) else {
            return Ok(None);
        };
        entry.disabled = disabled;
        let updated = entry.clone();
        self.save().await?;
        Ok(Some(updated))
    }
}
