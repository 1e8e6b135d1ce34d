//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.tether/config.json`). It only says where
//! things live: the skill root, the tool-provider settings file, and the project root
//! that spawned servers run in. The server list itself lives in the settings file
//! (see `mcp::settings`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Skill root override.
    #[serde(default)]
    pub skills: SkillsConfig,

    /// Tool-provider server settings location and connection options.
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Skills load config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillsConfig {
    /// Override the default skill root. Relative paths are resolved against the config file's parent.
    /// Omit or leave empty to use the default (~/.tether/skills when config is ~/.tether/config.json).
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Tool-provider connection config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpConfig {
    /// Path of the JSON settings file holding `mcpServers`. Default: `mcp_settings.json` next to the config file.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,

    /// Working directory for spawned servers. Default: the current directory.
    #[serde(default)]
    pub project_root: Option<PathBuf>,

    /// Handshake timeout in milliseconds (default 15000).
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 15_000;

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TETHER_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".tether").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the default path (or TETHER_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving the config directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn resolve_against(config_path: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        config_parent(config_path).join(p)
    }
}

/// Default skill root when no override is set: `skills` subdirectory of the config file's parent.
pub fn skills_dir(config_path: &Path) -> PathBuf {
    config_parent(config_path).join("skills")
}

/// Resolve the skill root: uses `config.skills.directory` if set (relative paths resolved against the config file's parent), otherwise the default `skills` subdirectory.
pub fn resolve_skills_dir(config: &Config, config_path: &Path) -> PathBuf {
    match &config.skills.directory {
        Some(d) if !d.as_os_str().is_empty() => resolve_against(config_path, d),
        _ => skills_dir(config_path),
    }
}

/// Resolve the tool-provider settings file: `config.mcp.settingsPath` or `mcp_settings.json` next to the config file.
pub fn resolve_settings_path(config: &Config, config_path: &Path) -> PathBuf {
    match &config.mcp.settings_path {
        Some(p) if !p.as_os_str().is_empty() => resolve_against(config_path, p),
        _ => config_parent(config_path).join("mcp_settings.json"),
    }
}

/// Working directory handed to every spawned server.
pub fn resolve_project_root(config: &Config, config_path: &Path) -> PathBuf {
    match &config.mcp.project_root {
        Some(p) if !p.as_os_str().is_empty() => resolve_against(config_path, p),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

pub fn connect_timeout(config: &Config) -> Duration {
    Duration::from_millis(
        config
            .mcp
            .connect_timeout_ms
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
    )
}
