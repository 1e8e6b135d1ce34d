//! Initialize the configuration directory: create ~/.tether, default config, empty server settings, and the skill root.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

const EMPTY_SETTINGS: &str = "{\n  \"mcpServers\": {}\n}\n";

/// Ensure the configuration directory has been initialized (config file and skills directory exist).
pub fn require_initialized(config_path: &Path, config: &config::Config) -> Result<()> {
    if !config_path.exists() {
        anyhow::bail!(
            "configuration not initialized; run `tether init` first (config file not found: {})",
            config_path.display()
        );
    }
    let skills_dir = config::resolve_skills_dir(config, config_path);
    if !skills_dir.exists() {
        anyhow::bail!(
            "configuration not initialized; run `tether init` first (skills directory not found: {})",
            skills_dir.display()
        );
    }
    Ok(())
}

/// Load the config and fail with a "run `tether init` first" error when the layout is missing.
pub fn load_initialized(config_path: Option<PathBuf>) -> Result<(config::Config, PathBuf)> {
    let (config, path) = config::load_config(config_path)?;
    require_initialized(&path, &config)?;
    Ok((config, path))
}

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Writes `mcp_settings.json` with an empty `mcpServers` map if missing.
/// - Creates the `skills` subdirectory if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (config, _) = config::load_config(Some(config_path.to_path_buf()))?;

    let settings_path = config::resolve_settings_path(&config, config_path);
    if !settings_path.exists() {
        if let Some(parent) = settings_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating settings directory {}", parent.display()))?;
        }
        std::fs::write(&settings_path, EMPTY_SETTINGS)
            .with_context(|| format!("writing server settings to {}", settings_path.display()))?;
        log::info!("created server settings at {}", settings_path.display());
    }

    let skills_dir = config::resolve_skills_dir(&config, config_path);
    if !skills_dir.exists() {
        std::fs::create_dir_all(&skills_dir)
            .with_context(|| format!("creating skills directory {}", skills_dir.display()))?;
        log::info!("created skills directory at {}", skills_dir.display());
    } else {
        log::debug!("skills directory already exists at {}, skipping", skills_dir.display());
    }

    Ok(config_dir.to_path_buf())
}
