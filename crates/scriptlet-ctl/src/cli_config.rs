//! Engine config discovery for `.scriptlet.toml`.
//!
//! An explicit `--config` path must load. Otherwise two locations are checked
//! in precedence order, falling back to defaults:
//! 1. `./.scriptlet.toml` (project-local)
//! 2. `~/.config/scriptlet.toml` (user-global)

use std::path::{Path, PathBuf};

use scriptlet::{ConfigError, EngineConfig};

const CONFIG_FILENAME: &str = ".scriptlet.toml";
const GLOBAL_CONFIG_DIR: &str = ".config";
const GLOBAL_CONFIG_FILENAME: &str = "scriptlet.toml";

/// Resolve the engine config for this invocation.
pub(crate) fn load_engine_config(explicit: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    if let Some(path) = explicit {
        let config = EngineConfig::load(path)?;
        tracing::debug!(?path, "Loaded engine config");
        return Ok(config);
    }
    Ok(discover_engine_config())
}

fn discover_engine_config() -> EngineConfig {
    if let Some(path) = find_config_file() {
        match EngineConfig::load(&path) {
            Ok(config) => {
                tracing::debug!(?path, "Loaded engine config");
                return config;
            }
            Err(e) => {
                tracing::warn!(?path, error = %e, "Failed to load engine config, using defaults");
            }
        }
    }
    EngineConfig::default()
}

/// Search for config file in precedence order.
fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.is_file() {
        return Some(local);
    }

    if let Some(home) = home_dir() {
        let global = home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILENAME);
        if global.is_file() {
            return Some(global);
        }
    }

    None
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
