//! TOML configuration file loading
//!
//! Supports `~/.config/thing-binding/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfigFile {
    /// Binding instance ID
    pub binding_id: Option<String>,

    /// Bus connection
    #[serde(default)]
    pub bus: BusFileConfig,

    /// Device gateway connection
    #[serde(default)]
    pub gateway: GatewayFileConfig,

    /// Heartbeat timing
    #[serde(default)]
    pub intervals: IntervalsFileConfig,
}

/// Message bus configuration
#[derive(Debug, Default, Deserialize)]
pub struct BusFileConfig {
    /// Bus address ("local" for the in-process bus)
    pub address: Option<String>,
}

/// Device gateway configuration
#[derive(Debug, Default, Deserialize)]
pub struct GatewayFileConfig {
    /// Gateway address (e.g. "file:///var/lib/gateway/nodes.json")
    pub address: Option<String>,

    pub login_name: Option<String>,

    pub password: Option<String>,
}

/// Interval configuration, all in seconds
#[derive(Debug, Default, Deserialize)]
pub struct IntervalsFileConfig {
    /// Description re-announcement interval
    pub td: Option<u32>,

    /// Gateway poll interval
    pub poll: Option<u32>,

    /// Maximum age of an unchanged value before it is republished
    pub republish: Option<u32>,

    /// Delays between forced refreshes after an action
    pub refresh_delays: Option<Vec<u64>>,
}

/// Load the TOML config file from the standard path
///
/// Returns `BindingConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> BindingConfigFile {
    let Some(path) = config_file_path() else {
        return BindingConfigFile::default();
    };

    if !path.exists() {
        return BindingConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            BindingConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<BindingConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/thing-binding/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("thing-binding").join("config.toml"))
}
