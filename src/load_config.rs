//! Assembles the startup [`ServerConfig`] from command-line/env values and an optional YAML file.
//!
//! The YAML file only carries pipeline settings (`build:` section); listening port and route
//! prefix always come from the command line or their environment fallbacks (`PORT`,
//! `HTTP_PREFIX`). All failures are `anyhow` errors surfaced at the CLI boundary.
//!
//! Accepted file shape:
//!
//! ```yaml
//! build:
//!   bucket: my-bucket
//!   release_prefix: sceneformat/releases
//!   max_concurrent_builds: 2
//! ```

use crate::config::{BuildSettings, ServerConfig};
use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    build: BuildSettings,
}

/// Loads the optional YAML file and merges it with the already-parsed prefix and port.
pub fn load_config(config_path: Option<&Path>, http_prefix: &str, port: u16) -> Result<ServerConfig> {
    let build = match config_path {
        Some(path) => load_build_settings(path)?,
        None => {
            info!("No config file given, using default build settings");
            BuildSettings::default()
        }
    };

    let http_prefix = normalize_prefix(http_prefix)?;
    let build = validate_build_settings(build)?;

    let config = ServerConfig {
        http_prefix,
        port,
        build,
    };
    config.trace_loaded();
    Ok(config)
}

fn load_build_settings(path: &Path) -> Result<BuildSettings> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => {
            info!(config_path = ?path, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&content) {
        Ok(raw) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            raw
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(raw.build)
}

/// Brings a route prefix into the `""` / `"/segment..."` form the router expects.
pub fn normalize_prefix(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if let Some(bad) = trimmed
        .chars()
        .find(|&c| matches!(c, '{' | '}' | '*' | ':' | '?' | '#') || c.is_whitespace() || c.is_control())
    {
        error!(http_prefix = %raw, character = ?bad, "HTTP_PREFIX contains a forbidden character");
        bail!("HTTP_PREFIX {raw:?} contains forbidden character {bad:?}");
    }

    let stripped = trimmed.trim_end_matches('/');
    if stripped.is_empty() {
        return Ok(String::new());
    }
    if stripped.starts_with('/') {
        Ok(stripped.to_string())
    } else {
        Ok(format!("/{stripped}"))
    }
}

fn validate_build_settings(mut build: BuildSettings) -> Result<BuildSettings> {
    if build.language.is_empty()
        || !build
            .language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        bail!("build.language must be a non-empty identifier, got {:?}", build.language);
    }
    if build.bucket.trim().is_empty() {
        bail!("build.bucket must not be empty");
    }
    if build.repo_url.trim().is_empty() {
        bail!("build.repo_url must not be empty");
    }
    if build.source_suffixes.is_empty() {
        bail!("build.source_suffixes must name at least one suffix");
    }
    if build.max_concurrent_builds == 0 {
        bail!("build.max_concurrent_builds must be at least 1");
    }
    if build.step_timeout_secs == 0 {
        bail!("build.step_timeout_secs must be at least 1");
    }
    build.release_prefix = build.release_prefix.trim_matches('/').to_string();
    build.storage_endpoint = build.storage_endpoint.trim_end_matches('/').to_string();
    Ok(build)
}
