//! Application configuration for wasmcache.
//!
//! User config lives at `~/.wasmcache/wasmcache.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "wasmcache.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".wasmcache";

/// File name of the cache database inside the cache directory.
pub const CACHE_DB_NAME: &str = "wasmcache.db";

// ---------------------------------------------------------------------------
// Config structs (matching wasmcache.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Registered artifact sources.
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding the cache database.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Maximum concurrent chunk fetches per assembly.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_cache_dir() -> String {
    "~/.wasmcache".into()
}
fn default_concurrency() -> u32 {
    4
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[[sources]]` entry — a registered artifact source the CLI can fetch by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Short name used on the command line.
    pub name: String,
    /// Base location the manifest and chunks are served under.
    pub base_url: String,
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum concurrent chunk fetches per assembly.
    pub concurrency: u32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.defaults.concurrency,
            timeout_secs: config.defaults.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.wasmcache/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LoaderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.wasmcache/wasmcache.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LoaderError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LoaderError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LoaderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LoaderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LoaderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the configured cache directory, expanding a leading `~`.
pub fn resolve_cache_dir(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.defaults.cache_dir;

    if let Some(stripped) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| LoaderError::config("could not determine home directory"))?;
        return Ok(home.join(stripped));
    }
    if raw == "~" {
        return dirs::home_dir()
            .ok_or_else(|| LoaderError::config("could not determine home directory"));
    }

    Ok(PathBuf::from(raw))
}

/// Path of the cache database under the resolved cache directory.
pub fn cache_db_path(config: &AppConfig) -> Result<PathBuf> {
    Ok(resolve_cache_dir(config)?.join(CACHE_DB_NAME))
}

/// Look up a registered source by name.
pub fn find_source<'a>(config: &'a AppConfig, name: &str) -> Option<&'a SourceEntry> {
    config.sources.iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("cache_dir"));
        assert!(toml_str.contains("concurrency"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.concurrency, 4);
        assert_eq!(parsed.defaults.timeout_secs, 30);
    }

    #[test]
    fn config_with_sources() {
        let toml_str = r#"
[defaults]
cache_dir = "/tmp/wasmcache"

[[sources]]
name = "ffmpeg"
base_url = "https://cdn.example.com/static/ffmpeg"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].name, "ffmpeg");
        assert!(find_source(&config, "ffmpeg").is_some());
        assert!(find_source(&config, "unknown").is_none());
    }

    #[test]
    fn fetch_config_from_app_config() {
        let app = AppConfig::default();
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.concurrency, 4);
        assert_eq!(fetch.timeout_secs, 30);
    }

    #[test]
    fn cache_dir_expands_tilde() {
        let config = AppConfig::default();
        let dir = resolve_cache_dir(&config).expect("resolve");
        assert!(dir.is_absolute());
        assert!(dir.ends_with(".wasmcache"));
    }

    #[test]
    fn cache_dir_passes_absolute_paths_through() {
        let mut config = AppConfig::default();
        config.defaults.cache_dir = "/var/cache/wasmcache".into();
        let dir = resolve_cache_dir(&config).expect("resolve");
        assert_eq!(dir, PathBuf::from("/var/cache/wasmcache"));
        let db = cache_db_path(&config).expect("db path");
        assert!(db.ends_with("wasmcache.db"));
    }
}
