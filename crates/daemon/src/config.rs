//! Daemon configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `NEXUS_*`
//! environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use nexus_api_rpc::server::DEFAULT_RPC_PORT;
use nexus_core::application::constants::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_MODEL, MAX_QUEUE_SIZE,
};
use nexus_infra_gemini::DEFAULT_BASE_URL;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "~/.nexus/config.toml";
const DEFAULT_DB_PATH: &str = "~/.nexus/nexus.db";
const DEFAULT_CONNECTIVITY_TARGET: &str = "generativelanguage.googleapis.com:443";
const DEFAULT_CONNECTIVITY_INTERVAL_SECS: u64 = 15;
const ENV_PREFIX: &str = "NEXUS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub db_path: String,
    pub rpc_port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub model: String,
    pub connectivity_target: String,
    pub connectivity_interval_secs: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cache_max_entries: usize,
    pub queue_capacity: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            gemini_api_key: None,
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            connectivity_target: DEFAULT_CONNECTIVITY_TARGET.to_string(),
            connectivity_interval_secs: DEFAULT_CONNECTIVITY_INTERVAL_SECS,
            latitude: None,
            longitude: None,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            queue_capacity: MAX_QUEUE_SIZE,
        }
    }
}

impl DaemonConfig {
    /// Load from `NEXUS_CONFIG` (or `~/.nexus/config.toml`) and the process environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("NEXUS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(
            PathBuf::from(shellexpand::tilde(&path).into_owned()),
            Environment::with_prefix(ENV_PREFIX),
        )
    }

    fn load_from(path: PathBuf, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.clone()).format(FileFormat::Toml).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read configuration ({})", path.display()))?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Database file path with `~` expanded
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).into_owned())
    }

    /// API key, treating a blank value as absent
    pub fn api_key(&self) -> Option<&str> {
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn connectivity_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    fn missing_file() -> PathBuf {
        std::env::temp_dir().join(format!("nexus-missing-{}.toml", std::process::id()))
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = DaemonConfig::load_from(missing_file(), env(&[])).unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.api_key(), None);
        assert_eq!(config.model, "gemini-2.0-flash-exp");
    }

    #[test]
    fn test_env_overrides() {
        let config = DaemonConfig::load_from(
            missing_file(),
            env(&[
                ("NEXUS_RPC_PORT", "9999"),
                ("NEXUS_GEMINI_API_KEY", "secret"),
                ("NEXUS_LATITUDE", "37.5"),
                ("NEXUS_LONGITUDE", "-122.25"),
            ]),
        )
        .unwrap();

        assert_eq!(config.rpc_port, 9999);
        assert_eq!(config.api_key(), Some("secret"));
        assert_eq!(config.latitude, Some(37.5));
        assert_eq!(config.longitude, Some(-122.25));
    }

    #[test]
    fn test_file_then_env() {
        let path = std::env::temp_dir().join(format!(
            "nexus-config-test-{}-{}.toml",
            std::process::id(),
            line!()
        ));
        std::fs::write(
            &path,
            "model = \"gemini-pro\"\nqueue_capacity = 10\ndb_path = \"/tmp/a.db\"\n",
        )
        .unwrap();

        let config =
            DaemonConfig::load_from(path.clone(), env(&[("NEXUS_DB_PATH", "/tmp/b.db")])).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.model, "gemini-pro");
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/b.db"));
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let config = DaemonConfig {
            gemini_api_key: Some("  ".to_string()),
            ..DaemonConfig::default()
        };
        assert_eq!(config.api_key(), None);
    }
}
