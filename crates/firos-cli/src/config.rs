//! Gateway configuration – reads `~/.firos/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP port the gateway listens on.
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Address the gateway binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Base URL of the NGSI context broker used for robot snapshots.
    #[serde(default = "default_context_broker_url")]
    pub context_broker_url: String,

    /// JSON file describing robots and their topics.
    #[serde(default = "default_robots_path")]
    pub robots_path: PathBuf,

    /// Optional JSON table of extra message type descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas_path: Option<PathBuf>,

    /// Capacity of the in-process topic bus.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_server_port() -> u16 {
    firos_gateway::DEFAULT_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_context_broker_url() -> String {
    "http://localhost:1026".to_string()
}
fn default_robots_path() -> PathBuf {
    PathBuf::from("robots.json")
}
fn default_bus_capacity() -> usize {
    firos_middleware::bus::DEFAULT_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: default_server_port(),
            bind_address: default_bind_address(),
            context_broker_url: default_context_broker_url(),
            robots_path: default_robots_path(),
            schemas_path: None,
            bus_capacity: default_bus_capacity(),
        }
    }
}

/// Return the path to `~/.firos/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".firos").join("config.toml")
}

/// Pick the config file from the command line: `--config <path>` as the
/// first argument, otherwise [`config_path`].
pub fn config_path_from_args<I>(mut args: I) -> Result<PathBuf, String>
where
    I: Iterator<Item = String>,
{
    match args.next().as_deref() {
        None => Ok(config_path()),
        Some("--config") => args
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| "--config requires a path".to_string()),
        Some(other) => Err(format!("unknown argument {other:?} (usage: firos [--config <path>])")),
    }
}

/// Load the config from `path`. Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `FIROS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `FIROS_SERVER_PORT` | `server_port` |
/// | `FIROS_BIND_ADDRESS` | `bind_address` |
/// | `FIROS_CONTEXT_BROKER_URL` | `context_broker_url` |
/// | `FIROS_ROBOTS_PATH` | `robots_path` |
/// | `FIROS_SCHEMAS_PATH` | `schemas_path` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |name| std::env::var(name).ok());
}

pub(crate) fn apply_overrides<F>(cfg: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("FIROS_SERVER_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.server_port = port;
    }
    if let Some(v) = lookup("FIROS_BIND_ADDRESS") {
        cfg.bind_address = v;
    }
    if let Some(v) = lookup("FIROS_CONTEXT_BROKER_URL") {
        cfg.context_broker_url = v;
    }
    if let Some(v) = lookup("FIROS_ROBOTS_PATH") {
        cfg.robots_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("FIROS_SCHEMAS_PATH") {
        cfg.schemas_path = Some(PathBuf::from(v));
    }
}
