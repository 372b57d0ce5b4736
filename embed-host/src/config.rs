//! Load config from file and environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::session::SessionSettings;

/// Host configuration. File: ~/.config/embed-handshake/config.toml or
/// /etc/embed-handshake/config.toml.
/// Env overrides: EMBED_SOURCE, EMBED_TIMEOUT_MS, EMBED_DEFAULT_HEIGHT, EMBED_MIN_HEIGHT.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Embed source URL. Required before a session can start.
    #[serde(default)]
    pub source: Option<String>,
    /// Time the peer gets to report ready (default 5000 ms).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Frame height before the peer reports one (default 400).
    #[serde(default = "default_height")]
    pub default_height: u32,
    /// Smallest height ever applied to the frame (default 25).
    #[serde(default = "default_min_height")]
    pub min_height: u32,
}

fn default_timeout_ms() -> u64 {
    5000
}
fn default_height() -> u32 {
    embed_core::core::DEFAULT_HEIGHT
}
fn default_min_height() -> u32 {
    embed_core::core::DEFAULT_MIN_HEIGHT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            timeout_ms: default_timeout_ms(),
            default_height: default_height(),
            min_height: default_min_height(),
        }
    }
}

impl Config {
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            timeout: Duration::from_millis(self.timeout_ms),
            core: embed_core::Config {
                default_height: self.default_height,
                min_height: self.min_height,
            },
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |name| std::env::var(name).ok());
    c
}

/// Apply overrides from `lookup` (the process environment in production).
/// Values that do not parse are ignored.
fn apply_env(c: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(s) = lookup("EMBED_SOURCE") {
        if !s.trim().is_empty() {
            c.source = Some(s.trim().to_string());
        }
    }
    if let Some(s) = lookup("EMBED_TIMEOUT_MS") {
        if let Ok(v) = s.parse::<u64>() {
            c.timeout_ms = v;
        }
    }
    if let Some(s) = lookup("EMBED_DEFAULT_HEIGHT") {
        if let Ok(v) = s.parse::<u32>() {
            c.default_height = v;
        }
    }
    if let Some(s) = lookup("EMBED_MIN_HEIGHT") {
        if let Ok(v) = s.parse::<u32>() {
            c.min_height = v;
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/embed-handshake/config.toml"));
    }
    out.push(PathBuf::from("/etc/embed-handshake/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    let path = config_paths().into_iter().find(|p| p.exists())?;
    let text = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            warn!(target: "embed.host", path = %path.display(), error = %e, "cannot read config");
            return None;
        }
    };
    match toml::from_str::<Config>(&text) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(target: "embed.host", path = %path.display(), error = %e, "invalid config, using defaults");
            None
        }
    }
}
