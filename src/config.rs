//! Proxy configuration
//!
//! Settings come from an optional YAML file, then environment overrides,
//! then built-in defaults:
//!
//! ```yaml
//! server:
//!   listen_addr: "127.0.0.1:4000"
//! upstream:
//!   base_url: "http://localhost:5050"
//!   prefix: "/api"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use url::Url;

/// Environment variable naming the YAML config file
pub const CONFIG_PATH_VAR: &str = "WAYPOINT_CONFIG";

/// Config file read when `WAYPOINT_CONFIG` is unset (optional)
pub const DEFAULT_CONFIG_PATH: &str = "waypoint.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Local address to bind, e.g. "127.0.0.1:4000"
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend base URL, scheme://host:port with an optional base path
    pub base_url: String,

    /// Path segment stripped before forwarding. Empty matches every path.
    pub prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:4000".to_string(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5050".to_string(),
            prefix: "/api".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(listen) = lookup("LISTEN") {
            cfg.server.listen_addr = listen;
        }
        if let Some(upstream) = lookup("UPSTREAM") {
            cfg.upstream.base_url = upstream;
        }
        if let Some(prefix) = lookup("PREFIX") {
            cfg.upstream.prefix = prefix;
        }

        cfg.validated()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate a YAML document. Missing fields take defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        cfg.validated()
    }

    /// Check every field and normalize the prefix (no trailing slash).
    fn validated(mut self) -> Result<Self> {
        self.listen_addr()?;
        self.upstream_url()?;

        let prefix = self.upstream.prefix.trim();
        if !prefix.is_empty() && !prefix.starts_with('/') {
            anyhow::bail!("prefix must start with '/': {:?}", prefix);
        }
        self.upstream.prefix = prefix.trim_end_matches('/').to_string();

        Ok(self)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address {:?}", self.server.listen_addr))
    }

    pub fn upstream_url(&self) -> Result<Url> {
        let url = Url::parse(&self.upstream.base_url)
            .with_context(|| format!("Invalid upstream URL {:?}", self.upstream.base_url))?;

        if url.scheme() != "http" {
            anyhow::bail!("Unsupported upstream scheme {:?}, only http is supported", url.scheme());
        }
        if url.host_str().is_none() {
            anyhow::bail!("Upstream URL missing host: {}", self.upstream.base_url);
        }

        Ok(url)
    }
}
