//! Server configuration.
//!
//! Settings come from three places, later ones overriding earlier ones:
//! built-in defaults, an optional YAML file, and the `LISTEN` / `ROOT`
//! environment variables. The binary applies its positional arguments on top.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Longest accepted idle timeout, one day.
pub const MAX_IDLE_TIMEOUT_SECS: u64 = 24 * 60 * 60;
/// Smallest head buffer that can still hold a request line and terminator.
pub const MIN_HEADER_BYTES: usize = 64;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub static_files: StaticFilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// `host:port` or a bare port.
    pub listen_addr: String,
    pub max_connections: usize,
    pub idle_timeout_secs: u64,
    pub max_header_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub root: PathBuf,
    /// Upper bound, in bytes, of a rendered directory listing.
    pub listing_limit: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: format!("{DEFAULT_HOST}:{DEFAULT_PORT}"),
            max_connections: 1024,
            idle_timeout_secs: 10,
            max_header_bytes: 8192,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            listing_limit: 1024 * 1024,
        }
    }
}

impl Config {
    /// Defaults overridden by the `LISTEN` and `ROOT` environment variables.
    pub fn load() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("invalid configuration")
    }

    /// Reads a YAML file, then applies the environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut cfg = Self::from_yaml_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(listen) = std::env::var("LISTEN") {
            self.server.listen_addr = listen;
        }
        if let Ok(root) = std::env::var("ROOT") {
            self.static_files.root = PathBuf::from(root);
        }
    }
}

/// Per-connection and per-loop resource bounds, in runtime form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_connections: usize,
    pub max_header_bytes: usize,
    /// Time allowed for a request head to arrive, and between write progress.
    pub idle_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        let defaults = ServerSettings::default();
        Self {
            max_connections: defaults.max_connections,
            max_header_bytes: defaults.max_header_bytes,
            idle_timeout: defaults.idle_timeout(),
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        parse_listen_addr(&self.listen_addr)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Checks the configured bounds and returns them in runtime form.
    pub fn limits(&self) -> Result<Limits> {
        if self.max_connections == 0 {
            anyhow::bail!("max_connections must be at least 1");
        }
        if self.idle_timeout_secs == 0 || self.idle_timeout_secs > MAX_IDLE_TIMEOUT_SECS {
            anyhow::bail!(
                "idle_timeout_secs must be between 1 and {MAX_IDLE_TIMEOUT_SECS}, got {}",
                self.idle_timeout_secs
            );
        }
        if self.max_header_bytes < MIN_HEADER_BYTES {
            anyhow::bail!(
                "max_header_bytes must be at least {MIN_HEADER_BYTES}, got {}",
                self.max_header_bytes
            );
        }

        Ok(Limits {
            max_connections: self.max_connections,
            max_header_bytes: self.max_header_bytes,
            idle_timeout: self.idle_timeout(),
        })
    }
}

/// Resolves `host:port`, `:port` or a bare `port` into a socket address.
/// A missing host means every interface.
pub fn parse_listen_addr(spec: &str) -> Result<SocketAddr> {
    let spec = spec.trim();
    if spec.is_empty() {
        anyhow::bail!("empty listen address");
    }

    let (host, port) = match spec.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => ("", spec),
    };
    let host = match host.trim_start_matches('[').trim_end_matches(']') {
        "" => DEFAULT_HOST,
        h => h,
    };
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid port in listen address {spec:?}"))?;

    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve listen address {spec:?}"))?
        .next()
        .with_context(|| format!("listen address {spec:?} resolved to nothing"))
}
