//! Configuration loading from `~/.proxyprobe/config.toml`.

use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use crate::probe::ProbeSettings;

pub const DEFAULT_GRAPH_ENDPOINT: &str =
    "https://api.thegraph.com/subgraphs/name/hazae41/network-ws-to-tcp-proxy";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_GENERATE_TIMEOUT_MS: u64 = 1000;

/// `~/.proxyprobe/config.toml`. Every section and key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct ProbeConfig {
    pub probe: Option<ProbeSection>,
    pub source: Option<SourceSection>,
    pub runner: Option<RunnerSection>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeSection {
    /// Transport scheme, `wss` unless testing against a plain local proxy.
    pub scheme: Option<String>,
    /// Destination the proxy is asked to tunnel to.
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub open_timeout_ms: Option<u64>,
    pub rpc_timeout_ms: Option<u64>,
    pub raw_timeout_ms: Option<u64>,
    /// Bound on secret generation. `0` waits without a bound.
    pub generate_timeout_ms: Option<u64>,
    pub unit_price: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceSection {
    /// GraphQL endpoint listing candidate proxies. Supports `${VAR}` expansion.
    pub endpoint: Option<String>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunnerSection {
    pub concurrency: Option<usize>,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

impl ProbeConfig {
    /// Load the default config file. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Session settings with defaults filled in.
    #[must_use]
    pub fn probe_settings(&self) -> ProbeSettings {
        let defaults = ProbeSettings::default();
        let Some(probe) = &self.probe else {
            return defaults;
        };
        let millis = |value: Option<u64>, fallback: Duration| {
            value.map_or(fallback, Duration::from_millis)
        };
        ProbeSettings {
            scheme: probe.scheme.clone().unwrap_or(defaults.scheme),
            target_host: probe.hostname.clone().unwrap_or(defaults.target_host),
            target_port: probe.port.unwrap_or(defaults.target_port),
            open_timeout: millis(probe.open_timeout_ms, defaults.open_timeout),
            rpc_timeout: millis(probe.rpc_timeout_ms, defaults.rpc_timeout),
            raw_timeout: millis(probe.raw_timeout_ms, defaults.raw_timeout),
            unit_price: probe.unit_price.unwrap_or(defaults.unit_price),
        }
    }

    /// `None` means secret generation is awaited without a bound.
    #[must_use]
    pub fn generate_timeout(&self) -> Option<Duration> {
        let ms = self
            .probe
            .as_ref()
            .and_then(|probe| probe.generate_timeout_ms)
            .unwrap_or(DEFAULT_GENERATE_TIMEOUT_MS);
        (ms > 0).then(|| Duration::from_millis(ms))
    }

    #[must_use]
    pub fn source_endpoint(&self) -> String {
        self.source
            .as_ref()
            .and_then(|source| source.endpoint.as_deref())
            .map_or_else(|| DEFAULT_GRAPH_ENDPOINT.to_string(), expand_env_vars)
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.source
            .as_ref()
            .and_then(|source| source.page_size)
            .filter(|&size| size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.runner
            .as_ref()
            .and_then(|runner| runner.concurrency)
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CONCURRENCY)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".proxyprobe").join("config.toml"))
}
