//! Configuration for minifs components
//!
//! Values come from (lowest to highest priority): built-in defaults, an
//! optional TOML file, `MINIFS__*` environment variables, then CLI flags
//! applied by the binaries.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default chunk size (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// Coordinator-specific config
    pub coordinator: CoordinatorConfig,

    /// Storage node config
    pub node: NodeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            coordinator: CoordinatorConfig::default(),
            node: NodeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus environment overrides.
    ///
    /// `MINIFS__COORDINATOR__CHUNK_SIZE=1048576` overrides `coordinator.chunk_size`.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        let config: Config = builder
            .add_source(
                ::config::Environment::with_prefix("MINIFS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Bind address for HTTP API
    pub bind_addr: SocketAddr,

    /// Chunk window size in bytes
    pub chunk_size: usize,

    /// Max gap between heartbeats before a node is evicted
    pub heartbeat_timeout_secs: u64,

    /// How often the failure sweeper runs
    pub sweep_interval_secs: u64,

    /// Per-request timeout for chunk push/pull
    pub node_timeout_ms: u64,

    /// Upper bound on an upload request body
    pub max_upload_bytes: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            chunk_size: DEFAULT_CHUNK_SIZE,
            heartbeat_timeout_secs: 5,
            sweep_interval_secs: 2,
            node_timeout_ms: 10_000,
            max_upload_bytes: 1024 * 1024 * 1024,
        }
    }
}

impl CoordinatorConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.chunk_size == 0 {
            return Err(crate::Error::InvalidConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.heartbeat_timeout_secs == 0 {
            return Err(crate::Error::InvalidConfig(
                "heartbeat_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(crate::Error::InvalidConfig(
                "sweep_interval_secs must be greater than zero".into(),
            ));
        }
        if self.node_timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "node_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Storage node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Bind address for the chunk API
    pub bind_addr: SocketAddr,

    /// Coordinator base URL
    pub coordinator_url: String,

    /// Directory holding chunk files
    pub storage_path: PathBuf,

    /// Heartbeat period; must stay below the coordinator's heartbeat timeout
    pub heartbeat_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 6000)),
            coordinator_url: "http://127.0.0.1:5000".to_string(),
            storage_path: PathBuf::from("storage"),
            heartbeat_interval_ms: 1000,
        }
    }
}

impl NodeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "heartbeat_interval_ms must be greater than zero".into(),
            ));
        }
        if !self.coordinator_url.starts_with("http://")
            && !self.coordinator_url.starts_with("https://")
        {
            return Err(crate::Error::InvalidConfig(format!(
                "coordinator_url must be an http(s) URL: {}",
                self.coordinator_url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.coordinator.validate().is_ok());
        assert!(config.node.validate().is_ok());
        assert_eq!(config.coordinator.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.node.heartbeat_interval() < config.coordinator.heartbeat_timeout());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = CoordinatorConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_coordinator_url_rejected() {
        let config = NodeConfig {
            coordinator_url: "127.0.0.1:5000".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minifs.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "log_level = \"debug\"\n\n[coordinator]\nchunk_size = 30\nheartbeat_timeout_secs = 9\n\n[node]\nstorage_path = \"/tmp/chunks\""
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.coordinator.chunk_size, 30);
        assert_eq!(config.coordinator.heartbeat_timeout_secs, 9);
        assert_eq!(config.coordinator.sweep_interval_secs, 2);
        assert_eq!(config.node.storage_path, PathBuf::from("/tmp/chunks"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.coordinator.bind_addr.port(), 5000);
    }
}
