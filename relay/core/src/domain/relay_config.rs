// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Relay Configuration Types
//
// Defines the configuration schema for a slurp relay:
// - Staging HTTP API listener and token
// - Build staging directory
// - Transfer (SSH) listener, host key and shell
// - Remote blob store address and credentials
// - Archive tooling and log level

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "SLURP_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Staging HTTP API
    #[serde(default)]
    pub api: ApiConfig,

    /// Build staging directory
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Transfer gateway (SSH server)
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Remote blob store
    #[serde(default)]
    pub store: StoreConfig,

    /// Archive subprocesses
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Log level to output (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address for the API
    #[serde(default = "default_api_address")]
    pub address: String,

    /// Token expected in the X-AUTH-TOKEN header (empty disables the check)
    #[serde(default = "default_api_token")]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Address the SSH server listens on (ip:port)
    #[serde(default = "default_transfer_address")]
    pub address: String,

    /// SSH host (private) key file, generated on first start
    #[serde(default = "default_host_key_path")]
    pub host_key_path: PathBuf,

    /// Shell used to run the command a client requests with `exec`
    #[serde(default = "default_shell")]
    pub shell: PathBuf,

    /// Version banner announced during the SSH handshake
    #[serde(default = "default_server_id")]
    pub server_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage host address (hoarder://host:port, http(s)://host:port or memory://)
    #[serde(default = "default_store_address")]
    pub address: String,

    /// Storage auth token
    #[serde(default)]
    pub token: String,

    /// Talk to a `hoarder://` store over https
    #[serde(default)]
    pub tls: bool,

    /// Verify the store's TLS certificate
    #[serde(default)]
    pub verify_certificates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// tar binary used to compress and extract builds
    #[serde(default = "default_tar_path")]
    pub tar_path: PathBuf,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("/var/db/slurp/build/")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_address() -> String {
    "127.0.0.1:1566".to_string()
}

fn default_api_token() -> String {
    "secret".to_string()
}

fn default_transfer_address() -> String {
    "127.0.0.1:1567".to_string()
}

fn default_host_key_path() -> PathBuf {
    PathBuf::from("/var/db/slurp/slurp_rsa")
}

fn default_shell() -> PathBuf {
    PathBuf::from("/bin/bash")
}

fn default_server_id() -> String {
    "SSH-2.0-NANOPACK-SLURP".to_string()
}

fn default_store_address() -> String {
    "hoarder://127.0.0.1:7410".to_string()
}

fn default_tar_path() -> PathBuf {
    PathBuf::from("tar")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: default_api_address(),
            token: default_api_token(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            address: default_transfer_address(),
            host_key_path: default_host_key_path(),
            shell: default_shell(),
            server_id: default_server_id(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: default_store_address(),
            token: String::new(),
            tls: false,
            verify_certificates: false,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            tar_path: default_tar_path(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            build_dir: default_build_dir(),
            transfer: TransferConfig::default(),
            store: StoreConfig::default(),
            archive: ArchiveConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SLURP_CONFIG_PATH environment variable
    /// 2. ./slurp-config.yaml (working directory)
    /// 3. ~/.slurp/config.yaml (user home)
    /// 4. /etc/slurp/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./slurp-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".slurp").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/slurp/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must load
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SLURP_API_TOKEN") {
            tracing::info!("Environment override: SLURP_API_TOKEN");
            self.api.token = val;
        }
        if let Ok(val) = std::env::var("SLURP_STORE_TOKEN") {
            tracing::info!("Environment override: SLURP_STORE_TOKEN");
            self.store.token = val;
        }
        if let Ok(val) = std::env::var("SLURP_BUILD_DIR") {
            tracing::info!("Environment override: SLURP_BUILD_DIR={}", val);
            self.build_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SLURP_LOG_LEVEL") {
            self.log_level = val;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.build_dir.as_os_str().is_empty() {
            anyhow::bail!("build_dir cannot be empty");
        }

        self.api
            .address
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("Invalid api.address '{}': {}", self.api.address, e))?;

        self.transfer.address.parse::<SocketAddr>().map_err(|e| {
            anyhow::anyhow!("Invalid transfer.address '{}': {}", self.transfer.address, e)
        })?;

        if self.transfer.host_key_path.as_os_str().is_empty() {
            anyhow::bail!("transfer.host_key_path cannot be empty");
        }

        if self.transfer.shell.as_os_str().is_empty() {
            anyhow::bail!("transfer.shell cannot be empty");
        }

        if !self.transfer.server_id.starts_with("SSH-2.0-") {
            anyhow::bail!(
                "transfer.server_id must start with 'SSH-2.0-', got '{}'",
                self.transfer.server_id
            );
        }

        let scheme = self
            .store
            .address
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| anyhow::anyhow!("store.address '{}' has no scheme", self.store.address))?;
        if !matches!(scheme, "hoarder" | "http" | "https" | "memory") {
            anyhow::bail!("Unsupported store scheme '{}'", scheme);
        }

        if self.archive.tar_path.as_os_str().is_empty() {
            anyhow::bail!("archive.tar_path cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RelayConfig::default();
        assert_eq!(config.api.address, "127.0.0.1:1566");
        assert_eq!(config.transfer.address, "127.0.0.1:1567");
        assert_eq!(config.transfer.server_id, "SSH-2.0-NANOPACK-SLURP");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
build_dir: /tmp/slurp-build
store:
  address: memory://
  token: hoard
transfer:
  address: 0.0.0.0:2222
"#;
        let config = RelayConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.build_dir, PathBuf::from("/tmp/slurp-build"));
        assert_eq!(config.store.token, "hoard");
        assert_eq!(config.transfer.address, "0.0.0.0:2222");
        assert_eq!(config.transfer.shell, PathBuf::from("/bin/bash"));
        assert_eq!(config.api.token, "secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("slurp.yaml");
        let mut config = RelayConfig::default();
        config.log_level = "debug".to_string();
        config.to_yaml_file(&path).unwrap();

        let loaded = RelayConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.log_level, "debug");
        assert_eq!(loaded.store.address, config.store.address);
    }

    #[test]
    fn test_validation() {
        let mut config = RelayConfig::default();
        config.transfer.address = "not-an-address".to_string();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.store.address = "ftp://store".to_string();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.transfer.server_id = "slurp".to_string();
        assert!(config.validate().is_err());
    }
}
