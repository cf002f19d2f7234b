//! Configuration loading for postbox-relay.
//!
//! Configuration is loaded from a TOML file (default: `postbox.toml`).

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration for postbox-relay.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP endpoints configuration.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the TCP listener (default: 0.0.0.0:1357).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Optional file holding just a port number, overriding the bind port.
    pub port_file: Option<PathBuf>,
    /// Version byte written into response headers (default: 2).
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u8,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Largest request payload accepted, in bytes (default: 16MB).
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `postbox_relay=debug` (default: info).
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Optional log file, appended to alongside stderr output.
    pub file: Option<PathBuf>,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Enable the HTTP side channel (default: true).
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    /// Bind address for HTTP server (default: 127.0.0.1:8080).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:1357".to_string()
}

fn default_protocol_version() -> u8 {
    postbox_types::SERVER_VERSION
}

fn default_database_path() -> PathBuf {
    PathBuf::from("postbox.db")
}

fn default_max_payload_size() -> u32 {
    16 * 1024 * 1024 // 16MB
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_http_enabled() -> bool {
    true
}

fn default_http_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port_file: None,
            protocol_version: default_protocol_version(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            max_payload_size: default_max_payload_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_http_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl ServerConfig {
    /// Resolve the TCP address to listen on.
    ///
    /// When `port_file` names a readable file containing a port number, that
    /// port replaces the one in `bind_address`. A missing or unparsable port
    /// file is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if `bind_address` is not a socket address.
    pub fn listen_address(&self) -> Result<SocketAddr, ConfigError> {
        let mut addr: SocketAddr =
            self.bind_address
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress {
                    address: self.bind_address.clone(),
                })?;

        if let Some(path) = &self.port_file {
            match read_port_file(path) {
                Some(port) => addr.set_port(port),
                None => tracing::warn!(
                    "Port file {} missing or invalid, using port {}",
                    path.display(),
                    addr.port()
                ),
            }
        }

        Ok(addr)
    }
}

fn read_port_file(path: &Path) -> Option<u16> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| raw.trim().parse::<u16>().ok())
        .filter(|&port| port != 0)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Bind address is not `host:port`.
    #[error("invalid bind address: {address}")]
    InvalidBindAddress {
        /// The configured address.
        address: String,
    },
}
