//! # Configuration Management
//!
//! Settings for servers, clients, transports and logging.
//!
//! ## Configuration Sources
//! - TOML files via [`NetworkConfig::from_file`]
//! - Direct instantiation with defaults
//! - `THRIFT_JSON_*` environment variables via [`NetworkConfig::from_env`]
//!
//! Durations are written as milliseconds and log levels as lowercase strings.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Largest message the framer accepts by default (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default connect timeout for clients.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time to wait for a reply.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time a server waits for active connections on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

const ENV_PREFIX: &str = "THRIFT_JSON_";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `THRIFT_JSON_*` environment variables.
    ///
    /// A variable that is set but does not parse is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// [`NetworkConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("SERVER_ADDRESS") {
            config.server.address = addr;
        }
        if let Some(val) = parse_var::<usize>(&lookup, "MAX_CONNECTIONS")? {
            config.server.max_connections = val;
        }
        if let Some(val) = parse_var::<u64>(&lookup, "SHUTDOWN_TIMEOUT_MS")? {
            config.server.shutdown_timeout = Duration::from_millis(val);
        }
        if let Some(addr) = lookup("CLIENT_ADDRESS") {
            config.client.address = addr;
        }
        if let Some(val) = parse_var::<u64>(&lookup, "CONNECTION_TIMEOUT_MS")? {
            config.client.connection_timeout = Duration::from_millis(val);
        }
        if let Some(val) = parse_var::<u64>(&lookup, "RESPONSE_TIMEOUT_MS")? {
            config.client.response_timeout = Duration::from_millis(val);
        }
        if let Some(path) = lookup("HTTP_PATH") {
            config.client.http_path = path;
        }
        if let Some(val) = parse_var::<usize>(&lookup, "MAX_MESSAGE_SIZE")? {
            config.transport.max_message_size = val;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.logging.log_level = level
                .parse()
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
        }
        if let Some(val) = parse_var::<bool>(&lookup, "LOG_JSON")? {
            config.logging.json_format = val;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;
        Ok(())
    }

    /// Collect validation problems. An empty list means the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ProtocolError::ConfigError(format!("Invalid value for {ENV_PREFIX}{key}: '{raw}'"))
        }),
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:9090")
    pub address: String,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9090"),
            max_connections: 1000,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.address.as_str() {
            "" => errors.push("Server address cannot be empty".to_string()),
            addr if addr.parse::<std::net::SocketAddr>().is_err() => errors.push(format!(
                "Invalid server address format: '{addr}' (expected format: '0.0.0.0:9090')"
            )),
            _ => {}
        }

        if self.shutdown_timeout > Duration::from_secs(60) {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        match self.max_connections {
            0 => errors.push("Max connections must be greater than 0".to_string()),
            n if n > 100_000 => errors.push(format!(
                "Max connections very high: {n} (ensure system resources can support this)"
            )),
            _ => {}
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target server address, `host:port`
    pub address: String,

    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Timeout for waiting for a reply
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,

    /// Request path used by the HTTP client transport
    pub http_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9090"),
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            http_path: String::from("/"),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Host names are allowed, so only the port is checked here.
        match self.address.rsplit_once(':') {
            None => errors.push(format!(
                "Invalid client address format: '{}' (expected format: 'example.com:9090')",
                self.address
            )),
            Some((host, port)) => {
                if host.is_empty() || port.parse::<u16>().is_err() {
                    errors.push(format!(
                        "Invalid client address format: '{}' (expected format: 'example.com:9090')",
                        self.address
                    ));
                }
            }
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        }

        if self.response_timeout.as_millis() < 100 {
            errors.push("Response timeout too short (minimum: 100ms)".to_string());
        }

        if !self.http_path.starts_with('/') {
            errors.push(format!("HTTP path must start with '/': '{}'", self.http_path));
        }

        errors
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Read-ahead buffer size of buffered transports
    pub read_buffer_size: usize,

    /// Initial write buffer capacity of buffered transports
    pub write_buffer_size: usize,

    /// Largest accepted message in bytes
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: crate::transport::buffered::DEFAULT_BUFFER_SIZE,
            write_buffer_size: crate::transport::buffered::DEFAULT_BUFFER_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.read_buffer_size == 0 {
            errors.push("Read buffer size cannot be 0".to_string());
        }
        if self.write_buffer_size == 0 {
            errors.push("Write buffer size cannot be 0".to_string());
        }

        if self.max_message_size == 0 {
            errors.push("Max message size cannot be 0".to_string());
        } else if self.max_message_size < 1024 {
            errors.push("Max message size too small (minimum: 1 KB)".to_string());
        } else if self.max_message_size > 1024 * 1024 * 1024 {
            errors.push(format!(
                "Max message size too large: {} bytes (maximum: 1 GB)",
                self.max_message_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name attached to every event
    pub app_name: String,

    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    pub log_to_console: bool,

    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Emit JSON instead of the compact text format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("thrift-json"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.app_name.len() {
            0 => errors.push("Application name cannot be empty".to_string()),
            len if len > 64 => {
                errors.push(format!("Application name too long: {len} characters (maximum: 64)"))
            }
            _ => {}
        }

        match (self.log_to_file, self.log_file_path.as_deref()) {
            (true, None) => errors
                .push("log_file_path must be specified when log_to_file is true".to_string()),
            (true, Some(path)) => {
                let dir = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty());
                if let Some(dir) = dir.filter(|d| !d.exists()) {
                    errors.push(format!("Log file directory does not exist: {}", dir.display()));
                }
            }
            (false, _) => {}
        }

        if !(self.log_to_console || self.log_to_file) {
            errors.push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod log_level_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| D::Error::custom(format!("Invalid log level: {name}")))
    }
}
