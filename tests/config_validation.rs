//! Integration tests for configuration validation

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use std::time::Duration;
use thrift_json::config::{
    ClientConfig, LoggingConfig, NetworkConfig, ServerConfig, TransportConfig,
};
use thrift_json::ProtocolError;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = NetworkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_long_shutdown_timeout() {
    let mut config = NetworkConfig::default();
    config.server.shutdown_timeout = Duration::from_secs(120);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Shutdown timeout too long")));
}

#[test]
fn test_zero_max_connections() {
    let mut config = NetworkConfig::default();
    config.server.max_connections = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max connections must be greater than 0")));
}

#[test]
fn test_high_max_connections_warning() {
    let mut config = NetworkConfig::default();
    config.server.max_connections = 150_000;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max connections very high")));
}

#[test]
fn test_invalid_client_address() {
    let mut config = NetworkConfig::default();
    config.client.address = "not:a:valid:address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid client address")));
}

#[test]
fn test_client_address_accepts_host_names() {
    let mut config = NetworkConfig::default();
    config.client.address = "thrift.example.com:9090".to_string();
    assert!(config.validate().is_empty());
}

#[test]
fn test_short_client_timeouts() {
    let mut config = NetworkConfig::default();
    config.client.connection_timeout = Duration::from_millis(50);
    config.client.response_timeout = Duration::from_millis(10);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Connection timeout too short")));
    assert!(errors.iter().any(|e| e.contains("Response timeout too short")));
}

#[test]
fn test_relative_http_path() {
    let mut config = NetworkConfig::default();
    config.client.http_path = "thrift".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("HTTP path must start with '/'")));
}

#[test]
fn test_zero_max_message_size() {
    let mut config = NetworkConfig::default();
    config.transport.max_message_size = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max message size cannot be 0")));
}

#[test]
fn test_tiny_max_message_size() {
    let mut config = NetworkConfig::default();
    config.transport.max_message_size = 512;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max message size too small")));
}

#[test]
fn test_excessive_max_message_size() {
    let mut config = NetworkConfig::default();
    config.transport.max_message_size = 2 * 1024 * 1024 * 1024;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max message size too large")));
}

#[test]
fn test_zero_buffer_sizes() {
    let mut config = NetworkConfig::default();
    config.transport.read_buffer_size = 0;
    config.transport.write_buffer_size = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Read buffer size")));
    assert!(errors.iter().any(|e| e.contains("Write buffer size")));
}

#[test]
fn test_empty_app_name() {
    let mut config = NetworkConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let mut config = NetworkConfig::default();
    config.logging.app_name = "a".repeat(100);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Application name too long")));
}

#[test]
fn test_log_to_file_without_path() {
    let mut config = NetworkConfig::default();
    config.logging.log_to_file = true;
    config.logging.log_file_path = None;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_no_logging_outputs() {
    let mut config = NetworkConfig::default();
    config.logging.log_to_console = false;
    config.logging.log_to_file = false;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_validate_strict_with_valid_config() {
    let config = NetworkConfig::default();
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = NetworkConfig::default();
    config.server.address = String::new();

    let err = config.validate_strict().unwrap_err();
    assert!(matches!(err, ProtocolError::ConfigError(_)));
    assert!(err.to_string().contains("Configuration validation failed"));
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = NetworkConfig::default();

    config.server.address = String::new();
    config.server.max_connections = 0;
    config.client.address = String::new();
    config.transport.max_message_size = 0;
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(
        errors.len() >= 5,
        "Expected at least 5 errors, got {}: {:?}",
        errors.len(),
        errors
    );
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = NetworkConfig::from_toml(
        r#"
        [server]
        address = "0.0.0.0:9191"

        [client]
        response_timeout = 2500
        "#,
    )
    .expect("partial config should parse");

    assert_eq!(config.server.address, "0.0.0.0:9191");
    assert_eq!(config.server.max_connections, 1000);
    assert_eq!(config.client.response_timeout, Duration::from_millis(2500));
    assert_eq!(config.client.http_path, "/");
    assert_eq!(config.logging.log_level, Level::INFO);
}

#[test]
fn test_malformed_toml_is_config_error() {
    let err = NetworkConfig::from_toml("[server\naddress = 1").unwrap_err();
    assert!(matches!(err, ProtocolError::ConfigError(_)));
}

#[test]
fn test_invalid_log_level_in_toml() {
    let err = NetworkConfig::from_toml("[logging]\nlog_level = \"loud\"").unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_save_and_reload() {
    let path = std::env::temp_dir().join(format!("thrift-json-config-{}.toml", std::process::id()));
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.address = "127.0.0.1:7000".to_string();
        c.transport.max_message_size = 64 * 1024;
        c.logging.json_format = true;
    });

    config.save_to_file(&path).expect("save");
    let reloaded = NetworkConfig::from_file(&path).expect("reload");
    std::fs::remove_file(&path).ok();

    assert_eq!(reloaded.server.address, "127.0.0.1:7000");
    assert_eq!(reloaded.transport.max_message_size, 64 * 1024);
    assert!(reloaded.logging.json_format);
}

#[test]
fn test_missing_config_file() {
    let err = NetworkConfig::from_file("/nonexistent/thrift-json.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_env_lookup_overrides() {
    let config = NetworkConfig::from_lookup(|key| match key {
        "SERVER_ADDRESS" => Some("0.0.0.0:9000".to_string()),
        "RESPONSE_TIMEOUT_MS" => Some("750".to_string()),
        "LOG_LEVEL" => Some("debug".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.server.address, "0.0.0.0:9000");
    assert_eq!(config.client.response_timeout, Duration::from_millis(750));
    assert_eq!(config.logging.log_level, Level::DEBUG);
}

#[test]
fn test_env_lookup_rejects_bad_number() {
    let err = NetworkConfig::from_lookup(|key| {
        (key == "MAX_MESSAGE_SIZE").then(|| "lots".to_string())
    })
    .unwrap_err();
    assert!(err.to_string().contains("THRIFT_JSON_MAX_MESSAGE_SIZE"));
}

#[test]
fn test_valid_production_config() {
    let config = NetworkConfig {
        server: ServerConfig {
            address: "0.0.0.0:9090".to_string(),
            max_connections: 10000,
            shutdown_timeout: Duration::from_secs(10),
        },
        client: ClientConfig {
            address: "thrift.example.com:9090".to_string(),
            connection_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(30),
            http_path: "/thrift".to_string(),
        },
        transport: TransportConfig {
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            max_message_size: 16 * 1024 * 1024,
        },
        logging: LoggingConfig {
            app_name: "production-server".to_string(),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: true,
        },
    };

    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Production config should be valid, got: {:?}",
        errors
    );
}
