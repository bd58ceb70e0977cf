//! # Configuration Management
//!
//! Centralized configuration for the connection layer.
//!
//! This module provides structured configuration for the listener suite,
//! including bind address, per-role ports, admission limits, and the
//! null-key emergency mode.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment variable overrides (`GATENET_*`)
//!
//! ## Security Considerations
//! - `null_key_mode` disables the key exchange and must never be enabled
//!   outside of emergency recovery; validation flags it loudly.
//! - Per-IP admission limits bound the damage a single host can do.

use crate::error::{GateError, Result};
use crate::handler::Role;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GateConfig {
    /// Listener and admission configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Security configuration
    #[serde(default)]
    pub security: SecurityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GateConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| GateError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| GateError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| GateError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override fields from `GATENET_*` environment variables where present
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("GATENET_BIND") {
            self.server.bind_address = addr;
        }

        if let Ok(port) = std::env::var("GATENET_LAUNCH_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                self.server.launch_port = val;
            }
        }

        if let Ok(port) = std::env::var("GATENET_LOGIN_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                self.server.login_port = val;
            }
        }

        if let Ok(port) = std::env::var("GATENET_MAP_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                self.server.map_port = val;
            }
        }

        if let Ok(limit) = std::env::var("GATENET_MAX_PER_IP") {
            if let Ok(val) = limit.parse::<usize>() {
                self.server.max_connections_per_ip = val;
            }
        }

        if let Ok(flag) = std::env::var("GATENET_NULL_KEY_MODE") {
            if let Ok(val) = flag.parse::<bool>() {
                self.security.null_key_mode = val;
            }
        }

        if let Ok(level) = std::env::var("GATENET_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                self.logging.log_level = val;
            }
        }
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

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation problems. Entries prefixed with
    /// `WARNING:` are advisory; everything else should block startup.
    /// An empty list means the configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.security.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|e| !e.starts_with("WARNING:"))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GateError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener and admission configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address all role listeners bind to (e.g. "0.0.0.0")
    pub bind_address: String,

    /// Port for the launch-role listener
    pub launch_port: u16,

    /// Port for the login-role listener
    pub login_port: u16,

    /// Port for the map-role listener
    pub map_port: u16,

    /// Maximum live connections admitted per peer IP, per listener
    pub max_connections_per_ip: usize,

    /// Pause after a failed accept before the loop retries
    #[serde(with = "duration_serde")]
    pub accept_retry_pause: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            launch_port: 7000,
            login_port: 7001,
            map_port: 7002,
            max_connections_per_ip: 100,
            accept_retry_pause: Duration::from_millis(100),
        }
    }
}

impl ServerConfig {
    /// The port assigned to a role's listener
    pub fn port_for(&self, role: Role) -> u16 {
        match role {
            Role::Launch => self.launch_port,
            Role::Login => self.login_port,
            Role::Map => self.map_port,
        }
    }

    /// The parsed bind IP
    pub fn bind_ip(&self) -> Result<IpAddr> {
        self.bind_address
            .parse::<IpAddr>()
            .map_err(|_| GateError::Config(format!("Invalid bind address: '{}'", self.bind_address)))
    }

    /// Validate listener configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind_address.is_empty() {
            errors.push("Bind address cannot be empty".to_string());
        } else if self.bind_address.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "Invalid bind address: '{}' (expected an IP such as '0.0.0.0')",
                self.bind_address
            ));
        }

        let ports = [
            (Role::Launch, self.launch_port),
            (Role::Login, self.login_port),
            (Role::Map, self.map_port),
        ];
        for (role, port) in ports {
            if port == 0 {
                errors.push(format!("{role} port must be nonzero"));
            }
        }
        for i in 0..ports.len() {
            for (role_b, port_b) in ports.iter().skip(i + 1) {
                let (role_a, port_a) = ports[i];
                if port_a == *port_b && port_a != 0 {
                    errors.push(format!(
                        "{role_a} and {role_b} listeners share port {port_a}"
                    ));
                }
            }
        }

        if self.max_connections_per_ip == 0 {
            errors.push("Max connections per IP must be greater than 0".to_string());
        } else if self.max_connections_per_ip > 100_000 {
            errors.push(format!(
                "Max connections per IP very high: {} (ensure system resources can support this)",
                self.max_connections_per_ip
            ));
        }

        if self.accept_retry_pause.as_secs() > 10 {
            errors.push("Accept retry pause too long (maximum: 10s)".to_string());
        }

        errors
    }
}

/// Security configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SecurityConfig {
    /// Emergency mode: skip the key exchange and run sessions under an
    /// all-zero key. Off by default. Never enable outside of recovery.
    #[serde(default)]
    pub null_key_mode: bool,
}

impl SecurityConfig {
    /// Validate security configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.null_key_mode {
            errors.push(
                "WARNING: null-key mode is enabled - sessions are effectively unencrypted"
                    .to_string(),
            );
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("gatenet"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization (milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
