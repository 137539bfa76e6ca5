//! Configuration loading for kes-relay.
//!
//! Configuration is loaded from a TOML file (default: `kes-relay.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for kes-relay.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Rate limiting and session bounds.
    pub limits: LimitsConfig,
    /// Key exchange behavior.
    pub exchange: ExchangeConfig,
    /// HTTP endpoints configuration.
    pub http: HttpConfig,
    /// Background sweep configuration.
    pub cleanup: CleanupConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Secret key path for the iroh endpoint (optional, generates if missing).
    ///
    /// Without it the relay gets a new endpoint id on every start.
    pub secret_key_path: Option<PathBuf>,
    /// Default tracing filter when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum new connections per peer per minute (default: 10).
    #[serde(default = "default_connections_per_minute")]
    pub connections_per_minute: u32,
    /// Maximum messages per peer per minute (default: 60).
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,
    /// Maximum messages per second across all peers (default: 1000).
    #[serde(default = "default_global_requests_per_second")]
    pub global_requests_per_second: u32,
    /// Maximum concurrent sessions (default: 10000).
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
    /// Close a session after this many seconds without a new message (default: 300).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Maximum message size in bytes (default: 64KB).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Key exchange behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Reply to lookups for unknown identities (default: false).
    ///
    /// Off by default so that the relay does not reveal which identities
    /// have published keys.
    #[serde(default)]
    pub reply_on_miss: bool,
    /// Reply text sent on a miss when `reply_on_miss` is set.
    #[serde(default = "default_miss_reply")]
    pub miss_reply: String,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Serve HTTP endpoints (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bind address for HTTP server (default: 127.0.0.1:8080).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

/// Rate limiter sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Sweep interval in seconds (default: 600 = 10 minutes).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable sweep task (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_connections_per_minute() -> u32 {
    10
}

fn default_messages_per_minute() -> u32 {
    60
}

fn default_global_requests_per_second() -> u32 {
    1000
}

fn default_max_concurrent_sessions() -> usize {
    10_000
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64KB, far above any PEM public key
}

fn default_miss_reply() -> String {
    "no key found".to_string()
}

fn default_http_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_cleanup_interval() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            secret_key_path: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            connections_per_minute: default_connections_per_minute(),
            messages_per_minute: default_messages_per_minute(),
            global_requests_per_second: default_global_requests_per_second(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            reply_on_miss: false,
            miss_reply: default_miss_reply(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_http_bind(),
            metrics_enabled: true,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    ///
    /// The flag reports whether the file was found.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<(Self, bool)> {
        if !path.exists() {
            return Ok((Self::default(), false));
        }
        Ok((Self::from_file(path)?, true))
    }

    /// Reject values the rate limiters and framing cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        let checks = [
            ("limits.connections_per_minute", limits.connections_per_minute as usize),
            ("limits.messages_per_minute", limits.messages_per_minute as usize),
            ("limits.global_requests_per_second", limits.global_requests_per_second as usize),
            ("limits.max_concurrent_sessions", limits.max_concurrent_sessions),
            ("limits.max_message_size", limits.max_message_size),
            ("cleanup.interval_secs", self.cleanup.interval_secs as usize),
        ];

        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if limits.max_message_size > u32::MAX as usize {
            return Err(ConfigError::Invalid {
                field: "limits.max_message_size",
                reason: "must fit in a 4-byte length prefix".to_string(),
            });
        }

        Ok(())
    }
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
    /// A value is out of range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, found) = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert!(!found);
        assert_eq!(config.limits.messages_per_minute, 60);
    }

    #[test]
    fn existing_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[exchange]\nreply_on_miss = true").unwrap();

        let (config, found) = Config::load_or_default(file.path()).unwrap();
        assert!(found);
        assert!(config.exchange.reply_on_miss);
    }

    #[test]
    fn broken_file_is_a_startup_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmessages_per_minute = 0").unwrap();

        let err = Config::load_or_default(file.path()).unwrap_err();
        assert!(matches!(err, RelayError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.messages_per_minute, 60);
        assert_eq!(config.limits.max_message_size, 64 * 1024);
        assert!(!config.exchange.reply_on_miss);
        assert!(config.server.secret_key_path.is_none());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
secret_key_path = "/var/lib/kes/relay.key"
log_level = "debug"

[limits]
messages_per_minute = 5
idle_timeout_secs = 30

[exchange]
reply_on_miss = true
miss_reply = "unknown peer"

[http]
bind_address = "0.0.0.0:9090"

[cleanup]
interval_secs = 1800
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.server.secret_key_path,
            Some(PathBuf::from("/var/lib/kes/relay.key"))
        );
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.limits.messages_per_minute, 5);
        assert_eq!(config.limits.idle_timeout_secs, 30);
        assert!(config.exchange.reply_on_miss);
        assert_eq!(config.exchange.miss_reply, "unknown peer");
        assert_eq!(config.http.bind_address, "0.0.0.0:9090");
        assert_eq!(config.cleanup.interval_secs, 1800);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.limits.connections_per_minute, 10);
        assert_eq!(config.exchange.miss_reply, "no key found");
        assert!(config.http.enabled);
        assert!(config.cleanup.enabled);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let toml = r#"
[limits]
[exchange]
reply_on_miss = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.limits.global_requests_per_second, 1000);
        assert_eq!(config.exchange.miss_reply, "no key found");
        assert_eq!(config.http.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn zero_rate_is_rejected() {
        let mut config = Config::default();
        config.limits.messages_per_minute = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("limits.messages_per_minute"));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmax_concurrent_sessions = 3").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.limits.max_concurrent_sessions, 3);
    }

    #[test]
    fn from_file_rejects_zero_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmax_message_size = 0").unwrap();

        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn from_file_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits\nbroken").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn from_file_missing_file() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/kes.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
