//! Configuration management for TLink.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Panel access codes for session encryption.
    #[serde(default)]
    pub access: AccessConfig,

    /// Protocol timing knobs.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.listen_port == 0 {
            return Err(Error::Config("listen_port must be non-zero".into()));
        }
        if self.access.type1_access_code.is_empty() && self.access.type2_access_code.is_empty() {
            return Err(Error::Config(
                "at least one of type1_access_code / type2_access_code must be set".into(),
            ));
        }
        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP port to accept panel connections on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Maximum concurrent panel connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            max_connections: default_max_connections(),
        }
    }
}

/// Access codes keying the panel encryption schemes.
///
/// A panel requesting a scheme whose code is empty fails its handshake
/// with an encryption error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Byte sequence used by Type1 key derivation.
    #[serde(default)]
    pub type1_access_code: String,

    /// Byte sequence used by Type2 key derivation.
    #[serde(default)]
    pub type2_access_code: String,
}

impl AccessConfig {
    /// The code for one scheme, as key-derivation input bytes.
    pub fn code_for(&self, type1: bool) -> &[u8] {
        if type1 {
            self.type1_access_code.as_bytes()
        } else {
            self.type2_access_code.as_bytes()
        }
    }
}

/// Protocol timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Inbound silence required before the post-connect send gate opens.
    #[serde(default = "default_quiet_gate", with = "humantime_serde")]
    pub quiet_gate: Duration,

    /// Interval between `ConnectionPoll` keep-alives.
    #[serde(default = "default_heartbeat_interval", with = "humantime_serde")]
    pub heartbeat_interval: Duration,

    /// Budget for a command-response wait.
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            quiet_gate: default_quiet_gate(),
            heartbeat_interval: default_heartbeat_interval(),
            command_timeout: default_command_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("text" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable ANSI colors.
    #[serde(default = "default_log_color")]
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_log_color(),
        }
    }
}

fn default_listen_port() -> u16 {
    crate::DEFAULT_PORT
}

fn default_max_connections() -> usize {
    256
}

fn default_quiet_gate() -> Duration {
    Duration::from_millis(2000)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(100)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_log_color() -> bool {
    true
}

/// Initialize the global tracing subscriber from the logging config.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(format!("failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color))
            .try_init()
            .map_err(|e| Error::Config(format!("failed to init logging: {e}")))?;
    }

    Ok(())
}
