//! Configuration for the tcpping client and server.
//!
//! Both binaries accept command-line arguments and an optional TOML file.
//! CLI arguments take precedence over config file values, which take
//! precedence over built-in defaults. One file may carry both a `[client]`
//! and a `[server]` section.

use crate::client::Family;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Port used by both client and server when none is configured.
pub const DEFAULT_PORT: u16 = 50414;

/// Pending-connection queue length for the listener.
pub const DEFAULT_BACKLOG: i32 = 10;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "tcpping")]
#[command(version)]
#[command(about = "TCP ping over one long-lived connection", long_about = None)]
pub struct ClientArgs {
    /// Target hostname or IP address (IPv4 or IPv6)
    pub host: String,

    /// Target port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Number of probes to send (default: until interrupted)
    #[arg(short, long)]
    pub count: Option<u64>,

    /// Seconds between probes
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Seconds to wait for each reply (0 = wait indefinitely)
    #[arg(short = 'W', long)]
    pub timeout: Option<u64>,

    /// Seconds to wait for the TCP handshake (default: system limit)
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Use IPv4 addresses only
    #[arg(short = '4', long, conflicts_with = "ipv6")]
    pub ipv4: bool,

    /// Use IPv6 addresses only
    #[arg(short = '6', long)]
    pub ipv6: bool,

    /// Path to TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "tcppingd")]
#[command(version)]
#[command(about = "Dual-stack responder for tcpping", long_about = None)]
pub struct ServerArgs {
    /// Port to listen on (all addresses, IPv4 and IPv6)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Maximum concurrent sessions (default: unbounded)
    #[arg(long)]
    pub max_sessions: Option<usize>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Client-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_port")]
    pub port: u16,
    pub count: Option<u64>,
    /// Seconds between probes
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Seconds to wait for each reply
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    pub connect_timeout: Option<u64>,
    #[serde(default)]
    pub family: Family,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            count: None,
            interval: default_interval(),
            timeout: default_timeout(),
            connect_timeout: None,
            family: Family::Auto,
        }
    }
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    pub max_sessions: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            backlog: default_backlog(),
            max_sessions: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_interval() -> u64 {
    1
}

fn default_timeout() -> u64 {
    5
}

fn default_backlog() -> i32 {
    DEFAULT_BACKLOG
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Validated client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub family: Family,
    /// `None` probes until cancelled.
    pub count: Option<u64>,
    pub interval: Duration,
    /// `None` waits for each reply without a deadline.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub log_level: String,
}

impl ClientConfig {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(ClientArgs::parse())
    }

    pub fn from_args(cli: ClientArgs) -> Result<Self, ConfigError> {
        let toml_config = read_toml(cli.config.as_ref())?;
        Self::merge(cli, toml_config)
    }

    /// Merge CLI args over TOML values and validate the result.
    pub fn merge(cli: ClientArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let file = toml_config.client;

        let host = cli.host.trim().to_string();
        if host.is_empty() {
            return Err(ConfigError::invalid("host", "must not be empty"));
        }

        let port = cli.port.unwrap_or(file.port);
        if port == 0 {
            return Err(ConfigError::invalid("port", "must be between 1 and 65535"));
        }

        let family = if cli.ipv4 {
            Family::V4
        } else if cli.ipv6 {
            Family::V6
        } else {
            file.family
        };

        let count = cli.count.or(file.count);
        if count == Some(0) {
            return Err(ConfigError::invalid("count", "must be at least 1"));
        }

        let interval = cli.interval.unwrap_or(file.interval);
        if interval == 0 {
            return Err(ConfigError::invalid("interval", "must be at least 1 second"));
        }

        let timeout = cli.timeout.unwrap_or(file.timeout);
        let connect_timeout = cli.connect_timeout.or(file.connect_timeout);

        Ok(ClientConfig {
            host,
            port,
            family,
            count,
            interval: Duration::from_secs(interval),
            timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            connect_timeout: connect_timeout
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }
}

/// Validated server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 0 binds an ephemeral port.
    pub port: u16,
    pub backlog: i32,
    /// `None` admits every accepted connection.
    pub max_sessions: Option<usize>,
    pub log_level: String,
}

impl ServerConfig {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(ServerArgs::parse())
    }

    pub fn from_args(cli: ServerArgs) -> Result<Self, ConfigError> {
        let toml_config = read_toml(cli.config.as_ref())?;
        Self::merge(cli, toml_config)
    }

    /// Merge CLI args over TOML values and validate the result.
    pub fn merge(cli: ServerArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let file = toml_config.server;

        let backlog = cli.backlog.unwrap_or(file.backlog);
        if backlog < 1 {
            return Err(ConfigError::invalid("backlog", "must be at least 1"));
        }

        let max_sessions = cli.max_sessions.or(file.max_sessions);
        if max_sessions == Some(0) {
            return Err(ConfigError::invalid("max_sessions", "must be at least 1"));
        }

        Ok(ServerConfig {
            port: cli.port.unwrap_or(file.port),
            backlog,
            max_sessions,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            max_sessions: None,
            log_level: default_log_level(),
        }
    }
}

fn read_toml(path: Option<&PathBuf>) -> Result<TomlConfig, ConfigError> {
    match path {
        Some(config_path) => {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents).map_err(|e| ConfigError::TomlParse(config_path.clone(), e))
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid { option: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(option: &'static str, reason: &str) -> Self {
        ConfigError::Invalid {
            option,
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid { option, reason } => {
                write!(f, "Invalid value for '{}': {}", option, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
