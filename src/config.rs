//! Configuration management for sandbox-ftpd
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `SANDBOX_FTPD_*` environment variables, then the short legacy variables
//! (`FTP_IP`, `PASV_PROMISCUOUS`, `PASV_TIMEOUT`). Command-line flags are
//! applied on top by the binary.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::{AddrParseError, IpAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `SANDBOX_FTPD_CONTROL_PORT`.
pub const ENV_PREFIX: &str = "SANDBOX_FTPD";

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address for the control listener and passive data listeners
    pub bind_address: String,

    /// Port for the control connection (0 lets the OS pick)
    pub control_port: u16,

    /// Home of the server: holds `accounts.txt`, `home/` and `logs/`
    pub ftp_home: PathBuf,

    /// Address advertised in PASV replies, overrides discovery
    pub pasv_address: Option<String>,

    /// Inclusive PASV port range; `pasv_port_min = 0` means OS-assigned ports
    pub pasv_port_min: u16,
    pub pasv_port_max: u16,

    /// Accept passive data connections from any source address
    pub pasv_promiscuous: bool,

    /// How long a passive listener waits for the client (also bounds active dials)
    pub pasv_timeout_secs: u64,

    /// Idle limit on the control connection
    pub session_timeout_secs: u64,

    /// Maximum control line length in bytes
    pub max_command_length: usize,

    /// Chunk size for file transfers
    pub buffer_size: usize,

    /// Disable per-session transcript files
    pub disable_logging: bool,

    /// Service returning this host's public address as plain text
    pub public_ip_url: String,
}

/// The PASV port policy derived from the configured range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassivePorts {
    /// Let the OS assign an ephemeral port
    Ephemeral,
    /// Scan the inclusive range in ascending order
    Range { min: u16, max: u16 },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            control_port: 21,
            ftp_home: PathBuf::from("."),
            pasv_address: None,
            pasv_port_min: 8123,
            pasv_port_max: 8129,
            pasv_promiscuous: false,
            pasv_timeout_secs: 30,
            session_timeout_secs: 12 * 60 * 60,
            max_command_length: 1024,
            buffer_size: 100 * 1024,
            disable_logging: false,
            public_ip_url: "http://icanhazip.com".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional TOML file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let mut builder = Config::builder()
            .set_default("bind_address", defaults.bind_address.clone())?
            .set_default("control_port", defaults.control_port)?
            .set_default("ftp_home", defaults.ftp_home.to_string_lossy().to_string())?
            .set_default("pasv_port_min", defaults.pasv_port_min)?
            .set_default("pasv_port_max", defaults.pasv_port_max)?
            .set_default("pasv_promiscuous", defaults.pasv_promiscuous)?
            .set_default("pasv_timeout_secs", defaults.pasv_timeout_secs)?
            .set_default("session_timeout_secs", defaults.session_timeout_secs)?
            .set_default("max_command_length", defaults.max_command_length as u64)?
            .set_default("buffer_size", defaults.buffer_size as u64)?
            .set_default("disable_logging", defaults.disable_logging)?
            .set_default("public_ip_url", defaults.public_ip_url.clone())?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let mut config: ServerConfig = settings.try_deserialize()?;
        config.apply_env_aliases(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the short environment variable names operators already use.
    pub fn apply_env_aliases<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ip) = lookup("FTP_IP") {
            self.pasv_address = Some(ip);
        }
        if let Some(flag) = lookup("PASV_PROMISCUOUS") {
            self.pasv_promiscuous = flag.trim() == "true";
        }
        if let Some(secs) = lookup("PASV_TIMEOUT") {
            self.pasv_timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Message(format!("PASV_TIMEOUT is not a number of seconds: {secs}"))
            })?;
        }
        Ok(())
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pasv_port_min != 0 && self.pasv_port_min > self.pasv_port_max {
            return Err(ConfigError::Message(
                "pasv_port_min must not exceed pasv_port_max".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(ConfigError::Message("buffer_size must be greater than 0".into()));
        }

        if self.max_command_length == 0 {
            return Err(ConfigError::Message(
                "max_command_length must be greater than 0".into(),
            ));
        }

        if self.pasv_timeout_secs == 0 || self.session_timeout_secs == 0 {
            return Err(ConfigError::Message("timeouts must be greater than 0".into()));
        }

        Ok(())
    }

    /// Get bind address and control port as socket address string
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    pub fn passive_ports(&self) -> PassivePorts {
        if self.pasv_port_min == 0 {
            PassivePorts::Ephemeral
        } else {
            PassivePorts::Range {
                min: self.pasv_port_min,
                max: self.pasv_port_max,
            }
        }
    }

    /// Path of the flat credential file
    pub fn accounts_file(&self) -> PathBuf {
        self.ftp_home.join("accounts.txt")
    }

    /// Directory for session transcripts, `None` when disabled
    pub fn log_dir(&self) -> Option<PathBuf> {
        if self.disable_logging {
            None
        } else {
            Some(self.ftp_home.join("logs"))
        }
    }

    pub fn pasv_timeout(&self) -> Duration {
        Duration::from_secs(self.pasv_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Parse the bind address used for passive listeners.
    pub fn data_bind_ip(&self) -> Result<IpAddr, AddrParseError> {
        self.bind_address.parse()
    }
}
