//! Runtime configuration shared by every command module
//!
//! `RuntimeConfig` is created once per invocation with compiled-in
//! defaults, handed to each module during registration, resolved from
//! the configuration file / string, and finally back-filled by the
//! connection bootstrap (`auth_enabled`, default server address).
//!
//! Field ownership:
//! - `auth_servers`, `data_dir`, `hostname`, `cluster_name`,
//!   `log_severity`: configuration resolver
//! - `host_uuid`: configuration resolver (read from the data directory)
//! - `auth_enabled`, default entry in `auth_servers`: connection bootstrap
//! - `namespace`: resource commands

pub mod file;
pub mod host_uuid;
pub mod resolver;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::observability::Severity;

pub use file::{read_config_file, read_from_string, FileConfig};
pub use host_uuid::{read_host_uuid, write_host_uuid, HOST_UUID_FILE};
pub use resolver::ConfigResolver;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/aeroctl/aeroctl.json";

/// Default data directory holding the host uuid and identities
pub const DEFAULT_DATA_DIR: &str = "/var/lib/aeroctl";

/// Port the control-plane (auth) service listens on by default
pub const DEFAULT_AUTH_PORT: u16 = 3025;

/// Host used when no control-plane address is configured
pub const DEFAULT_AUTH_HOST: &str = "127.0.0.1";

/// Default resource namespace
pub const DEFAULT_NAMESPACE: &str = "default";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file missing or unreadable
    #[error("failed to read configuration file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration is not valid JSON or has unknown fields
    #[error("failed to parse configuration from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration string is not valid base64
    #[error("configuration string is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// A value in an otherwise well-formed configuration is invalid
    #[error("invalid configuration value: {0}")]
    Invalid(String),

    /// Host uuid file missing, unreadable or malformed
    #[error("failed to read host uuid from {}: {}", .path.display(), .reason)]
    HostUuid { path: PathBuf, reason: String },
}

/// A network address of a control-plane server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetAddr {
    pub host: String,
    pub port: u16,
}

impl NetAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The address used when no control-plane server is configured
    pub fn default_auth_connect() -> Self {
        Self::new(DEFAULT_AUTH_HOST, DEFAULT_AUTH_PORT)
    }

    /// `host:port`, bracketing IPv6 hosts
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr())
    }
}

impl FromStr for NetAddr {
    type Err = ConfigError;

    /// Parses `host`, `host:port`, `[v6]:port` with an optional `tcp://`
    /// prefix. A missing port means the default control-plane port.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let rest = trimmed.strip_prefix("tcp://").unwrap_or(trimmed);
        if rest.is_empty() {
            return Err(ConfigError::Invalid(format!("empty address '{}'", s)));
        }

        if let Some(v6) = rest.strip_prefix('[') {
            let (host, tail) = v6
                .split_once(']')
                .ok_or_else(|| ConfigError::Invalid(format!("unterminated IPv6 address '{}'", s)))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => parse_port(p, s)?,
                None if tail.is_empty() => DEFAULT_AUTH_PORT,
                None => return Err(ConfigError::Invalid(format!("invalid address '{}'", s))),
            };
            return Ok(Self::new(host, port));
        }

        match rest.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => {
                // Bare IPv6 without brackets carries no port
                Ok(Self::new(rest, DEFAULT_AUTH_PORT))
            }
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(ConfigError::Invalid(format!("missing host in '{}'", s)));
                }
                Ok(Self::new(host, parse_port(port, s)?))
            }
            None => Ok(Self::new(rest, DEFAULT_AUTH_PORT)),
        }
    }
}

fn parse_port(port: &str, input: &str) -> Result<u16, ConfigError> {
    port.parse::<u16>()
        .map_err(|_| ConfigError::Invalid(format!("invalid port in '{}'", input)))
}

impl Serialize for NetAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.addr())
    }
}

impl<'de> Deserialize<'de> for NetAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Process-lifetime configuration shared by all command modules
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Control-plane servers, first entry is the one dialed
    pub auth_servers: Vec<NetAddr>,
    /// Directory holding `host_uuid` and host identities
    pub data_dir: PathBuf,
    /// Unique identifier of this host
    pub host_uuid: String,
    /// Node name reported to the control plane
    pub hostname: String,
    /// Cluster this host belongs to, if configured
    pub cluster_name: Option<String>,
    /// Set once the client decides to talk to the control plane directly
    pub auth_enabled: bool,
    /// Log threshold used when `--debug` is not given
    pub log_severity: Severity,
    /// Namespace resource commands operate in
    pub namespace: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            auth_servers: Vec::new(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            host_uuid: String::new(),
            hostname: default_hostname(),
            cluster_name: None,
            auth_enabled: false,
            log_severity: Severity::Warn,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Server the connection bootstrap dials
    pub fn primary_auth_server(&self) -> Option<&NetAddr> {
        self.auth_servers.first()
    }
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
