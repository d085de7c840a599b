//! Configuration file and configuration string
//!
//! Both sources share one JSON shape:
//!
//! ```json
//! {
//!   "global": {
//!     "nodename": "node-1",
//!     "data_dir": "/var/lib/aeroctl",
//!     "auth_servers": ["10.0.0.1:3025"],
//!     "log": { "severity": "info" }
//!   },
//!   "auth_service": { "enabled": true, "cluster_name": "main" }
//! }
//! ```
//!
//! Every field is optional. Unknown fields are rejected.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{ConfigError, NetAddr, RuntimeConfig};
use crate::observability::Severity;

/// Parsed configuration file or string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub global: GlobalSection,
    #[serde(default)]
    pub auth_service: AuthServiceSection,
}

/// Settings common to every aeroctl invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_servers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthServiceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

impl FileConfig {
    /// Overlay `over` on top of `self`, field by field.
    ///
    /// Fields present in `over` win; fields absent from `over` keep the
    /// value from `self`.
    pub fn merge(self, over: FileConfig) -> FileConfig {
        let log = match (self.global.log, over.global.log) {
            (Some(base), Some(top)) => Some(LogSection {
                severity: top.severity.or(base.severity),
            }),
            (base, top) => top.or(base),
        };

        FileConfig {
            global: GlobalSection {
                nodename: over.global.nodename.or(self.global.nodename),
                data_dir: over.global.data_dir.or(self.global.data_dir),
                auth_servers: over.global.auth_servers.or(self.global.auth_servers),
                log,
            },
            auth_service: AuthServiceSection {
                enabled: over.auth_service.enabled.or(self.auth_service.enabled),
                cluster_name: over
                    .auth_service
                    .cluster_name
                    .or(self.auth_service.cluster_name),
            },
        }
    }

    /// Encode as the base64 string accepted by `--config-string`
    pub fn to_config_string(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(self).map_err(|source| ConfigError::Parse {
            origin: "configuration string".to_string(),
            source,
        })?;
        Ok(STANDARD.encode(json))
    }

    /// Apply the configured values onto `cfg`.
    ///
    /// Values absent here leave the corresponding `cfg` field untouched,
    /// so defaults set earlier survive.
    pub fn apply(&self, cfg: &mut RuntimeConfig) -> Result<(), ConfigError> {
        if let Some(nodename) = non_empty(&self.global.nodename) {
            cfg.hostname = nodename.to_string();
        }
        if let Some(data_dir) = &self.global.data_dir {
            if data_dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("data_dir must not be empty".to_string()));
            }
            cfg.data_dir = data_dir.clone();
        }
        if let Some(servers) = &self.global.auth_servers {
            cfg.auth_servers = servers
                .iter()
                .map(|s| s.parse::<NetAddr>())
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(severity) = self.global.log.as_ref().and_then(|l| l.severity.as_deref()) {
            cfg.log_severity = severity
                .parse::<Severity>()
                .map_err(ConfigError::Invalid)?;
        }
        if let Some(enabled) = self.auth_service.enabled {
            cfg.auth_enabled = enabled;
        }
        if let Some(cluster_name) = non_empty(&self.auth_service.cluster_name) {
            cfg.cluster_name = Some(cluster_name.to_string());
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Read a configuration file.
///
/// A missing or unreadable file is an error; callers decide whether a
/// path is worth reading at all.
pub fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        origin: path.display().to_string(),
        source,
    })
}

/// Decode a base64 configuration string
pub fn read_from_string(encoded: &str) -> Result<FileConfig, ConfigError> {
    let bytes = STANDARD.decode(encoded.trim())?;

    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
        origin: "configuration string".to_string(),
        source,
    })
}
