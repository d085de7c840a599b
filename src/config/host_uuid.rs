//! Persistent host identifier
//!
//! The identifier is written once when the host joins the cluster and
//! lives in `<data_dir>/host_uuid`. aeroctl only reads it; a missing
//! file means the host has never joined.

use std::fs;
use std::path::Path;

use uuid::Uuid;

use super::ConfigError;

/// File name of the host identifier inside the data directory
pub const HOST_UUID_FILE: &str = "host_uuid";

/// Read the host identifier from `data_dir`
pub fn read_host_uuid(data_dir: &Path) -> Result<String, ConfigError> {
    let path = data_dir.join(HOST_UUID_FILE);
    let content = fs::read_to_string(&path).map_err(|e| ConfigError::HostUuid {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::HostUuid {
            path,
            reason: "file is empty".to_string(),
        });
    }

    let uuid = Uuid::parse_str(trimmed).map_err(|e| ConfigError::HostUuid {
        path,
        reason: format!("not a valid uuid: {}", e),
    })?;

    Ok(uuid.to_string())
}

/// Write `uuid` as the host identifier of `data_dir`
pub fn write_host_uuid(data_dir: &Path, uuid: &Uuid) -> Result<(), ConfigError> {
    let path = data_dir.join(HOST_UUID_FILE);
    fs::create_dir_all(data_dir)
        .and_then(|_| fs::write(&path, uuid.to_string()))
        .map_err(|e| ConfigError::HostUuid {
            path,
            reason: e.to_string(),
        })
}
