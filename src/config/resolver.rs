//! Configuration resolution
//!
//! Strict order, later steps override earlier ones:
//! 1. Configuration file: the explicit `--config` path, or the default
//!    path if it exists. Skipped when only a configuration string is given.
//! 2. Configuration string (`--config-string` / `AEROCTL_CONFIG`),
//!    overriding the file field by field.
//! 3. Apply the result onto the `RuntimeConfig` defaults.
//! 4. `--debug` raises logging to TRACE process-wide.
//! 5. Read the host uuid from the data directory.
//!
//! Any failure is terminal for the invocation.

use std::path::{Path, PathBuf};

use super::file::{read_config_file, read_from_string, FileConfig};
use super::host_uuid::read_host_uuid;
use super::{ConfigError, RuntimeConfig, DEFAULT_CONFIG_PATH};
use crate::cli::GlobalFlags;
use crate::observability::{log_event, log_event_with_fields, Event, Logger, Severity};

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Nothing configured, compiled-in defaults only
    Defaults,
    File(PathBuf),
    String,
    /// Configuration string layered over a file
    FileAndString(PathBuf),
}

impl ConfigSource {
    fn describe(&self) -> String {
        match self {
            ConfigSource::Defaults => "defaults".to_string(),
            ConfigSource::File(p) => p.display().to_string(),
            ConfigSource::String => "config-string".to_string(),
            ConfigSource::FileAndString(p) => format!("{} + config-string", p.display()),
        }
    }
}

/// Resolves file, string and flag configuration into a `RuntimeConfig`
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    default_config_path: PathBuf,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl ConfigResolver {
    /// Resolver that falls back to `default_config_path` when no
    /// `--config` is given
    pub fn new(default_config_path: impl Into<PathBuf>) -> Self {
        Self {
            default_config_path: default_config_path.into(),
        }
    }

    pub fn default_config_path(&self) -> &Path {
        &self.default_config_path
    }

    /// Load file and string configuration and merge them.
    ///
    /// Returns `None` when neither source is present.
    pub fn load(
        &self,
        flags: &GlobalFlags,
    ) -> Result<Option<(FileConfig, ConfigSource)>, ConfigError> {
        let config_string = flags
            .config_string
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let file = match (&flags.config_file, config_string) {
            (Some(path), _) => Some((read_config_file(path)?, path.clone())),
            (None, None) if self.default_config_path.exists() => Some((
                read_config_file(&self.default_config_path)?,
                self.default_config_path.clone(),
            )),
            _ => None,
        };

        let string = config_string.map(read_from_string).transpose()?;

        Ok(match (file, string) {
            (Some((fc, path)), Some(sc)) => Some((fc.merge(sc), ConfigSource::FileAndString(path))),
            (Some((fc, path)), None) => Some((fc, ConfigSource::File(path))),
            (None, Some(sc)) => Some((sc, ConfigSource::String)),
            (None, None) => None,
        })
    }

    /// Resolve the full runtime configuration in place
    pub fn apply_config(
        &self,
        flags: &GlobalFlags,
        cfg: &mut RuntimeConfig,
    ) -> Result<ConfigSource, ConfigError> {
        let source = match self.load(flags)? {
            Some((fc, source)) => {
                fc.apply(cfg)?;
                source
            }
            None => ConfigSource::Defaults,
        };

        if flags.debug {
            Logger::init(Severity::Trace);
            log_event(Event::DebugLoggingEnabled);
        } else {
            Logger::init(cfg.log_severity);
        }
        log_event_with_fields(Event::ConfigLoaded, &[("source", source.describe().as_str())]);

        cfg.host_uuid = read_host_uuid(&cfg.data_dir)?;
        log_event_with_fields(Event::HostUuidResolved, &[("host_uuid", cfg.host_uuid.as_str())]);

        Ok(source)
    }
}
