//! CLI-specific error types
//!
//! Every CLI error is fatal for the invocation. Errors raised before the
//! selected command runs (configuration, identity, connection) are
//! bootstrap errors; errors raised by a matched command module are
//! command errors and carry the command name.

use std::fmt;
use std::io;

use crate::client::ClientError;
use crate::config::{ConfigError, NetAddr};
use crate::identity::IdentityError;

/// When an error happened relative to the selected command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    /// Before the command ran
    Bootstrap,
    /// While the matched command ran
    Command,
}

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file or string malformed, or file missing
    ConfigParse,
    /// Configuration string is not valid base64
    ConfigDecode,
    /// Host uuid missing or unreadable
    HostUuid,
    /// Host identity absent (host never joined)
    IdentityNotFound,
    /// Host identity present but unusable
    IdentityCorrupt,
    /// Control plane could not be dialed or did not answer the probe
    ConnectionUnreachable,
    /// Control plane refused the host identity during the handshake
    AccessDenied,
    /// A matched command failed
    CommandExecution,
    /// No module claimed a registered command
    ProgrammingInvariant,
    /// Invalid command line
    Usage,
    /// I/O error (stdout, local files)
    Io,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigParse => "AERO_CLI_CONFIG_PARSE",
            Self::ConfigDecode => "AERO_CLI_CONFIG_DECODE",
            Self::HostUuid => "AERO_CLI_HOST_UUID",
            Self::IdentityNotFound => "AERO_CLI_IDENTITY_NOT_FOUND",
            Self::IdentityCorrupt => "AERO_CLI_IDENTITY_CORRUPT",
            Self::ConnectionUnreachable => "AERO_CLI_CONNECTION_UNREACHABLE",
            Self::AccessDenied => "AERO_CLI_ACCESS_DENIED",
            Self::CommandExecution => "AERO_CLI_COMMAND_FAILED",
            Self::ProgrammingInvariant => "AERO_CLI_INVARIANT_VIOLATION",
            Self::Usage => "AERO_CLI_USAGE",
            Self::Io => "AERO_CLI_IO_ERROR",
        }
    }

    /// Process exit status for this code
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage => 2,
            _ => 1,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
    command: Option<String>,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            command: None,
        }
    }

    /// Config parse error
    pub fn config_parse(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigParse, msg)
    }

    /// Command failed
    pub fn command_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::CommandExecution, msg)
    }

    /// Invalid command line
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Usage, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Io, msg)
    }

    /// No module claimed a command obtained through registration
    pub fn unclaimed_command(command: &str) -> Self {
        Self::new(
            CliErrorCode::ProgrammingInvariant,
            format!("no command module handles '{}'", command),
        )
    }

    /// Dial or liveness probe against `addr` failed
    pub fn unreachable(addr: &NetAddr, cause: impl fmt::Display) -> Self {
        Self::new(
            CliErrorCode::ConnectionUnreachable,
            format!(
                "cannot connect to the auth server: {}. Is the auth server running on {}?",
                cause, addr
            ),
        )
    }

    /// The server at `addr` answered but refused this host's identity
    pub fn access_denied(addr: &NetAddr, cause: impl fmt::Display) -> Self {
        Self::new(
            CliErrorCode::AccessDenied,
            format!(
                "the auth server on {} rejected the identity of this host: {}",
                addr, cause
            ),
        )
    }

    /// Mark this error as raised by `command`
    pub fn in_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Command that raised the error, if any
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn stage(&self) -> ErrorStage {
        if self.command.is_some() {
            ErrorStage::Command
        } else {
            ErrorStage::Bootstrap
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }

    /// User-facing rendering, distinguishing bootstrap and command errors.
    ///
    /// Usage errors carry clap's own rendering and are shown untouched.
    pub fn report(&self) -> String {
        match (&self.code, &self.command) {
            (CliErrorCode::Usage, _) => self.message.trim_end().to_string(),
            (_, Some(command)) => format!("error: command '{}' failed: {}", command, self),
            (_, None) => format!("error: {}", self),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        let code = match &e {
            ConfigError::Decode(_) => CliErrorCode::ConfigDecode,
            ConfigError::HostUuid { .. } => CliErrorCode::HostUuid,
            ConfigError::Read { .. } | ConfigError::Parse { .. } | ConfigError::Invalid(_) => {
                CliErrorCode::ConfigParse
            }
        };
        Self::new(code, e.to_string())
    }
}

impl From<IdentityError> for CliError {
    fn from(e: IdentityError) -> Self {
        let code = match &e {
            IdentityError::NotFound { .. } => CliErrorCode::IdentityNotFound,
            IdentityError::Corrupt { .. } => CliErrorCode::IdentityCorrupt,
            IdentityError::Write { .. } => CliErrorCode::Io,
        };
        Self::new(code, e.to_string())
    }
}

/// Requests issued by a running command
impl From<ClientError> for CliError {
    fn from(e: ClientError) -> Self {
        Self::command_failed(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
