//! Observability events for aeroctl
//!
//! Every step of the bootstrap sequence that is worth a log line has
//! a typed event here. Events are explicit; free-form event names are
//! not used by the CLI itself.

use std::fmt;

/// Observable events during one aeroctl invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Debug logging was switched on by `--debug`
    DebugLoggingEnabled,
    /// Configuration file or string loaded and applied
    ConfigLoaded,
    /// Host identifier read from the data directory
    HostUuidResolved,

    // Identity
    /// Host identity loaded from disk
    IdentityLoaded,

    // Connection
    /// Connection bootstrap begins
    ConnectStart,
    /// Connection established and probed
    ConnectComplete,
    /// Dial, handshake or liveness probe failed; traced only
    ConnectFailed,

    // Dispatch
    /// Selected command handed to a module
    CommandDispatched,
    /// Matched module returned an error; traced only
    CommandFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::DebugLoggingEnabled => "DEBUG_LOGGING_ENABLED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::HostUuidResolved => "HOST_UUID_RESOLVED",

            Event::IdentityLoaded => "IDENTITY_LOADED",

            Event::ConnectStart => "CONNECT_START",
            Event::ConnectComplete => "CONNECT_COMPLETE",
            Event::ConnectFailed => "CONNECT_FAILED",

            Event::CommandDispatched => "COMMAND_DISPATCHED",
            Event::CommandFailed => "COMMAND_FAILED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
