//! Observability for aeroctl
//!
//! Structured JSON logging to stderr and the typed lifecycle events of
//! one invocation (configuration, identity, connection, dispatch).
//!
//! # Usage
//!
//! ```ignore
//! use aeroctl::observability::{log_event_with_fields, Event, Logger, Severity};
//!
//! Logger::init(Severity::Warn);
//! log_event_with_fields(Event::ConnectStart, &[("addr", "127.0.0.1:3025")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields at INFO level
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(Severity::Info, event.as_str(), fields);
}

/// Log a lifecycle event at TRACE level
pub fn trace_event(event: Event, fields: &[(&str, &str)]) {
    Logger::trace(event.as_str(), fields);
}
