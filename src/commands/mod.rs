//! Built-in command modules
//!
//! - `tokens`: list and delete join tokens
//! - `auth`: export, generate and sign with certificate authorities
//! - `get` / `create` / `del`: generic resource access
//!
//! Each module only knows its own commands and talks to the control plane
//! through `Client::call`.

pub mod auth;
pub mod resources;
pub mod tokens;

use serde_json::Value;

use crate::cli::{CliError, CliResult, CommandModule};

pub use auth::AuthCommand;
pub use resources::{ResourceCommand, ResourceRef};
pub use tokens::TokenCommand;

/// The command modules shipped with the binary, in dispatch order
pub fn default_modules() -> Vec<Box<dyn CommandModule>> {
    vec![
        Box::new(ResourceCommand::default()),
        Box::new(TokenCommand::default()),
        Box::new(AuthCommand::default()),
    ]
}

/// Parse a duration like `12h`, `30m`, `90s` or `3600` into seconds
pub fn parse_duration(s: &str) -> CliResult<u64> {
    let s = s.trim();
    let invalid = || {
        CliError::command_failed(format!(
            "invalid duration '{}', expected e.g. 12h, 30m, 3600s",
            s
        ))
    };

    let (digits, unit) = if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else if let Some(minutes) = s.strip_suffix('m') {
        (minutes, 60)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else {
        (s, 1)
    };

    let n: u64 = digits.parse().map_err(|_| invalid())?;
    n.checked_mul(unit).ok_or_else(invalid)
}

/// String field of a response object, empty if absent
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Response data expected to be a list; `null` counts as empty
pub(crate) fn as_list(data: &Value, what: &str) -> CliResult<Vec<Value>> {
    match data {
        Value::Array(items) => Ok(items.clone()),
        Value::Null => Ok(Vec::new()),
        other => Err(CliError::command_failed(format!(
            "expected a list of {}, got {}",
            what, other
        ))),
    }
}
