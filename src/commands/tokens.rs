//! Join token commands
//!
//! - `tokens ls`: table of active tokens
//! - `tokens del <token>`: revoke a token

use clap::{Arg, Command};
use serde_json::{json, Value};

use super::{as_list, str_field};
use crate::cli::{write_text, CliError, CliResult, CommandModule, SelectedCommand, Table};
use crate::client::Client;
use crate::config::RuntimeConfig;

const LIST: &str = "tokens ls";
const DELETE: &str = "tokens del";

const METHOD_LIST: &str = "tokens.list";
const METHOD_DELETE: &str = "tokens.delete";

#[derive(Debug, Default)]
pub struct TokenCommand;

impl CommandModule for TokenCommand {
    fn initialize(&mut self, app: Command, _cfg: &mut RuntimeConfig) -> Command {
        app.subcommand(
            Command::new("tokens")
                .about("List or revoke invitation tokens")
                .subcommand_required(true)
                .subcommand(Command::new("ls").about("List active tokens"))
                .subcommand(
                    Command::new("del").about("Delete a token").arg(
                        Arg::new("token")
                            .required(true)
                            .help("Token to delete"),
                    ),
                ),
        )
    }

    fn try_run(&mut self, selected: &SelectedCommand, client: &Client) -> CliResult<bool> {
        match selected.name() {
            LIST => self.list(client)?,
            DELETE => {
                let token = selected
                    .matches()
                    .get_one::<String>("token")
                    .ok_or_else(|| CliError::usage("missing token"))?;
                self.delete(client, token)?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl TokenCommand {
    fn list(&self, client: &Client) -> CliResult<()> {
        let data = client.call(METHOD_LIST, json!({}))?;
        let tokens = as_list(&data, "tokens")?;
        if tokens.is_empty() {
            return write_text("No active tokens found.");
        }
        write_text(&render_tokens(&tokens).render())
    }

    fn delete(&self, client: &Client, token: &str) -> CliResult<()> {
        client.call(METHOD_DELETE, json!({ "token": token }))?;
        write_text(&format!("Token {} has been deleted", token))
    }
}

/// Token / Role / Expiry table
pub fn render_tokens(tokens: &[Value]) -> Table {
    let mut table = Table::new(["Token", "Role", "Expiry Time (UTC)"]);
    for token in tokens {
        let roles = match token.get("roles") {
            Some(Value::Array(roles)) => roles
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
            _ => str_field(token, "role").to_string(),
        };
        let expires = match str_field(token, "expires") {
            "" => "never".to_string(),
            ts => chrono::DateTime::parse_from_rfc3339(ts)
                .map(|t| t.with_timezone(&chrono::Utc).format("%d %b %y %H:%M UTC").to_string())
                .unwrap_or_else(|_| ts.to_string()),
        };
        table.add_row([str_field(token, "token").to_string(), roles, expires]);
    }
    table
}
