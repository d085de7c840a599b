//! Generic resource commands
//!
//! - `get <kind[/name]>`: show one resource or every resource of a kind
//! - `create -f <file>`: create or update resources from a JSON file
//! - `del <kind/name>`: delete one resource

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Arg, ArgAction, Command};
use serde_json::{json, Value};

use super::{as_list, str_field};
use crate::cli::{
    write_json, write_text, CliError, CliResult, CommandModule, SelectedCommand, Table,
};
use crate::client::Client;
use crate::config::{RuntimeConfig, DEFAULT_NAMESPACE};

const GET: &str = "get";
const CREATE: &str = "create";
const DELETE: &str = "del";

const METHOD_GET: &str = "resources.get";
const METHOD_UPSERT: &str = "resources.upsert";
const METHOD_DELETE: &str = "resources.delete";

/// `kind` or `kind/name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: String,
    pub name: Option<String>,
}

impl ResourceRef {
    /// The name, required for commands that act on a single resource
    pub fn require_name(&self) -> CliResult<&str> {
        self.name.as_deref().ok_or_else(|| {
            CliError::command_failed(format!(
                "a resource name is required, e.g. {}/<name>",
                self.kind
            ))
        })
    }
}

impl FromStr for ResourceRef {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, name) = match s.split_once('/') {
            Some((kind, name)) => (kind, Some(name)),
            None => (s, None),
        };
        if kind.is_empty() || name.map_or(false, |n| n.is_empty() || n.contains('/')) {
            return Err(CliError::command_failed(format!(
                "invalid resource reference '{}', expected kind or kind/name",
                s
            )));
        }
        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            name: name.map(str::to_string),
        })
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}/{}", self.kind, name),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResourceCommand {
    /// Namespace used when `--namespace` is not given
    namespace: String,
}

impl CommandModule for ResourceCommand {
    fn initialize(&mut self, app: Command, cfg: &mut RuntimeConfig) -> Command {
        if cfg.namespace.is_empty() {
            cfg.namespace = DEFAULT_NAMESPACE.to_string();
        }
        self.namespace = cfg.namespace.clone();

        let namespace = Arg::new("namespace")
            .long("namespace")
            .short('n')
            .help(format!("Namespace of the resources [{}]", self.namespace));

        app.subcommand(
            Command::new(GET)
                .about("Print one resource or all resources of a kind")
                .hide(true)
                .arg(Arg::new("ref").required(true).help("kind or kind/name"))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_parser(["text", "json"])
                        .default_value("text")
                        .help("Output format"),
                )
                .arg(namespace.clone())
                .arg(
                    Arg::new("with-secrets")
                        .long("with-secrets")
                        .action(ArgAction::SetTrue)
                        .help("Include secret fields"),
                ),
        )
        .subcommand(
            Command::new(CREATE)
                .about("Create or update resources from a JSON file")
                .hide(true)
                .arg(
                    Arg::new("file")
                        .long("file")
                        .short('f')
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Resource definition file"),
                )
                .arg(namespace.clone()),
        )
        .subcommand(
            Command::new(DELETE)
                .about("Delete a resource")
                .hide(true)
                .arg(Arg::new("ref").required(true).help("kind/name"))
                .arg(namespace),
        )
    }

    fn try_run(&mut self, selected: &SelectedCommand, client: &Client) -> CliResult<bool> {
        if ![GET, CREATE, DELETE].contains(&selected.name()) {
            return Ok(false);
        }

        let matches = selected.matches();
        let namespace = matches
            .get_one::<String>("namespace")
            .cloned()
            .unwrap_or_else(|| self.namespace.clone());
        let namespace = namespace.as_str();

        match selected.name() {
            GET => {
                let target = resource_ref(selected)?;
                let json_output =
                    matches.get_one::<String>("format").map(String::as_str) == Some("json");
                let with_secrets = matches.get_flag("with-secrets");
                self.get(client, &target, namespace, json_output, with_secrets)?
            }
            CREATE => {
                let path = matches
                    .get_one::<PathBuf>("file")
                    .ok_or_else(|| CliError::usage("missing --file"))?;
                self.create(client, path, namespace)?
            }
            _ => {
                let target = resource_ref(selected)?;
                self.delete(client, &target, namespace)?
            }
        }
        Ok(true)
    }
}

impl ResourceCommand {
    fn get(
        &self,
        client: &Client,
        target: &ResourceRef,
        namespace: &str,
        json_output: bool,
        with_secrets: bool,
    ) -> CliResult<()> {
        let data = client.call(
            METHOD_GET,
            json!({
                "kind": target.kind,
                "name": target.name,
                "namespace": namespace,
                "with_secrets": with_secrets,
            }),
        )?;
        let resources = if data.is_object() {
            vec![data]
        } else {
            as_list(&data, "resources")?
        };

        if json_output {
            return write_json(&resources);
        }
        write_text(&render_resources(&resources).render())
    }

    fn create(&self, client: &Client, path: &Path, namespace: &str) -> CliResult<()> {
        let text = fs::read_to_string(path).map_err(|e| {
            CliError::command_failed(format!("cannot read {}: {}", path.display(), e))
        })?;
        let resources = read_resources(&text)
            .map_err(|e| CliError::command_failed(format!("{}: {}", path.display(), e)))?;

        for resource in resources {
            client.call(
                METHOD_UPSERT,
                json!({ "namespace": namespace, "resource": resource }),
            )?;
            write_text(&format!(
                "{} \"{}\" has been created",
                str_field(&resource, "kind"),
                resource_name(&resource)
            ))?;
        }
        Ok(())
    }

    fn delete(&self, client: &Client, target: &ResourceRef, namespace: &str) -> CliResult<()> {
        let name = target.require_name()?;
        client.call(
            METHOD_DELETE,
            json!({ "kind": target.kind, "name": name, "namespace": namespace }),
        )?;
        write_text(&format!("{} \"{}\" has been deleted", target.kind, name))
    }
}

fn resource_ref(selected: &SelectedCommand) -> CliResult<ResourceRef> {
    selected
        .matches()
        .get_one::<String>("ref")
        .ok_or_else(|| CliError::usage("missing resource reference"))?
        .parse()
}

fn resource_name(resource: &Value) -> &str {
    resource
        .get("metadata")
        .map(|m| str_field(m, "name"))
        .unwrap_or("")
}

/// Resources in a definition file: one object or a list of objects,
/// each with a `kind` and a `metadata.name`
pub fn read_resources(text: &str) -> Result<Vec<Value>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
    let resources = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => return Err("expected a resource object or a list of them".to_string()),
    };

    for (i, resource) in resources.iter().enumerate() {
        if str_field(resource, "kind").is_empty() {
            return Err(format!("resource {} has no kind", i));
        }
        if resource_name(resource).is_empty() {
            return Err(format!("resource {} has no metadata.name", i));
        }
    }
    Ok(resources)
}

/// Kind / Name / Namespace table
pub fn render_resources(resources: &[Value]) -> Table {
    let mut table = Table::new(["Kind", "Name", "Namespace"]);
    for resource in resources {
        let namespace = resource
            .get("metadata")
            .map(|m| str_field(m, "namespace"))
            .unwrap_or("");
        table.add_row([str_field(resource, "kind"), resource_name(resource), namespace]);
    }
    table
}
