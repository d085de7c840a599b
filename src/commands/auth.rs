//! Certificate authority commands
//!
//! - `auth export`: print the public (or, with `--keys`, private) keys of
//!   the cluster's certificate authorities
//! - `auth gen`: generate a key pair locally, no connection needed
//! - `auth sign`: have the user authority sign a fresh key pair

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{json, Value};

use super::{as_list, parse_duration, str_field};
use crate::cli::{write_text, CliError, CliResult, CommandModule, SelectedCommand};
use crate::client::Client;
use crate::config::RuntimeConfig;
use crate::identity::{
    decode_public_key, encode_public_key, encode_signing_key, fingerprint, generate_signing_key,
    write_private,
};

const EXPORT: &str = "auth export";
const GENERATE: &str = "auth gen";
const SIGN: &str = "auth sign";

const METHOD_LIST: &str = "authorities.list";
const METHOD_SIGN_USER: &str = "authorities.sign_user";

const DEFAULT_TTL: &str = "12h";

/// Which authority to export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityType {
    User,
    Host,
}

impl AuthorityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityType::User => "user",
            AuthorityType::Host => "host",
        }
    }

    fn parse(s: &str) -> CliResult<Self> {
        match s {
            "user" => Ok(AuthorityType::User),
            "host" => Ok(AuthorityType::Host),
            other => Err(CliError::command_failed(format!(
                "unknown authority type '{}', expected user or host",
                other
            ))),
        }
    }
}

/// Layout of the files written by `auth sign`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `<out>` (key) and `<out>-cert.pub`
    File,
    /// `<out>/key` and `<out>/cert.pub`
    Dir,
}

impl OutputFormat {
    fn parse(s: &str) -> CliResult<Self> {
        match s {
            "file" => Ok(OutputFormat::File),
            "dir" => Ok(OutputFormat::Dir),
            other => Err(CliError::command_failed(format!(
                "unknown output format '{}', expected file or dir",
                other
            ))),
        }
    }

    /// Paths of the key and the certificate for `out`
    pub fn paths(&self, out: &Path) -> (PathBuf, PathBuf) {
        match self {
            OutputFormat::File => {
                let mut cert = out.as_os_str().to_owned();
                cert.push("-cert.pub");
                (out.to_path_buf(), PathBuf::from(cert))
            }
            OutputFormat::Dir => (out.join("key"), out.join("cert.pub")),
        }
    }
}

#[derive(Debug, Default)]
pub struct AuthCommand;

impl CommandModule for AuthCommand {
    fn initialize(&mut self, app: Command, _cfg: &mut RuntimeConfig) -> Command {
        app.subcommand(
            Command::new("auth")
                .about("Operations with the certificate authorities")
                .hide(true)
                .subcommand_required(true)
                .subcommand(
                    Command::new("export")
                        .about("Export public keys of the certificate authorities")
                        .arg(
                            Arg::new("keys")
                                .long("keys")
                                .action(ArgAction::SetTrue)
                                .help("Export private keys instead of public keys"),
                        )
                        .arg(
                            Arg::new("fingerprint")
                                .long("fingerprint")
                                .value_name("FP")
                                .help("Only export the key with this fingerprint"),
                        )
                        .arg(
                            Arg::new("type")
                                .long("type")
                                .value_parser(["user", "host"])
                                .help("Authority type to export [all]"),
                        ),
                )
                .subcommand(
                    Command::new("gen")
                        .about("Generate a new key pair")
                        .arg(
                            Arg::new("pub-key")
                                .long("pub-key")
                                .required(true)
                                .value_parser(clap::value_parser!(PathBuf))
                                .help("Path for the public key"),
                        )
                        .arg(
                            Arg::new("priv-key")
                                .long("priv-key")
                                .required(true)
                                .value_parser(clap::value_parser!(PathBuf))
                                .help("Path for the private key"),
                        ),
                )
                .subcommand(
                    Command::new("sign")
                        .about("Create a user identity signed by the user authority")
                        .arg(
                            Arg::new("user")
                                .long("user")
                                .required(true)
                                .help("User to issue the identity for"),
                        )
                        .arg(
                            Arg::new("out")
                                .long("out")
                                .short('o')
                                .required(true)
                                .value_parser(clap::value_parser!(PathBuf))
                                .help("Where to write the identity"),
                        )
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .value_parser(["file", "dir"])
                                .default_value("file")
                                .help("Identity output layout"),
                        )
                        .arg(
                            Arg::new("ttl")
                                .long("ttl")
                                .default_value(DEFAULT_TTL)
                                .help("Certificate lifetime, e.g. 12h, 30m"),
                        ),
                ),
        )
    }

    fn try_run_offline(
        &mut self,
        selected: &SelectedCommand,
        _cfg: &RuntimeConfig,
    ) -> CliResult<bool> {
        if !selected.is(GENERATE) {
            return Ok(false);
        }
        let matches = selected.matches();
        generate_key_pair(
            required_path(matches, "pub-key")?,
            required_path(matches, "priv-key")?,
        )?;
        Ok(true)
    }

    fn try_run(&mut self, selected: &SelectedCommand, client: &Client) -> CliResult<bool> {
        let matches = selected.matches();
        match selected.name() {
            EXPORT => {
                let authority = matches
                    .get_one::<String>("type")
                    .map(|t| AuthorityType::parse(t))
                    .transpose()?;
                let filter = matches.get_one::<String>("fingerprint").map(String::as_str);
                let with_keys = matches.get_flag("keys");
                self.export(client, authority, filter, with_keys)?
            }
            SIGN => {
                let user = matches
                    .get_one::<String>("user")
                    .ok_or_else(|| CliError::usage("missing --user"))?;
                let out = required_path(matches, "out")?;
                let format = OutputFormat::parse(string_arg(matches, "format", "file"))?;
                let ttl = parse_duration(string_arg(matches, "ttl", DEFAULT_TTL))?;
                self.sign(client, user, out, format, ttl)?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl AuthCommand {
    fn export(
        &self,
        client: &Client,
        authority: Option<AuthorityType>,
        filter: Option<&str>,
        with_keys: bool,
    ) -> CliResult<()> {
        let data = client.call(
            METHOD_LIST,
            json!({
                "type": authority.map(|a| a.as_str()),
                "with_secrets": with_keys,
            }),
        )?;
        let authorities = as_list(&data, "authorities")?;

        let mut lines = Vec::new();
        for ca in &authorities {
            if let Some(line) = export_line(ca, filter, with_keys)? {
                lines.push(line);
            }
        }
        if lines.is_empty() {
            return Ok(());
        }
        write_text(&lines.join("\n"))
    }

    fn sign(
        &self,
        client: &Client,
        user: &str,
        out: &Path,
        format: OutputFormat,
        ttl_secs: u64,
    ) -> CliResult<()> {
        let key = generate_signing_key();
        let data = client.call(
            METHOD_SIGN_USER,
            json!({
                "user": user,
                "public_key": encode_public_key(&key.verifying_key()),
                "ttl_secs": ttl_secs,
            }),
        )?;
        let cert = data
            .get("cert")
            .and_then(Value::as_str)
            .ok_or_else(|| CliError::command_failed("sign response carries no certificate"))?;

        if format == OutputFormat::Dir {
            fs::create_dir_all(out)?;
        }
        let (key_path, cert_path) = format.paths(out);
        write_private(&key_path, &encode_signing_key(&key))?;
        fs::write(&cert_path, cert)?;

        write_text(&format!(
            "The certificate has been written to {}",
            cert_path.display()
        ))
    }
}

/// One exported line for authority `ca`, or `None` if filtered out
pub fn export_line(
    ca: &Value,
    filter: Option<&str>,
    with_keys: bool,
) -> CliResult<Option<String>> {
    let public_key = str_field(ca, "public_key");
    let key = decode_public_key(public_key)
        .map_err(|e| CliError::command_failed(format!("authority key: {}", e)))?;
    let fp = fingerprint(key.as_bytes());
    if filter.map_or(false, |f| f != fp) {
        return Ok(None);
    }

    if with_keys {
        let private_key = ca
            .get("private_key")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CliError::command_failed(format!("no private key for authority {}", fp))
            })?;
        return Ok(Some(private_key.to_string()));
    }

    let line = match AuthorityType::parse(str_field(ca, "type"))? {
        AuthorityType::User => format!("cert-authority {} type=user", public_key),
        AuthorityType::Host => format!(
            "@cert-authority *.{} {} type=host",
            str_field(ca, "cluster_name"),
            public_key
        ),
    };
    Ok(Some(line))
}

/// Write a fresh key pair to `pub_path` and `priv_path`
pub fn generate_key_pair(pub_path: &Path, priv_path: &Path) -> CliResult<()> {
    let key = generate_signing_key();
    write_private(priv_path, &encode_signing_key(&key))?;
    fs::write(pub_path, encode_public_key(&key.verifying_key()))?;

    write_text(&format!(
        "Wrote public key to {} and private key to {}",
        pub_path.display(),
        priv_path.display()
    ))
}

fn required_path<'a>(matches: &'a ArgMatches, id: &str) -> CliResult<&'a Path> {
    matches
        .get_one::<PathBuf>(id)
        .map(PathBuf::as_path)
        .ok_or_else(|| CliError::usage(format!("missing --{}", id)))
}

fn string_arg<'a>(matches: &'a ArgMatches, id: &str, default: &'a str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or(default)
}
