//! Shared fixtures for aeroctl integration tests
//!
//! - `Fixture`: a temporary data directory, optionally joined to a cluster
//! - `FakeDialer`: an in-memory control plane counting dials
//! - `Recorder`: a synthetic command module recording every offer

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Command;
use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;

use aeroctl::cli::{App, CliResult, CommandModule, SelectedCommand};
use aeroctl::client::{Client, ClientError, Dialer, Request, Response, Transport};
use aeroctl::config::{write_host_uuid, ConfigResolver, NetAddr, RuntimeConfig};
use aeroctl::identity::{generate_signing_key, write_identity, IdentityId, Role};

pub const HOST_UUID: &str = "5b8d6ea4-3c9d-4e4b-9a55-1f0c2f0e7a11";

/// Temporary data directory
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Data directory with a host uuid but no identity
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let uuid = Uuid::parse_str(HOST_UUID).unwrap();
        write_host_uuid(dir.path(), &uuid).unwrap();
        Self { dir }
    }

    /// Data directory of a host that joined the cluster as admin
    pub fn joined() -> Self {
        let fixture = Self::new();
        write_identity(
            fixture.dir.path(),
            &IdentityId::new(Role::Admin, HOST_UUID),
            generate_signing_key(),
        )
        .unwrap();
        fixture
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Default config path of the app under test; not created
    pub fn default_config_path(&self) -> PathBuf {
        self.dir.path().join("aeroctl.json")
    }

    /// Write `config` as a JSON file and return its path
    pub fn write_config(&self, name: &str, config: &Value) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
        path
    }

    /// App with `modules`, `dialer` and a default config path inside the
    /// fixture
    pub fn app(&self, modules: Vec<Box<dyn CommandModule>>, dialer: &FakeDialer) -> App {
        App::new("Test", modules)
            .with_dialer(Box::new(dialer.clone()))
            .with_resolver(ConfigResolver::new(self.default_config_path()))
    }
}

/// Base64 configuration string for `config`
pub fn config_string(config: &Value) -> String {
    STANDARD.encode(serde_json::to_vec(config).unwrap())
}

/// What the in-memory control plane saw
#[derive(Debug, Default)]
pub struct ControlPlaneLog {
    pub dials: Vec<NetAddr>,
    pub requests: Vec<Request>,
}

/// In-memory control plane.
///
/// Answers `auth.hello` and `ping` with success unless told to fail
/// them, and every other method with `reply`. Addresses in `unreachable` refuse the dial.
#[derive(Clone, Default)]
pub struct FakeDialer {
    pub log: Rc<RefCell<ControlPlaneLog>>,
    pub unreachable: Rc<RefCell<Vec<NetAddr>>>,
    pub fail_ping: Rc<Cell<bool>>,
    pub reject_hello: Rc<Cell<bool>>,
    pub reply: Rc<RefCell<Value>>,
}

impl FakeDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(addr: NetAddr) -> Self {
        let dialer = Self::default();
        dialer.unreachable.borrow_mut().push(addr);
        dialer
    }

    pub fn dial_count(&self) -> usize {
        self.log.borrow().dials.len()
    }

    pub fn methods(&self) -> Vec<String> {
        self.log
            .borrow()
            .requests
            .iter()
            .map(|r| r.method.clone())
            .collect()
    }
}

impl Dialer for FakeDialer {
    fn dial(&self, addr: &NetAddr, _timeout: Duration) -> Result<Box<dyn Transport>, ClientError> {
        self.log.borrow_mut().dials.push(addr.clone());
        if self.unreachable.borrow().contains(addr) {
            return Err(ClientError::Dial {
                addr: addr.clone(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        Ok(Box::new(FakeTransport {
            dialer: self.clone(),
        }))
    }
}

struct FakeTransport {
    dialer: FakeDialer,
}

impl Transport for FakeTransport {
    fn round_trip(&self, request: &Request) -> Result<Response, ClientError> {
        self.dialer.log.borrow_mut().requests.push(request.clone());
        Ok(match request.method.as_str() {
            "auth.hello" if self.dialer.reject_hello.get() => {
                Response::error("ACCESS_DENIED", "unknown host key")
            }
            "auth.hello" => Response::ok(json!({})),
            "ping" if self.dialer.fail_ping.get() => {
                Response::error("UNAVAILABLE", "auth server is shutting down")
            }
            "ping" => Response::ok(json!("pong")),
            _ => Response::ok(self.dialer.reply.borrow().clone()),
        })
    }
}

/// One recorded offer made to a `Recorder`
#[derive(Debug, Clone, PartialEq)]
pub enum Offer {
    Offline { module: String, command: String },
    Connected { module: String, command: String, addr: NetAddr },
}

pub type Offers = Rc<RefCell<Vec<Offer>>>;

/// Synthetic command module.
///
/// Registers `commands` as top-level sub-commands, claims them when
/// offered, and snapshots the resolved configuration on every offline
/// offer.
pub struct Recorder {
    pub name: String,
    pub commands: Vec<&'static str>,
    pub offline: Vec<&'static str>,
    pub offers: Offers,
    pub resolved: Rc<RefCell<Option<RuntimeConfig>>>,
    pub fail_with: Option<String>,
}

impl Recorder {
    pub fn new(name: &str, commands: &[&'static str], offers: &Offers) -> Self {
        Self {
            name: name.to_string(),
            commands: commands.to_vec(),
            offline: Vec::new(),
            offers: Rc::clone(offers),
            resolved: Rc::default(),
            fail_with: None,
        }
    }

    fn claims(&self, selected: &SelectedCommand) -> bool {
        self.commands.iter().any(|c| selected.is(c))
    }

    fn result(&self) -> CliResult<bool> {
        match &self.fail_with {
            Some(msg) => Err(aeroctl::cli::CliError::command_failed(msg.clone())),
            None => Ok(true),
        }
    }
}

impl CommandModule for Recorder {
    fn initialize(&mut self, app: Command, _cfg: &mut RuntimeConfig) -> Command {
        self.commands
            .iter()
            .fold(app, |app, name| app.subcommand(Command::new(*name)))
    }

    fn try_run(&mut self, selected: &SelectedCommand, client: &Client) -> CliResult<bool> {
        self.offers.borrow_mut().push(Offer::Connected {
            module: self.name.clone(),
            command: selected.name().to_string(),
            addr: client.addr().clone(),
        });
        if !self.claims(selected) {
            return Ok(false);
        }
        self.result()
    }

    fn try_run_offline(
        &mut self,
        selected: &SelectedCommand,
        cfg: &RuntimeConfig,
    ) -> CliResult<bool> {
        *self.resolved.borrow_mut() = Some(cfg.clone());
        if !self.offline.iter().any(|c| selected.is(c)) {
            return Ok(false);
        }
        self.offers.borrow_mut().push(Offer::Offline {
            module: self.name.clone(),
            command: selected.name().to_string(),
        });
        self.result()
    }
}
