//! Bootstrap and dispatch tests
//!
//! Drives whole invocations through `App::run_from` with synthetic command
//! modules and an in-memory control plane.
//!
//! Test Categories:
//! 1. Version short-circuit
//! 2. Configuration precedence
//! 3. Identity and connection failures
//! 4. Dispatch order and command errors

mod common;

use serde_json::{json, Value};

use aeroctl::cli::{CliErrorCode, ErrorStage, Outcome};
use aeroctl::commands::default_modules;
use aeroctl::config::NetAddr;
use aeroctl::identity::{encode_public_key, generate_signing_key};
use common::{config_string, FakeDialer, Fixture, Offer, Offers, Recorder};

fn base_config(fixture: &Fixture) -> Value {
    json!({ "global": { "data_dir": fixture.data_dir() } })
}

fn connected(offers: &Offers) -> Vec<Offer> {
    offers
        .borrow()
        .iter()
        .filter(|o| matches!(o, Offer::Connected { .. }))
        .cloned()
        .collect()
}

// =============================================================================
// VERSION
// =============================================================================

/// Test: version works with a missing config file and no identity.
#[test]
fn test_version_short_circuits_everything() {
    let fixture = Fixture::new();
    let dialer = FakeDialer::new();
    let offers = Offers::default();
    let recorder = Recorder::new("a", &["status"], &offers);
    let resolved = recorder.resolved.clone();

    let outcome = fixture
        .app(vec![Box::new(recorder)], &dialer)
        .run_from([
            "aeroctl",
            "--debug",
            "--config",
            "/nonexistent/aeroctl.json",
            "--config-string",
            "!!not base64!!",
            "version",
        ])
        .unwrap();

    assert!(matches!(outcome, Outcome::Version(text) if text.starts_with("Test aeroctl v")));
    assert_eq!(dialer.dial_count(), 0);
    assert!(resolved.borrow().is_none(), "config must not be resolved");
    assert!(offers.borrow().is_empty());
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Test: a config string alone populates the configuration and the default
/// file is never read.
#[test]
fn test_config_string_only() {
    let fixture = Fixture::joined();
    // Unparseable on purpose: reading it would fail the run
    std::fs::write(fixture.default_config_path(), "{ not json").unwrap();

    let dialer = FakeDialer::new();
    let offers = Offers::default();
    let recorder = Recorder::new("a", &["status"], &offers);
    let resolved = recorder.resolved.clone();

    let config = json!({
        "global": {
            "nodename": "from-string",
            "data_dir": fixture.data_dir(),
            "auth_servers": ["10.0.0.5:4000"],
        },
        "auth_service": { "cluster_name": "east" }
    });
    let encoded = config_string(&config);

    fixture
        .app(vec![Box::new(recorder)], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "status"])
        .unwrap();

    let cfg = resolved.borrow().clone().unwrap();
    assert_eq!(cfg.hostname, "from-string");
    assert_eq!(cfg.data_dir, fixture.data_dir());
    assert_eq!(cfg.cluster_name.as_deref(), Some("east"));
    assert_eq!(cfg.host_uuid, common::HOST_UUID);
    assert_eq!(dialer.log.borrow().dials, vec![NetAddr::new("10.0.0.5", 4000)]);
}

/// Test: the config string overrides the file field by field.
#[test]
fn test_string_overrides_file_per_field() {
    let fixture = Fixture::joined();
    let file = fixture.write_config(
        "explicit.json",
        &json!({
            "global": {
                "nodename": "from-file",
                "data_dir": fixture.data_dir(),
                "auth_servers": ["10.0.0.1:3025"],
            },
            "auth_service": { "cluster_name": "file-cluster" }
        }),
    );
    let encoded = config_string(&json!({ "global": { "nodename": "from-string" } }));

    let dialer = FakeDialer::new();
    let offers = Offers::default();
    let recorder = Recorder::new("a", &["status"], &offers);
    let resolved = recorder.resolved.clone();

    fixture
        .app(vec![Box::new(recorder)], &dialer)
        .run_from([
            "aeroctl",
            "-c",
            file.to_str().unwrap(),
            "--config-string",
            encoded.as_str(),
            "status",
        ])
        .unwrap();

    let cfg = resolved.borrow().clone().unwrap();
    assert_eq!(cfg.hostname, "from-string");
    assert_eq!(cfg.cluster_name.as_deref(), Some("file-cluster"));
    assert_eq!(cfg.auth_servers, vec![NetAddr::new("10.0.0.1", 3025)]);
}

/// Test: an explicit config path that does not exist fails before any
/// connection attempt.
#[test]
fn test_missing_explicit_config_is_parse_error() {
    let fixture = Fixture::joined();
    let dialer = FakeDialer::new();
    let offers = Offers::default();
    let recorder = Recorder::new("a", &["status"], &offers);
    let resolved = recorder.resolved.clone();
    let missing = fixture.dir.path().join("nope.json");

    let err = fixture
        .app(vec![Box::new(recorder)], &dialer)
        .run_from(["aeroctl", "--config", missing.to_str().unwrap(), "status"])
        .unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::ConfigParse);
    assert_eq!(err.stage(), ErrorStage::Bootstrap);
    assert!(err.message().contains("nope.json"));
    assert_eq!(dialer.dial_count(), 0);
    assert!(resolved.borrow().is_none());
}

/// Test: a config string that is not base64 is a decode error.
#[test]
fn test_malformed_config_string_is_decode_error() {
    let fixture = Fixture::joined();
    let dialer = FakeDialer::new();
    let offers = Offers::default();

    let err = fixture
        .app(vec![Box::new(Recorder::new("a", &["status"], &offers))], &dialer)
        .run_from(["aeroctl", "--config-string", "%%%", "status"])
        .unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::ConfigDecode);
    assert_eq!(dialer.dial_count(), 0);
}

/// Test: a data directory without a host uuid is fatal.
#[test]
fn test_missing_host_uuid() {
    let fixture = Fixture::new();
    std::fs::remove_file(fixture.dir.path().join("host_uuid")).unwrap();
    let encoded = config_string(&base_config(&fixture));

    let dialer = FakeDialer::new();
    let offers = Offers::default();
    let err = fixture
        .app(vec![Box::new(Recorder::new("a", &["status"], &offers))], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "status"])
        .unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::HostUuid);
    assert_eq!(dialer.dial_count(), 0);
}

// =============================================================================
// IDENTITY AND CONNECTION
// =============================================================================

/// Test: a host that never joined fails without touching the network.
#[test]
fn test_missing_identity_never_dials() {
    let fixture = Fixture::new();
    let encoded = config_string(&base_config(&fixture));
    let dialer = FakeDialer::new();
    let offers = Offers::default();

    let err = fixture
        .app(vec![Box::new(Recorder::new("a", &["status"], &offers))], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "status"])
        .unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::IdentityNotFound);
    assert!(err.message().contains("not joined"));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(dialer.dial_count(), 0);
    assert!(connected(&offers).is_empty());
}

/// Test: an empty server list dials exactly the default address.
#[test]
fn test_empty_server_list_uses_default() {
    let fixture = Fixture::joined();
    let encoded = config_string(&base_config(&fixture));
    let dialer = FakeDialer::new();
    let offers = Offers::default();

    fixture
        .app(vec![Box::new(Recorder::new("a", &["status"], &offers))], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "status"])
        .unwrap();

    let default_addr = NetAddr::new("127.0.0.1", 3025);
    assert_eq!(dialer.log.borrow().dials, vec![default_addr.clone()]);
    assert_eq!(dialer.methods(), vec!["auth.hello", "ping"]);
    assert_eq!(
        connected(&offers),
        vec![Offer::Connected {
            module: "a".to_string(),
            command: "status".to_string(),
            addr: default_addr,
        }]
    );
}

/// Test: the hello request carries the host identity.
#[test]
fn test_hello_is_signed_by_host() {
    let fixture = Fixture::joined();
    let encoded = config_string(&base_config(&fixture));
    let dialer = FakeDialer::new();
    let offers = Offers::default();

    fixture
        .app(vec![Box::new(Recorder::new("a", &["status"], &offers))], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "status"])
        .unwrap();

    let log = dialer.log.borrow();
    let hello = &log.requests[0].params;
    assert_eq!(hello["host_uuid"], common::HOST_UUID);
    assert_eq!(hello["role"], "admin");
    assert!(hello["signature"].as_str().map_or(false, |s| !s.is_empty()));
}

/// Test: an unreachable server yields a diagnostic naming it and no
/// command output.
#[test]
fn test_unreachable_server_is_fatal() {
    let fixture = Fixture::joined();
    let bad = NetAddr::new("10.9.9.9", 3025);
    let mut config = base_config(&fixture);
    config["global"]["auth_servers"] = json!(["10.9.9.9:3025", "127.0.0.1:3025"]);
    let encoded = config_string(&config);

    let dialer = FakeDialer::refusing(bad.clone());
    let offers = Offers::default();

    let err = fixture
        .app(vec![Box::new(Recorder::new("a", &["status"], &offers))], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "status"])
        .unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::ConnectionUnreachable);
    assert!(err.message().contains("10.9.9.9:3025"));
    assert!(err.report().starts_with("error: "));
    // Only the first address is tried
    assert_eq!(dialer.log.borrow().dials, vec![bad]);
    assert!(connected(&offers).is_empty());
}

/// Test: a failed liveness probe is reported like an unreachable server.
#[test]
fn test_failed_probe_is_unreachable() {
    let fixture = Fixture::joined();
    let encoded = config_string(&base_config(&fixture));
    let dialer = FakeDialer::new();
    dialer.fail_ping.set(true);
    let offers = Offers::default();

    let err = fixture
        .app(vec![Box::new(Recorder::new("a", &["status"], &offers))], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "status"])
        .unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::ConnectionUnreachable);
    assert!(err.message().contains("127.0.0.1:3025"));
    assert!(err.message().contains("shutting down"));
    assert!(connected(&offers).is_empty());
}

/// Test: a server that answers but refuses the host key is reported as
/// access denied, not as unreachable, and no ping follows.
#[test]
fn test_rejected_handshake_is_access_denied() {
    let fixture = Fixture::joined();
    let encoded = config_string(&base_config(&fixture));
    let dialer = FakeDialer::new();
    dialer.reject_hello.set(true);
    let offers = Offers::default();

    let err = fixture
        .app(vec![Box::new(Recorder::new("a", &["status"], &offers))], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "status"])
        .unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::AccessDenied);
    assert_eq!(err.stage(), ErrorStage::Bootstrap);
    assert!(err.message().contains("127.0.0.1:3025"));
    assert!(err.message().contains("unknown host key"));
    assert!(!err.message().contains("Is the auth server running"));
    assert_eq!(dialer.methods(), vec!["auth.hello"]);
    assert!(connected(&offers).is_empty());
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Test: modules are offered the command in registration order and the
/// first claim stops the search.
#[test]
fn test_dispatch_first_claim_wins() {
    let fixture = Fixture::joined();
    let encoded = config_string(&base_config(&fixture));
    let dialer = FakeDialer::new();
    let offers = Offers::default();

    let modules: Vec<Box<dyn aeroctl::cli::CommandModule>> = vec![
        Box::new(Recorder::new("a", &["alpha"], &offers)),
        Box::new(Recorder::new("b", &["beta"], &offers)),
        Box::new(Recorder::new("c", &["gamma"], &offers)),
    ];

    let outcome = fixture
        .app(modules, &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "beta"])
        .unwrap();

    assert_eq!(outcome, Outcome::Executed("beta".to_string()));
    let seen: Vec<String> = connected(&offers)
        .into_iter()
        .map(|o| match o {
            Offer::Connected { module, .. } => module,
            Offer::Offline { module, .. } => module,
        })
        .collect();
    assert_eq!(seen, vec!["a", "b"]);
    assert_eq!(dialer.dial_count(), 1);
}

/// Test: a failing module is reported as a command error.
#[test]
fn test_command_error_is_distinguished() {
    let fixture = Fixture::joined();
    let encoded = config_string(&base_config(&fixture));
    let dialer = FakeDialer::new();
    let offers = Offers::default();
    let mut failing = Recorder::new("a", &["status"], &offers);
    failing.fail_with = Some("backend refused".to_string());

    let err = fixture
        .app(vec![Box::new(failing)], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "status"])
        .unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::CommandExecution);
    assert_eq!(err.stage(), ErrorStage::Command);
    assert_eq!(err.command(), Some("status"));
    assert!(err
        .report()
        .starts_with("error: command 'status' failed: "));
}

/// Test: offline commands run without identity or connection.
#[test]
fn test_offline_command_skips_connection() {
    let fixture = Fixture::new();
    let encoded = config_string(&base_config(&fixture));
    let dialer = FakeDialer::new();
    let offers = Offers::default();
    let mut module = Recorder::new("a", &["keygen"], &offers);
    module.offline = vec!["keygen"];

    let outcome = fixture
        .app(vec![Box::new(module)], &dialer)
        .run_from(["aeroctl", "--config-string", encoded.as_str(), "keygen"])
        .unwrap();

    assert_eq!(outcome, Outcome::Executed("keygen".to_string()));
    assert_eq!(dialer.dial_count(), 0);
    assert_eq!(
        *offers.borrow(),
        vec![Offer::Offline {
            module: "a".to_string(),
            command: "keygen".to_string(),
        }]
    );
}

/// Test: an unknown command is a usage error with clap's exit status.
#[test]
fn test_unknown_command() {
    let fixture = Fixture::joined();
    let dialer = FakeDialer::new();
    let offers = Offers::default();

    let err = fixture
        .app(vec![Box::new(Recorder::new("a", &["status"], &offers))], &dialer)
        .run_from(["aeroctl", "nope"])
        .unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::Usage);
    assert_eq!(err.exit_code(), 2);
    assert_eq!(dialer.dial_count(), 0);
}

// =============================================================================
// BUILT-IN COMMANDS
// =============================================================================

/// Test: every built-in command reaches its own module through the default
/// module list, with the resource commands registered first.
#[test]
fn test_default_modules_dispatch_to_owner() {
    let fixture = Fixture::joined();
    let encoded = config_string(&base_config(&fixture));
    let key = encode_public_key(&generate_signing_key().verifying_key());

    let cases: Vec<(&str, Vec<&str>, Value, &str)> = vec![
        ("tokens ls", vec!["tokens", "ls"], json!([]), "tokens.list"),
        ("tokens del", vec!["tokens", "del", "abc"], Value::Null, "tokens.delete"),
        (
            "auth export",
            vec!["auth", "export", "--type", "user"],
            json!([{"type": "user", "public_key": key}]),
            "authorities.list",
        ),
        (
            "get",
            vec!["get", "role/admin"],
            json!({"kind": "role", "metadata": {"name": "admin"}}),
            "resources.get",
        ),
    ];

    for (name, command, reply, method) in cases {
        let dialer = FakeDialer::new();
        *dialer.reply.borrow_mut() = reply;
        let mut args = vec!["aeroctl", "--config-string", encoded.as_str()];
        args.extend(&command);

        let outcome = fixture.app(default_modules(), &dialer).run_from(args).unwrap();

        assert_eq!(outcome, Outcome::Executed(name.to_string()));
        assert_eq!(dialer.methods(), vec!["auth.hello", "ping", method]);
    }
}
