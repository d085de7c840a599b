//! Connection bootstrap
//!
//! Builds the one connection every dispatched command shares:
//! 1. Mark the configuration auth-enabled and fall back to the default
//!    control-plane address if none is configured
//! 2. Load the admin identity of this host
//! 3. Dial the first server and authenticate with the host key
//! 4. Probe liveness with one round trip
//!
//! A failed dial or probe is reported as unreachable and a refused
//! handshake as access denied, both against the dialed address; commands
//! may assume the returned client is live.

use std::time::Duration;

use super::{Client, ClientError, Dialer};
use crate::cli::{CliError, CliErrorCode, CliResult};
use crate::config::{NetAddr, RuntimeConfig};
use crate::identity::{read_identity, IdentityId, Role};
use crate::observability::{log_event_with_fields, trace_event, Event};

/// Time allowed for dialing and for each round trip
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Name the client introduces itself with
const COMPONENT: &str = "aeroctl";

/// Connect to the control plane described by `cfg`
pub fn connect_to_auth_service(cfg: &mut RuntimeConfig, dialer: &dyn Dialer) -> CliResult<Client> {
    cfg.auth_enabled = true;
    let addr = match cfg.primary_auth_server() {
        Some(addr) => addr.clone(),
        None => {
            let addr = NetAddr::default_auth_connect();
            cfg.auth_servers = vec![addr.clone()];
            addr
        }
    };
    if cfg.host_uuid.is_empty() {
        return Err(CliError::new(
            CliErrorCode::ProgrammingInvariant,
            "connection bootstrap started without a resolved host uuid",
        ));
    }

    let identity = read_identity(&cfg.data_dir, &IdentityId::new(Role::Admin, &cfg.host_uuid))?;
    trace_event(
        Event::IdentityLoaded,
        &[
            ("fingerprint", identity.fingerprint().as_str()),
            ("role", identity.id().role.as_str()),
        ],
    );

    let addr_str = addr.to_string();
    trace_event(Event::ConnectStart, &[("addr", addr_str.as_str())]);

    let connected = Client::connect(
        COMPONENT,
        &addr,
        &cfg.host_uuid,
        identity,
        dialer,
        DEFAULT_DIAL_TIMEOUT,
    )
    .and_then(|client| client.ping().map(|_| client));

    match connected {
        Ok(client) => {
            log_event_with_fields(Event::ConnectComplete, &[("addr", addr_str.as_str())]);
            Ok(client)
        }
        Err(e) => {
            let reason = e.to_string();
            trace_event(
                Event::ConnectFailed,
                &[("addr", addr_str.as_str()), ("reason", reason.as_str())],
            );
            Err(match e {
                ClientError::Handshake(_) => CliError::access_denied(&addr, reason),
                _ => CliError::unreachable(&addr, reason),
            })
        }
    }
}
