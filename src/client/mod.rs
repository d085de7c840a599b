//! Control-plane client
//!
//! The client speaks in single JSON objects: one request, one response.
//!
//! - Request: `{"method": "...", "params": {...}}`
//! - Success: `{"status": "ok", "data": ...}`
//! - Failure: `{"status": "error", "code": "...", "message": "..."}`
//!
//! How the objects travel is behind the `Dialer` / `Transport` seam;
//! `tcp` provides the JSON-lines over TCP transport used by the binary.

pub mod bootstrap;
pub mod tcp;

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::NetAddr;
use crate::identity::{encode_public_key, HostIdentity};

pub use bootstrap::{connect_to_auth_service, DEFAULT_DIAL_TIMEOUT};
pub use tcp::{TcpDialer, TcpTransport};

/// Method used to authenticate a fresh connection
pub const METHOD_HELLO: &str = "auth.hello";

/// Method used as the liveness probe
pub const METHOD_PING: &str = "ping";

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not open a connection
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: NetAddr,
        #[source]
        source: std::io::Error,
    },

    /// Connection broke mid request
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer sent something that is not a valid response
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Control plane refused the handshake
    #[error("authentication rejected: {0}")]
    Handshake(String),

    /// Control plane answered with an error
    #[error("{code}: {message}")]
    Remote { code: String, message: String },
}

/// A request to the control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// A response from the control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Ok {
        #[serde(default)]
        data: Value,
    },
    Error {
        code: String,
        message: String,
    },
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Response::Ok { data }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    fn into_result(self) -> Result<Value, ClientError> {
        match self {
            Response::Ok { data } => Ok(data),
            Response::Error { code, message } => Err(ClientError::Remote { code, message }),
        }
    }
}

/// One established channel to the control plane
pub trait Transport {
    /// Send `request` and wait for its response
    fn round_trip(&self, request: &Request) -> Result<Response, ClientError>;
}

/// Opens transports to control-plane servers
pub trait Dialer {
    fn dial(&self, addr: &NetAddr, timeout: Duration) -> Result<Box<dyn Transport>, ClientError>;
}

/// Bytes signed by the host key during the handshake
pub fn hello_payload(host_uuid: &str, timestamp: i64) -> Vec<u8> {
    format!("aeroctl-hello:{}:{}", host_uuid, timestamp).into_bytes()
}

/// An authenticated connection to the control plane
pub struct Client {
    transport: Box<dyn Transport>,
    addr: NetAddr,
    host_uuid: String,
}

impl Client {
    /// Dial `addr` and authenticate with `identity`.
    ///
    /// The identity, and with it the signing key, is dropped before
    /// this returns.
    pub fn connect(
        component: &str,
        addr: &NetAddr,
        host_uuid: &str,
        identity: HostIdentity,
        dialer: &dyn Dialer,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let transport = dialer.dial(addr, timeout)?;

        let timestamp = Utc::now().timestamp();
        let signature = identity.sign(&hello_payload(host_uuid, timestamp));
        let hello = Request::new(
            METHOD_HELLO,
            json!({
                "component": component,
                "host_uuid": host_uuid,
                "role": identity.id().role,
                "public_key": encode_public_key(&identity.public_key()),
                "timestamp": timestamp,
                "signature": STANDARD.encode(signature.to_bytes()),
            }),
        );
        drop(identity);

        match transport.round_trip(&hello)? {
            Response::Ok { .. } => {}
            Response::Error { code, message } => {
                return Err(ClientError::Handshake(format!("{}: {}", code, message)))
            }
        }

        Ok(Self {
            transport,
            addr: addr.clone(),
            host_uuid: host_uuid.to_string(),
        })
    }

    /// Wrap an already authenticated transport
    pub fn from_transport(
        transport: Box<dyn Transport>,
        addr: NetAddr,
        host_uuid: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            addr,
            host_uuid: host_uuid.into(),
        }
    }

    /// Liveness probe: one inexpensive round trip
    pub fn ping(&self) -> Result<(), ClientError> {
        self.call(METHOD_PING, json!({})).map(|_| ())
    }

    /// Issue a request and return the response data
    pub fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        self.transport
            .round_trip(&Request::new(method, params))?
            .into_result()
    }

    /// Server this client is connected to
    pub fn addr(&self) -> &NetAddr {
        &self.addr
    }

    pub fn host_uuid(&self) -> &str {
        &self.host_uuid
    }
}
