//! JSON-lines transport over TCP
//!
//! - One JSON object per line, UTF-8
//! - One response line per request line
//! - Blocking, with read/write timeouts

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{ClientError, Dialer, Request, Response, Transport};
use crate::config::NetAddr;

/// Default dialer of the binary
#[derive(Debug, Clone, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial(&self, addr: &NetAddr, timeout: Duration) -> Result<Box<dyn Transport>, ClientError> {
        let stream = TcpTransport::connect(addr, timeout)?;
        Ok(Box::new(stream))
    }
}

/// A connected TCP stream speaking JSON lines
pub struct TcpTransport {
    writer: TcpStream,
    reader: RefCell<BufReader<TcpStream>>,
}

impl TcpTransport {
    /// Connect to the first reachable resolution of `addr`
    pub fn connect(addr: &NetAddr, timeout: Duration) -> Result<Self, ClientError> {
        let dial_err = |source| ClientError::Dial {
            addr: addr.clone(),
            source,
        };

        let candidates = (addr.host.as_str(), addr.port)
            .to_socket_addrs()
            .map_err(dial_err)?;

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => return Self::from_stream(stream, timeout).map_err(dial_err),
                Err(e) => last_err = Some(e),
            }
        }

        Err(dial_err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "address resolved to nothing")
        })))
    }

    fn from_stream(stream: TcpStream, timeout: Duration) -> std::io::Result<Self> {
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            writer: stream,
            reader: RefCell::new(reader),
        })
    }
}

impl Transport for TcpTransport {
    fn round_trip(&self, request: &Request) -> Result<Response, ClientError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| ClientError::Protocol(format!("failed to encode request: {}", e)))?;
        line.push('\n');

        let mut writer = &self.writer;
        writer.write_all(line.as_bytes())?;
        writer.flush()?;

        let mut response = String::new();
        let read = self.reader.borrow_mut().read_line(&mut response)?;
        if read == 0 {
            return Err(ClientError::Protocol(
                "connection closed before a response was received".to_string(),
            ));
        }

        serde_json::from_str(response.trim_end())
            .map_err(|e| ClientError::Protocol(format!("invalid response: {}", e)))
    }
}
