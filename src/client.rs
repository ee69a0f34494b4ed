use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::SUCCESS;
use crate::{KvMessage, KvsError, Result};

/// `KvsClient` contains the functionality for communication with a [`SocketServer`].
///
/// Every request opens its own connection, sends one request, waits for one response and
/// closes the connection. Keys and values are checked locally first, so an invalid request
/// never reaches the network.
///
/// [`SocketServer`]: ./struct.SocketServer.html
#[derive(Debug, Clone)]
pub struct KvsClient {
    addr: String,
    timeout: Option<Duration>,
}

impl KvsClient {
    /// creates a client for the server at `addr`, given as `host:port`. No connection is made
    /// until the first request
    pub fn new(addr: impl Into<String>) -> Self {
        KvsClient {
            addr: addr.into(),
            timeout: None,
        }
    }

    /// applies `timeout` to connecting, sending and waiting for the response
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// the address requests are sent to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// sends a put request to the server
    /// # Errors
    /// [`KvsError::InvalidKey`] or [`KvsError::InvalidValue`] without contacting the server,
    /// a socket error, or the failure reported by the server
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        check_value(value)?;
        let resp = self.request(&KvMessage::PutRequest {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        expect_success(resp)
    }

    /// gets the value of the specified `key` from the server
    /// # Errors
    /// [`KvsError::InvalidKey`] without contacting the server, a socket error, or the failure
    /// reported by the server, e.g. [`KvsError::NoSuchKey`]
    pub fn get(&self, key: &str) -> Result<String> {
        check_key(key)?;
        let resp = self.request(&KvMessage::GetRequest { key: key.to_string() })?;
        match resp {
            KvMessage::Response { value: Some(value), .. } => Ok(value),
            KvMessage::Response { message: Some(msg), .. } => Err(KvsError::from_message(&msg)),
            _ => Err(KvsError::InvalidFormat),
        }
    }

    /// removes a key and its associated value from the store
    /// # Errors
    /// [`KvsError::InvalidKey`] without contacting the server, a socket error, or the failure
    /// reported by the server, e.g. [`KvsError::NoSuchKey`]
    pub fn del(&self, key: &str) -> Result<()> {
        check_key(key)?;
        let resp = self.request(&KvMessage::DelRequest { key: key.to_string() })?;
        expect_success(resp)
    }

    /// one complete exchange: connect, send `req`, read the response, close
    fn request(&self, req: &KvMessage) -> Result<KvMessage> {
        let mut stream = self.connect()?;
        debug!("sending request to {}: {:?}", self.addr, req);
        req.write_to(&mut stream)
            .map_err(|_| KvsError::CouldNotConnect)?;
        // nothing more will be sent on this connection
        stream
            .shutdown(Shutdown::Write)
            .map_err(|_| KvsError::CouldNotConnect)?;

        let resp = KvMessage::read_from(&mut stream)?;
        debug!("received response from {}: {:?}", self.addr, resp);
        close(stream)?;
        Ok(resp)
    }

    fn connect(&self) -> Result<TcpStream> {
        let addrs: Vec<SocketAddr> = self
            .addr
            .to_socket_addrs()
            .map_err(|_| KvsError::CouldNotCreateSocket)?
            .collect();
        if addrs.is_empty() {
            return Err(KvsError::CouldNotCreateSocket);
        }

        let stream = addrs
            .iter()
            .find_map(|addr| {
                let conn = match self.timeout {
                    Some(timeout) => TcpStream::connect_timeout(addr, timeout),
                    None => TcpStream::connect(addr),
                };
                conn.ok()
            })
            .ok_or(KvsError::CouldNotConnect)?;

        stream
            .set_read_timeout(self.timeout)
            .and_then(|_| stream.set_write_timeout(self.timeout))
            .map_err(|_| KvsError::CouldNotCreateSocket)?;
        Ok(stream)
    }
}

/// a peer that already closed its side is fine; anything else is reported
fn close(stream: TcpStream) -> Result<()> {
    match stream.shutdown(Shutdown::Read) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
        Err(_) => Err(KvsError::CouldNotClose),
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        Err(KvsError::InvalidKey)
    } else {
        Ok(())
    }
}

fn check_value(value: &str) -> Result<()> {
    if value.is_empty() {
        Err(KvsError::InvalidValue)
    } else {
        Ok(())
    }
}

/// put/del succeed only if the response says so; anything else is turned into the failure it
/// carries
fn expect_success(resp: KvMessage) -> Result<()> {
    match resp {
        KvMessage::Response { message: Some(msg), .. } if msg == SUCCESS => Ok(()),
        KvMessage::Response { message: Some(msg), .. } => Err(KvsError::from_message(&msg)),
        _ => Err(KvsError::InvalidFormat),
    }
}
