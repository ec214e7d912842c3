//! Byte transport abstraction behind the serial bridge.
//!
//! [`TcpTransport`] is the production implementation: a non-blocking TCP
//! listener accepting one client at a time. Tests substitute
//! [`mocks::MockTransport`].

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{Result, SimBridgeError};

/// Non-blocking, single-client byte stream.
pub trait ByteTransport: Send {
    /// Binds the endpoint and starts listening.
    fn start(&mut self) -> Result<()>;

    /// Accepts a pending client if there is none yet and reports whether a
    /// client is attached. Never blocks.
    fn poll_connected(&mut self) -> bool;

    /// Whether a client is currently attached, without polling.
    fn is_connected(&self) -> bool;

    /// Reads whatever is immediately available into `buf`.
    ///
    /// Returns `Ok(0)` when nothing is pending.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes as much of `data` as the socket accepts without blocking.
    fn send(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Drops the attached client, keeping the listener. Returns `true` if a
    /// client was shut down cleanly.
    fn disconnect(&mut self) -> bool;

    /// Closes the client and the listener.
    fn stop(&mut self);

    /// Bound address once started.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// TCP server transport built on non-blocking std sockets.
#[derive(Debug)]
pub struct TcpTransport {
    bind_addr: String,
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Transport that will listen on `host:port` once started.
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            bind_addr: format!("{}:{}", host, port),
            listener: None,
            stream: None,
        }
    }

    #[must_use]
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    fn drop_client(&mut self, reason: &str) {
        if let Some(stream) = self.stream.take() {
            let peer = stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<unknown>".to_string());
            info!("Serial client {} dropped ({})", peer, reason);
        }
    }
}

impl ByteTransport for TcpTransport {
    fn start(&mut self) -> Result<()> {
        let listener = TcpListener::bind(&self.bind_addr).map_err(|source| SimBridgeError::Bind {
            addr: self.bind_addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;

        info!("Serial bridge listening on {}", self.bind_addr);
        self.listener = Some(listener);
        Ok(())
    }

    fn poll_connected(&mut self) -> bool {
        if self.stream.is_some() {
            return true;
        }
        let Some(listener) = &self.listener else {
            return false;
        };

        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!("Rejecting serial client {}: {}", peer, e);
                    return false;
                }
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("TCP_NODELAY not set for {}: {}", peer, e);
                }
                info!("Serial client connected from {}", peer);
                self.stream = Some(stream);
                true
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(e) => {
                debug!("Accept failed: {}", e);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };

        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.drop_client("end of stream");
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                self.drop_client("receive error");
                Err(e)
            }
        }
    }

    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(0);
        };

        match stream.write(data) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                self.drop_client("send error");
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) -> bool {
        match self.stream.take() {
            Some(stream) => match stream.shutdown(Shutdown::Both) {
                Ok(()) => true,
                Err(e) => {
                    debug!("Shutdown of serial client failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    fn stop(&mut self) {
        self.disconnect();
        if self.listener.take().is_some() {
            info!("Serial bridge on {} closed", self.bind_addr);
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted transport for bridge tests.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        pub started: Arc<Mutex<bool>>,
        pub connected: Arc<Mutex<bool>>,
        pub inbound: Arc<Mutex<VecDeque<Vec<u8>>>>,
        pub sent: Arc<Mutex<Vec<u8>>>,
        pub receive_calls: Arc<Mutex<usize>>,
        pub bind_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub receive_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_connected(&self, connected: bool) {
            *self.connected.lock().unwrap() = connected;
        }

        pub fn push_inbound(&self, data: &[u8]) {
            self.inbound.lock().unwrap().push_back(data.to_vec());
        }

        pub fn get_sent(&self) -> Vec<u8> {
            self.sent.lock().unwrap().clone()
        }

        pub fn receive_calls(&self) -> usize {
            *self.receive_calls.lock().unwrap()
        }

        pub fn set_bind_error(&self, error: io::ErrorKind) {
            *self.bind_error.lock().unwrap() = Some(error);
        }

        pub fn set_receive_error(&self, error: io::ErrorKind) {
            *self.receive_error.lock().unwrap() = Some(error);
        }
    }

    impl ByteTransport for MockTransport {
        fn start(&mut self) -> Result<()> {
            if let Some(kind) = *self.bind_error.lock().unwrap() {
                return Err(SimBridgeError::Bind {
                    addr: "mock".to_string(),
                    source: io::Error::new(kind, "Mock bind error"),
                });
            }
            *self.started.lock().unwrap() = true;
            Ok(())
        }

        fn poll_connected(&mut self) -> bool {
            *self.connected.lock().unwrap()
        }

        fn is_connected(&self) -> bool {
            *self.connected.lock().unwrap()
        }

        fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            *self.receive_calls.lock().unwrap() += 1;
            if let Some(kind) = *self.receive_error.lock().unwrap() {
                return Err(io::Error::new(kind, "Mock receive error"));
            }
            match self.inbound.lock().unwrap().pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => Ok(0),
            }
        }

        fn send(&mut self, data: &[u8]) -> io::Result<usize> {
            self.sent.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn disconnect(&mut self) -> bool {
            let mut connected = self.connected.lock().unwrap();
            let was = *connected;
            *connected = false;
            was
        }

        fn stop(&mut self) {
            *self.connected.lock().unwrap() = false;
            *self.started.lock().unwrap() = false;
        }

        fn local_addr(&self) -> Option<SocketAddr> {
            None
        }
    }
}
