//! # Serial Bridge Module
//!
//! Emulates the firmware's UART over a network socket.
//!
//! This module handles:
//! - Listening for a single ground-station client ([`transport`])
//! - Buffering received bytes for byte-at-a-time reads ([`buffer`])
//! - Best-effort, non-blocking transmit
//! - Connect/disconnect lifecycle
//!
//! ## State Machine
//!
//! ```text
//! NotStarted --start()--> Listening --accept--> Connected
//!     ^                       ^                    |
//!     |                       +----disconnect()----+
//!     +---------------stop()-----------------------+
//! ```
//!
//! ## UART Contract
//!
//! [`SerialBridge::receive_available_bytes`] is safe to call every tick: while
//! unread bytes remain it only reports their count. The socket is touched
//! only once the buffer has been drained. [`SerialBridge::read_byte`] must
//! only be called while bytes are available, exactly as with a hardware
//! UART driver.

pub mod buffer;
pub mod transport;

use std::net::SocketAddr;
use tracing::debug;

use crate::config::SerialConfig;
use crate::error::{Result, SimBridgeError};
use buffer::SerialBuffer;
use transport::{ByteTransport, TcpTransport};

/// Default TCP port the bridge listens on.
pub const DEFAULT_PORT: u16 = 20000;

/// Bridge lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NotStarted,
    Listening,
    Connected,
}

/// UART emulation over a [`ByteTransport`].
pub struct SerialBridge {
    transport: Box<dyn ByteTransport>,
    buffer: SerialBuffer,
    scratch: Vec<u8>,
    started: bool,
}

impl std::fmt::Debug for SerialBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialBridge")
            .field("state", &self.state())
            .field("available", &self.buffer.available_count())
            .finish_non_exhaustive()
    }
}

impl SerialBridge {
    /// Bridge over an arbitrary transport, receiving at most `buffer_len`
    /// bytes per fill.
    #[must_use]
    pub fn new(transport: Box<dyn ByteTransport>, buffer_len: usize) -> Self {
        let buffer = SerialBuffer::new(buffer_len);
        let scratch = vec![0u8; buffer.capacity()];
        Self {
            transport,
            buffer,
            scratch,
            started: false,
        }
    }

    /// Bridge listening on TCP `host:port`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fpv_sim_bridge::serial::SerialBridge;
    ///
    /// let mut bridge = SerialBridge::tcp("127.0.0.1", 20000, 256);
    /// bridge.start()?;
    /// if bridge.receive_available_bytes() > 0 {
    ///     let _first = bridge.read_byte();
    /// }
    /// # Ok::<(), fpv_sim_bridge::error::SimBridgeError>(())
    /// ```
    #[must_use]
    pub fn tcp(host: &str, port: u16, buffer_len: usize) -> Self {
        Self::new(Box::new(TcpTransport::new(host, port)), buffer_len)
    }

    /// TCP bridge for the `[serial]` section.
    #[must_use]
    pub fn from_config(config: &SerialConfig) -> Self {
        Self::tcp(&config.host, config.port, config.buffer_len)
    }

    /// Binds the transport and starts listening.
    ///
    /// Starting an already started bridge is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Bind` when the endpoint cannot be bound; the bridge stays
    /// `NotStarted` and may be started again.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            debug!("Serial bridge already started");
            return Ok(());
        }
        self.transport.start()?;
        self.buffer.clear();
        self.started = true;
        Ok(())
    }

    /// Polls for a client without blocking.
    pub fn connected(&mut self) -> bool {
        self.started && self.transport.poll_connected()
    }

    /// Current state without polling the socket.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if !self.started {
            ConnectionState::NotStarted
        } else if self.transport.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Listening
        }
    }

    /// Bytes ready for [`read_byte`](Self::read_byte).
    ///
    /// Returns the buffered count if any bytes are unread. Otherwise performs
    /// one non-blocking receive and returns how many bytes it produced.
    /// Receive failures count as zero.
    pub fn receive_available_bytes(&mut self) -> usize {
        if !self.buffer.is_empty() {
            return self.buffer.available_count();
        }
        if !self.connected() {
            return 0;
        }

        match self.transport.receive(&mut self.scratch) {
            Ok(n) => self.buffer.fill(&self.scratch[..n]),
            Err(e) => {
                debug!("Serial receive failed: {}", e);
                0
            }
        }
    }

    /// Unread bytes in the buffer, without touching the socket.
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.buffer.available_count()
    }

    /// Next unread byte.
    ///
    /// Callers must check availability first. On underrun this returns
    /// `None` and the count stays at zero.
    pub fn read_byte(&mut self) -> Option<u8> {
        self.buffer.take_byte()
    }

    /// Transmits one byte if a client is attached; otherwise drops it.
    pub fn write_byte(&mut self, byte: u8) {
        if !self.connected() {
            return;
        }
        match self.transport.send(&[byte]) {
            Ok(1) => {}
            Ok(_) => debug!("Serial transmit backpressure, byte dropped"),
            Err(e) => debug!("Serial transmit failed: {}", e),
        }
    }

    /// Tears down the current client, keeping the listener.
    ///
    /// Returns `false` when no client was attached or shutdown failed.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` if the bridge was never started.
    pub fn disconnect(&mut self) -> Result<bool> {
        if !self.started {
            return Err(SimBridgeError::NotStarted);
        }
        self.buffer.clear();
        let ok = self.transport.disconnect();
        debug!("Serial disconnect requested, client shut down: {}", ok);
        Ok(ok)
    }

    /// Closes the transport and returns to `NotStarted`.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.transport.stop();
        self.buffer.clear();
        self.started = false;
    }

    /// Bound address, once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }
}

impl Drop for SerialBridge {
    fn drop(&mut self) {
        self.stop();
    }
}
