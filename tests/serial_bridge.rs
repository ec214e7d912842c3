//! Serial bridge against real loopback sockets.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use fpv_sim_bridge::error::SimBridgeError;
use fpv_sim_bridge::serial::{ConnectionState, SerialBridge};

fn started_bridge() -> (SerialBridge, SocketAddr) {
    let mut bridge = SerialBridge::tcp("127.0.0.1", 0, 64);
    bridge.start().unwrap();
    let addr = bridge.local_addr().unwrap();
    (bridge, addr)
}

/// Polls `condition` until it holds or two seconds pass.
fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn connect(bridge: &mut SerialBridge, addr: SocketAddr) -> TcpStream {
    let client = TcpStream::connect(addr).unwrap();
    assert!(eventually(|| bridge.connected()));
    client
}

// ==================== Lifecycle Tests ====================

#[test]
fn test_no_client_reports_zero_without_blocking() {
    let (mut bridge, _) = started_bridge();

    let begin = Instant::now();
    for _ in 0..100 {
        assert_eq!(bridge.receive_available_bytes(), 0);
    }
    assert!(begin.elapsed() < Duration::from_millis(500));
    assert_eq!(bridge.state(), ConnectionState::Listening);
}

#[test]
fn test_bind_conflict_leaves_bridge_stopped() {
    let holder = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = holder.local_addr().unwrap().port();

    let mut bridge = SerialBridge::tcp("127.0.0.1", port, 64);
    assert!(matches!(bridge.start(), Err(SimBridgeError::Bind { .. })));
    assert_eq!(bridge.state(), ConnectionState::NotStarted);
    assert_eq!(bridge.receive_available_bytes(), 0);
}

#[test]
fn test_disconnect_before_start() {
    let mut bridge = SerialBridge::tcp("127.0.0.1", 0, 64);
    assert!(matches!(bridge.disconnect(), Err(SimBridgeError::NotStarted)));
}

#[test]
fn test_stop_closes_listener() {
    let (mut bridge, addr) = started_bridge();
    bridge.stop();

    assert_eq!(bridge.state(), ConnectionState::NotStarted);
    assert!(bridge.local_addr().is_none());
    assert!(TcpListener::bind(addr).is_ok());
}

// ==================== Receive Tests ====================

#[test]
fn test_received_count_repeats_until_drained() {
    let (mut bridge, addr) = started_bridge();
    let mut client = connect(&mut bridge, addr);

    client.write_all(b"\x24\x4d\x3c").unwrap();
    assert!(eventually(|| bridge.receive_available_bytes() == 3));

    assert_eq!(bridge.receive_available_bytes(), 3);
    assert_eq!(bridge.receive_available_bytes(), 3);

    assert_eq!(bridge.read_byte(), Some(0x24));
    assert_eq!(bridge.receive_available_bytes(), 2);
    assert_eq!(bridge.read_byte(), Some(0x4d));
    assert_eq!(bridge.read_byte(), Some(0x3c));

    assert_eq!(bridge.available_count(), 0);
    assert_eq!(bridge.receive_available_bytes(), 0);
}

#[test]
fn test_receive_truncated_to_buffer() {
    let mut bridge = SerialBridge::tcp("127.0.0.1", 0, 4);
    bridge.start().unwrap();
    let addr = bridge.local_addr().unwrap();
    let mut client = connect(&mut bridge, addr);

    client.write_all(b"abcdefgh").unwrap();
    assert!(eventually(|| bridge.receive_available_bytes() > 0));
    assert!(bridge.available_count() <= 4);
}

// ==================== Transmit Tests ====================

#[test]
fn test_write_reaches_client() {
    let (mut bridge, addr) = started_bridge();
    let mut client = connect(&mut bridge, addr);
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    for byte in b"ok" {
        bridge.write_byte(*byte);
    }

    let mut received = [0u8; 2];
    client.read_exact(&mut received).unwrap();
    assert_eq!(&received, b"ok");
}

#[test]
fn test_write_without_client_is_dropped() {
    let (mut bridge, addr) = started_bridge();
    bridge.write_byte(b'x');

    let mut client = connect(&mut bridge, addr);
    client.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
    let mut buf = [0u8; 1];
    assert!(client.read(&mut buf).is_err());
}

// ==================== Connection Tests ====================

#[test]
fn test_peer_close_returns_to_listening() {
    let (mut bridge, addr) = started_bridge();
    let client = connect(&mut bridge, addr);
    drop(client);

    assert!(eventually(|| {
        bridge.receive_available_bytes();
        bridge.state() == ConnectionState::Listening
    }));

    let _again = connect(&mut bridge, addr);
    assert_eq!(bridge.state(), ConnectionState::Connected);
}

#[test]
fn test_disconnect_keeps_listener() {
    let (mut bridge, addr) = started_bridge();
    let mut client = connect(&mut bridge, addr);
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    assert!(bridge.disconnect().unwrap());
    assert_eq!(bridge.state(), ConnectionState::Listening);

    let mut buf = [0u8; 1];
    assert_eq!(client.read(&mut buf).unwrap(), 0);

    let _next = connect(&mut bridge, addr);
    assert_eq!(bridge.state(), ConnectionState::Connected);
}

#[test]
fn test_disconnect_without_client() {
    let (mut bridge, _) = started_bridge();
    assert!(!bridge.disconnect().unwrap());
    assert_eq!(bridge.state(), ConnectionState::Listening);
}
