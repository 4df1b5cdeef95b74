//! End-to-end tests: real TCP caller → RelayServer → gateways.
//!
//! The APNs side runs the real `ApnsClient` over an in-memory transport;
//! the GCM side is a recording gateway.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;

use ntf_relay::notifications::apns::{ApnsClient, ConnectError, Connector};
use ntf_relay::socket::client::notify;
use ntf_relay::{DeliveryOutcome, Dispatcher, FrameCodec, Platform, PushGateway, RelayServer};

const TOKEN_HEX: &str = "ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789";

/// Bytes written to the fake APNs gateway, across all connections.
#[derive(Clone, Default)]
struct ApnsWire(Arc<Mutex<Vec<u8>>>);

struct WireStream(ApnsWire);

impl Write for WireStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 .0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct WireConnector(ApnsWire);

impl Connector for WireConnector {
    type Stream = WireStream;

    fn connect(&self) -> Result<WireStream, ConnectError> {
        Ok(WireStream(self.0.clone()))
    }
}

#[derive(Clone, Default)]
struct GcmRecorder(Arc<Mutex<Vec<Vec<u8>>>>);

impl PushGateway for GcmRecorder {
    fn deliver(&mut self, payload: &[u8]) -> anyhow::Result<DeliveryOutcome> {
        self.0.lock().unwrap().push(payload.to_vec());
        Ok(DeliveryOutcome::success())
    }
}

struct Harness {
    server: RelayServer<ApnsClient<WireConnector>, GcmRecorder>,
    addr: SocketAddr,
    apns: ApnsWire,
    gcm: GcmRecorder,
}

fn harness() -> Harness {
    let apns = ApnsWire::default();
    let gcm = GcmRecorder::default();
    let client = ApnsClient::connect(WireConnector(apns.clone())).unwrap();
    let server = RelayServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        FrameCodec::default(),
        Dispatcher::new(client, gcm.clone()),
    )
    .unwrap();
    let addr = server.local_addr().unwrap();
    Harness {
        server,
        addr,
        apns,
        gcm,
    }
}

/// Write raw bytes as a caller would, then service that one connection.
fn send_raw(h: &mut Harness, frame: &[u8]) -> Option<DeliveryOutcome> {
    let addr = h.addr;
    let frame = frame.to_vec();
    let caller = thread::spawn(move || {
        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        stream.write_all(&frame).unwrap();
    });
    let outcome = h.server.serve_one().unwrap();
    caller.join().unwrap();
    outcome
}

#[test]
fn test_ios_frame_reaches_persistent_client() {
    let mut h = harness();
    let frame = format!("ios::{TOKEN_HEX}::Hello world/ntf");

    let outcome = send_raw(&mut h, frame.as_bytes());

    assert_eq!(outcome, Some(DeliveryOutcome::success()));
    let wire = h.apns.0.lock().unwrap();
    assert_eq!(wire[0], 0);
    assert_eq!(&wire[1..3], &[0, 32]);
    assert_eq!(&wire[3..6], &[0xAB, 0xCD, 0xEF]);
    let body_len = u16::from_be_bytes([wire[35], wire[36]]) as usize;
    let body: serde_json::Value = serde_json::from_slice(&wire[37..]).unwrap();
    assert_eq!(wire.len(), 37 + body_len);
    assert_eq!(body["aps"]["alert"], "Hello world");
    assert!(h.gcm.0.lock().unwrap().is_empty());
}

#[test]
fn test_android_frame_reaches_gcm() {
    let mut h = harness();

    send_raw(&mut h, b"and::sometoken::Hi/ntf");

    let sent = h.gcm.0.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let body = String::from_utf8(sent[0].clone()).unwrap();
    assert!(body.contains(r#""registration_ids":["sometoken"]"#));
    assert!(body.contains(r#""message":"Hi""#));
    assert!(h.apns.0.lock().unwrap().is_empty());
}

#[test]
fn test_unknown_platform_makes_no_downstream_call() {
    let mut h = harness();

    assert_eq!(send_raw(&mut h, b"xyz::tok::msg/ntf"), None);

    assert!(h.apns.0.lock().unwrap().is_empty());
    assert!(h.gcm.0.lock().unwrap().is_empty());
}

#[test]
fn test_incomplete_frames_make_no_downstream_call() {
    let mut h = harness();

    assert_eq!(send_raw(&mut h, b"and::tok::no terminator"), None);
    assert_eq!(send_raw(&mut h, b"and tok no delimiter/ntf"), None);

    assert!(h.apns.0.lock().unwrap().is_empty());
    assert!(h.gcm.0.lock().unwrap().is_empty());
}

#[test]
fn test_bad_ios_token_is_skipped_and_server_keeps_going() {
    let mut h = harness();

    assert_eq!(send_raw(&mut h, b"ios::abcd::too short/ntf"), None);
    assert!(h.apns.0.lock().unwrap().is_empty());

    send_raw(&mut h, b"and::tok::still serving/ntf");
    assert_eq!(h.gcm.0.lock().unwrap().len(), 1);
}

#[test]
fn test_callers_are_serviced_in_order_through_notify_helper() {
    let mut h = harness();
    let addr = h.addr;

    let caller = thread::spawn(move || {
        let codec = FrameCodec::default();
        notify(addr, &codec, Platform::Android, "first", "one").unwrap();
        notify(addr, &codec, Platform::Android, "second", "two").unwrap();
    });
    h.server.serve_one().unwrap();
    h.server.serve_one().unwrap();
    caller.join().unwrap();

    let sent = h.gcm.0.lock().unwrap();
    let tokens: Vec<String> = sent
        .iter()
        .map(|p| {
            let json: serde_json::Value = serde_json::from_slice(p).unwrap();
            json["registration_ids"][0].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(tokens, ["first", "second"]);
}
