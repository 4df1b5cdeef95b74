//! Persistent APNs gateway client.
//!
//! Holds one long-lived TLS connection to the binary APNs gateway and
//! writes pre-encoded frames over it. A failed write tears the connection
//! down, opens a fresh one and retries the same bytes, forever and with
//! no backoff: delivery to APNs is at-least-once and the caller blocks
//! until it succeeds.
//!
//! # States
//!
//! ```text
//! Disconnected ──connect──► Connected ──write──► Sending ──ok──► Connected
//!      ▲                                            │
//!      └────────────── write failed ────────────────┘
//! ```

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use openssl::ssl::{SslConnector, SslFiletype, SslMethod, SslStream};
use thiserror::Error;

use super::{DeliveryOutcome, PushGateway};
use crate::config::ApnsConfig;

/// Failure to establish a gateway transport.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The TLS context itself cannot be set up. Retrying cannot help.
    #[error("TLS setup failed: {0}")]
    Setup(String),
    /// Host name did not resolve to any address.
    #[error("could not resolve {0}")]
    Resolve(String),
    /// TCP connect failed or timed out.
    #[error("connect failed: {0}")]
    Io(#[from] io::Error),
    /// TLS handshake was rejected.
    #[error("TLS handshake failed: {0}")]
    Handshake(String),
}

impl ConnectError {
    /// Whether establishment can no longer be attempted at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Setup(_))
    }
}

/// Opens transports to the APNs gateway.
///
/// Implemented over TLS by [`TlsConnector`]; tests substitute scripted
/// transports.
pub trait Connector {
    /// Open transport handle.
    type Stream: Write;

    /// Establish a fresh transport.
    fn connect(&self) -> Result<Self::Stream, ConnectError>;

    /// Release a transport that is being replaced.
    fn close(&self, stream: Self::Stream) {
        drop(stream);
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    /// No live transport.
    Disconnected,
    /// Transport open and idle.
    Connected,
    /// A payload write is in flight.
    Sending,
}

/// Client-certificate TLS connector for the APNs gateway.
pub struct TlsConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
    ssl: SslConnector,
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl TlsConnector {
    /// Load the client certificate and key and prepare the TLS context.
    ///
    /// The key is read from `key_path` when set, otherwise from the
    /// certificate PEM (which then has to carry both).
    pub fn new(config: &ApnsConfig) -> anyhow::Result<Self> {
        let key_path: &PathBuf = config.key_path.as_ref().unwrap_or(&config.cert_path);

        let mut builder =
            SslConnector::builder(SslMethod::tls_client()).context("Failed to create TLS context")?;
        builder
            .set_certificate_chain_file(&config.cert_path)
            .with_context(|| format!("Failed to load APNs certificate: {}", config.cert_path.display()))?;
        builder
            .set_private_key_file(key_path, SslFiletype::PEM)
            .with_context(|| format!("Failed to load APNs private key: {}", key_path.display()))?;
        builder
            .check_private_key()
            .context("APNs private key does not match certificate")?;

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            ssl: builder.build(),
        })
    }
}

impl Connector for TlsConnector {
    type Stream = SslStream<TcpStream>;

    fn connect(&self) -> Result<Self::Stream, ConnectError> {
        let endpoint = format!("{}:{}", self.host, self.port);
        let addr = endpoint
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ConnectError::Resolve(endpoint.clone()))?;

        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        tcp.set_nodelay(true)?;

        let config = self
            .ssl
            .configure()
            .map_err(|e| ConnectError::Setup(e.to_string()))?;
        config
            .connect(&self.host, tcp)
            .map_err(|e| ConnectError::Handshake(e.to_string()))
    }

    fn close(&self, mut stream: Self::Stream) {
        // Best effort: the peer may already be gone
        let _ = stream.shutdown();
        let _ = stream.get_ref().shutdown(Shutdown::Both);
    }
}

/// Persistent APNs client owning the current transport.
pub struct ApnsClient<C: Connector> {
    connector: C,
    stream: Option<C::Stream>,
    state: GatewayState,
    reconnects: u64,
}

impl<C: Connector> std::fmt::Debug for ApnsClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApnsClient")
            .field("state", &self.state)
            .field("reconnects", &self.reconnects)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ApnsClient<C> {
    /// Connect for the first time.
    ///
    /// Any failure here is returned; the relay must not start accepting
    /// callers without a live APNs connection.
    pub fn connect(connector: C) -> Result<Self, ConnectError> {
        let stream = connector.connect()?;
        log::info!("APNS: connected");
        Ok(Self {
            connector,
            stream: Some(stream),
            state: GatewayState::Connected,
            reconnects: 0,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> GatewayState {
        self.state
    }

    /// Total reconnects performed over the client's lifetime.
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Release the current transport and open a new one.
    ///
    /// The old transport is closed before the new one is attempted, so on
    /// failure the client is left `Disconnected`.
    pub fn reconnect(&mut self) -> Result<&mut C::Stream, ConnectError> {
        if let Some(old) = self.stream.take() {
            self.connector.close(old);
        }
        self.state = GatewayState::Disconnected;
        self.reconnects += 1;
        log::info!("APNS: reconnect");

        let stream = self.connector.connect()?;
        self.state = GatewayState::Connected;
        Ok(self.stream.insert(stream))
    }

    /// Write `payload`, reconnecting and retrying until it goes through.
    ///
    /// Returns the number of reconnects this delivery needed. Only a fatal
    /// [`ConnectError`] ends the loop early.
    pub fn send(&mut self, payload: &[u8]) -> Result<u64, ConnectError> {
        let mut reconnects = 0;
        loop {
            if let Some(stream) = self.stream.as_mut() {
                self.state = GatewayState::Sending;
                match write_frame(stream, payload) {
                    Ok(()) => {
                        self.state = GatewayState::Connected;
                        return Ok(reconnects);
                    }
                    Err(e) => log::warn!("APNS: write failed: {e}"),
                }
            }

            reconnects += 1;
            match self.reconnect() {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => log::error!("APNS: {e}"),
            }
        }
    }
}

fn write_frame<W: Write>(stream: &mut W, payload: &[u8]) -> io::Result<()> {
    stream.write_all(payload)?;
    stream.flush()
}

impl<C: Connector> PushGateway for ApnsClient<C> {
    fn deliver(&mut self, payload: &[u8]) -> anyhow::Result<DeliveryOutcome> {
        let reconnects = self
            .send(payload)
            .context("APNs connection can no longer be established")?;
        Ok(if reconnects == 0 {
            DeliveryOutcome::success()
        } else {
            DeliveryOutcome::success_with(format!("delivered after {reconnects} reconnect(s)"))
        })
    }
}
