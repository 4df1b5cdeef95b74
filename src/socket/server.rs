//! TCP relay server.
//!
//! Accepts one caller at a time, reads a single frame, dispatches it and
//! moves on to the next caller. Nothing is ever written back to the caller.
//! Because servicing is sequential, a slow gateway delays every caller
//! queued behind it.

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use anyhow::{Context, Result};

use super::framing::FrameCodec;
use crate::constants::READ_BUFFER_SIZE;
use crate::notifications::{DeliveryOutcome, Dispatcher, PushGateway};

/// Relay server owning the listener and the gateways.
#[derive(Debug)]
pub struct RelayServer<A, G> {
    listener: TcpListener,
    codec: FrameCodec,
    dispatcher: Dispatcher<A, G>,
}

impl<A: PushGateway, G: PushGateway> RelayServer<A, G> {
    /// Bind the listening socket.
    ///
    /// The gateways are expected to be ready already; in particular the
    /// APNs connection must be up before callers are accepted.
    pub fn bind(addr: SocketAddr, codec: FrameCodec, dispatcher: Dispatcher<A, G>) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("Failed to bind relay socket: {addr}"))?;
        log::info!("Relay listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            codec,
            dispatcher,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The dispatcher and its gateways.
    pub fn dispatcher(&self) -> &Dispatcher<A, G> {
        &self.dispatcher
    }

    /// Accept loop. Only returns when a gateway can no longer operate.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.serve_one()?;
        }
    }

    /// Accept and service exactly one caller connection.
    ///
    /// Accept and read errors only affect that caller and are logged.
    /// Returns the delivery outcome when a request was dispatched.
    pub fn serve_one(&mut self) -> Result<Option<DeliveryOutcome>> {
        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) => {
                log::error!("Accept error: {e}");
                return Ok(None);
            }
        };

        // Released before the next accept, whatever happens below
        let mut stream = scopeguard::guard(stream, |s| {
            let _ = s.shutdown(Shutdown::Both);
        });

        let chunk = match read_frame(&mut stream, &self.codec) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::error!("Read error from {peer}: {e}");
                return Ok(None);
            }
        };

        let request = match self.codec.decode(&chunk) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("Dropped frame from {peer}: {e}");
                return Ok(None);
            }
        };

        self.dispatcher.dispatch(&request)
    }
}

/// Read from `stream` until the terminator shows up, the peer closes, or
/// [`READ_BUFFER_SIZE`] bytes have been collected.
///
/// Frames larger than the buffer are never reassembled; whatever was read
/// is returned and will fail to decode.
fn read_frame(stream: &mut TcpStream, codec: &FrameCodec) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut filled = 0;
    while filled < buf.len() {
        let n = match stream.read(&mut buf[filled..]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if n == 0 {
            break;
        }
        filled += n;
        if codec.has_terminator(&buf[..filled]) {
            break;
        }
    }
    buf.truncate(filled);
    Ok(buf)
}
