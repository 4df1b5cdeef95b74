//! Caller-side helper for handing a notification to the relay.

use std::io::Write;
use std::net::{SocketAddr, TcpStream};

use anyhow::{Context, Result};

use super::framing::{FrameCodec, NotificationRequest, Platform};

/// Send one notification request to the relay at `addr`.
///
/// Succeeds once the frame has been written; the relay never replies, so
/// this says nothing about delivery to the device.
pub fn notify(
    addr: SocketAddr,
    codec: &FrameCodec,
    platform: Platform,
    device_token: &str,
    message: &str,
) -> Result<()> {
    let request = NotificationRequest {
        platform,
        device_token: device_token.to_string(),
        message: message.to_string(),
    };

    let mut stream = TcpStream::connect(addr)
        .inspect_err(|e| log::error!("NOTIFICATION ERROR (CONNECT): {e}"))
        .with_context(|| format!("Failed to connect to relay at {addr}"))?;

    stream
        .write_all(&codec.encode(&request))
        .and_then(|()| stream.flush())
        .inspect_err(|e| log::error!("NOTIFICATION ERROR (SEND): {e}"))
        .context("Failed to send notification to relay")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn test_notify_writes_one_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let reader = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        });

        notify(addr, &FrameCodec::default(), Platform::Android, "tok", "Hi").unwrap();

        assert_eq!(reader.join().unwrap(), b"and::tok::Hi/ntf");
    }

    #[test]
    fn test_notify_reports_connect_failure() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

        let err = notify(addr, &FrameCodec::default(), Platform::Ios, "tok", "Hi").unwrap_err();
        assert!(err.to_string().contains("Failed to connect to relay"));
    }
}
