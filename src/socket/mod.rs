//! Caller-facing TCP socket: wire codec, relay server and caller helper.
//!
//! # Architecture
//!
//! ```text
//! Caller process                       Relay process
//! ┌──────────────────┐                ┌──────────────────────┐
//! │ client::notify   │  one frame per │ RelayServer          │
//! │  TcpStream       │───────────────►│  TcpListener         │
//! │                  │  connection,   │  FrameCodec::decode  │
//! └──────────────────┘  no reply      └──────────┬───────────┘
//!                                                │ NotificationRequest
//!                                                ▼
//!                                           Dispatcher
//! ```
//!
//! # Wire Protocol
//!
//! `<platform id>::<device token>::<message>/ntf` with the default tokens.
//!
//! See [`framing`] for the codec.

pub mod client;
pub mod framing;
pub mod server;
