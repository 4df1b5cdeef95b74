//! ntf-relay - local push notification relay.
//!
//! Internal callers open a TCP connection, write one delimiter-framed
//! request and hang up. The relay decodes it, encodes a platform payload
//! and forwards it to Apple's binary APNs gateway or to Google's GCM HTTP
//! endpoint.
//!
//! # Architecture
//!
//! - **Socket** - wire codec, sequential accept loop, caller helper
//! - **Notifications** - payload encoder, persistent APNs client, one-shot GCM client
//! - **Config** - file + environment configuration
//!
//! # Modules
//!
//! - [`socket`] - caller protocol and relay server
//! - [`notifications`] - encoding and gateway delivery
//! - [`config`] - configuration loading
//! - [`constants`] - protocol constants and tunables

pub mod config;
pub mod constants;
pub mod notifications;
pub mod socket;

// Re-export commonly used types
pub use config::Config;
pub use notifications::{DeliveryOutcome, Dispatcher, PushGateway};
pub use socket::framing::{FrameCodec, NotificationRequest, Platform};
pub use socket::server::RelayServer;
