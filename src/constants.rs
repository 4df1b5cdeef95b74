//! Application-wide constants for ntf-relay.
//!
//! Protocol tokens, buffer bounds and network tunables live here so the
//! codec, the gateways and the configuration defaults agree on them.
//!
//! # Categories
//!
//! - **Wire protocol**: caller → relay frame tokens
//! - **Buffers**: per-connection read bounds
//! - **APNs**: binary frame layout and connect timeout
//! - **HTTP**: GCM request timeout

use std::time::Duration;

// ============================================================================
// Wire protocol
// ============================================================================

/// Separator between the three fields of an inbound frame.
pub const FRAME_DELIMITER: &str = "::";

/// Trailing sequence that marks the end of an inbound frame.
pub const FRAME_TERMINATOR: &str = "/ntf";

/// Platform identifier routed to the APNs gateway.
pub const PLATFORM_ID_IOS: &str = "ios";

/// Platform identifier routed to the GCM gateway.
pub const PLATFORM_ID_ANDROID: &str = "and";

// ============================================================================
// Buffers
// ============================================================================

/// Upper bound on the bytes read from one caller connection.
///
/// Frames larger than this are never reassembled and get dropped.
pub const READ_BUFFER_SIZE: usize = 8192;

// ============================================================================
// APNs
// ============================================================================

/// Command byte of the legacy binary APNs notification frame.
pub const APNS_COMMAND_SIMPLE: u8 = 0;

/// Raw device token length required by the binary APNs protocol.
pub const APNS_TOKEN_LEN: usize = 32;

/// Timeout for establishing the TCP leg of the APNs connection.
pub const APNS_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sound name attached to every APNs alert.
pub const APNS_DEFAULT_SOUND: &str = "default";

// ============================================================================
// HTTP
// ============================================================================

/// Request timeout for one-shot GCM calls.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
