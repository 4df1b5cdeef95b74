//! Push delivery: payload encoding and the two downstream gateways.
//!
//! # Architecture
//!
//! ```text
//! NotificationRequest
//!     ↓
//! payload::encode (per platform, pure)
//!     ↓
//! Dispatcher ──Ios──► ApnsClient  (persistent TLS, retries forever)
//!            └─Android─► GcmClient (one HTTP POST, no retry)
//! ```
//!
//! The retry policies are deliberately different: APNs delivery blocks
//! until the bytes are written, GCM gets exactly one attempt.

// Rust guideline compliant 2026-02

pub mod apns;
pub mod gcm;
pub mod payload;

use crate::socket::framing::{NotificationRequest, Platform};

/// Result of one delivery attempt. Logged, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Whether the gateway accepted the notification.
    pub success: bool,
    /// Optional diagnostic for the log.
    pub detail: Option<String>,
}

impl DeliveryOutcome {
    /// Plain success.
    pub fn success() -> Self {
        Self {
            success: true,
            detail: None,
        }
    }

    /// Success with a note worth logging.
    pub fn success_with(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: Some(detail.into()),
        }
    }

    /// Failure with its reason.
    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: Some(detail.into()),
        }
    }
}

/// A downstream gateway that takes encoded payloads.
///
/// `Err` means the gateway can no longer operate at all and the relay
/// should stop; a rejected notification is an `Ok` non-success outcome.
pub trait PushGateway {
    /// Hand one encoded payload to the gateway.
    fn deliver(&mut self, payload: &[u8]) -> anyhow::Result<DeliveryOutcome>;
}

/// Routes decoded requests to the gateway for their platform.
#[derive(Debug)]
pub struct Dispatcher<A, G> {
    apns: A,
    gcm: G,
}

impl<A: PushGateway, G: PushGateway> Dispatcher<A, G> {
    /// Pair the iOS and Android gateways.
    pub fn new(apns: A, gcm: G) -> Self {
        Self { apns, gcm }
    }

    /// The iOS gateway.
    pub fn apns(&self) -> &A {
        &self.apns
    }

    /// The Android gateway.
    pub fn gcm(&self) -> &G {
        &self.gcm
    }

    /// Encode and deliver one request, logging the disposition.
    ///
    /// Returns `Ok(None)` when the request could not be encoded; only a
    /// gateway that can no longer operate produces `Err`.
    pub fn dispatch(&mut self, request: &NotificationRequest) -> anyhow::Result<Option<DeliveryOutcome>> {
        let payload = match payload::encode(request) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!(
                    "NOTIFICATION ERROR (ENCODE): {e} (token {})",
                    request.device_token
                );
                return Ok(None);
            }
        };

        let outcome = match request.platform {
            Platform::Ios => self.apns.deliver(&payload)?,
            Platform::Android => self.gcm.deliver(&payload)?,
        };

        match (outcome.success, outcome.detail.as_deref()) {
            (true, None) => log::info!(
                "NOTIFICATION SENT: '{}' to {}",
                request.message,
                request.device_token
            ),
            (true, Some(detail)) => log::info!(
                "NOTIFICATION SENT: '{}' to {} ({detail})",
                request.message,
                request.device_token
            ),
            (false, detail) => log::warn!(
                "NOTIFICATION FAILED: '{}' to {}: {}",
                request.message,
                request.device_token,
                detail.unwrap_or("no detail")
            ),
        }

        Ok(Some(outcome))
    }
}
