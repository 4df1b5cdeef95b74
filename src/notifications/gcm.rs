//! One-shot GCM HTTP gateway client.
//!
//! Each payload is POSTed once; the JSON reply decides success. Nothing is
//! retried here, failures are reported back to the dispatcher for logging.

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{DeliveryOutcome, PushGateway};
use crate::config::GcmConfig;

/// Subset of the GCM response body the relay looks at.
#[derive(Debug, Deserialize)]
struct GcmResponse {
    success: serde_json::Value,
    #[serde(default)]
    results: Vec<GcmResult>,
}

#[derive(Debug, Deserialize)]
struct GcmResult {
    #[serde(default)]
    error: Option<String>,
}

/// Blocking GCM client.
///
/// Reuses one `reqwest` client across calls for connection pooling.
#[derive(Debug)]
pub struct GcmClient {
    client: reqwest::blocking::Client,
    url: String,
    api_key: String,
}

impl GcmClient {
    /// Build the HTTP client from configuration.
    ///
    /// Certificate validation is switched off when
    /// `accept_invalid_certs` is set.
    pub fn new(config: &GcmConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            log::warn!("GCM: TLS certificate validation is disabled");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .context("Failed to build GCM HTTP client")?;

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// POST one encoded body and interpret the reply.
    ///
    /// Success is exactly `"success": 1` in the response JSON. Transport
    /// errors, non-JSON bodies and any other value are failures.
    pub fn send(&self, payload: &[u8]) -> DeliveryOutcome {
        let response = match self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, format!("key={}", self.api_key))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
        {
            Ok(response) => response,
            Err(e) => return DeliveryOutcome::failure(format!("GCM request failed: {e}")),
        };

        let status = response.status();
        let body = match response.text() {
            Ok(body) => body,
            Err(e) => return DeliveryOutcome::failure(format!("HTTP {status}: unreadable body: {e}")),
        };

        interpret_response(status.as_u16(), &body)
    }
}

/// Decide the outcome of a GCM reply.
fn interpret_response(status: u16, body: &str) -> DeliveryOutcome {
    let parsed: GcmResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => return DeliveryOutcome::failure(format!("HTTP {status}: unparsable response: {e}")),
    };

    if parsed.success.as_i64() == Some(1) {
        return DeliveryOutcome::success();
    }

    let reason = parsed
        .results
        .iter()
        .find_map(|r| r.error.as_deref())
        .map_or_else(|| format!("success={}", parsed.success), str::to_string);
    DeliveryOutcome::failure(format!("HTTP {status}: {reason}"))
}

impl PushGateway for GcmClient {
    fn deliver(&mut self, payload: &[u8]) -> Result<DeliveryOutcome> {
        Ok(self.send(payload))
    }
}
