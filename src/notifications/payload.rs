//! Per-platform payload encoding.
//!
//! Pure transformation from a [`NotificationRequest`] to the bytes each
//! gateway expects. Nothing here performs I/O or logs; failures come back
//! as [`EncodeError`] and the caller decides what to report.

use serde::Serialize;
use thiserror::Error;

use crate::constants::{APNS_COMMAND_SIMPLE, APNS_DEFAULT_SOUND, APNS_TOKEN_LEN};
use crate::socket::framing::{NotificationRequest, Platform};

/// Why a request could not be encoded.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Device token is not hex text.
    #[error("device token is not valid hex: {0}")]
    InvalidTokenHex(String),
    /// Device token decodes to the wrong number of bytes.
    #[error("device token decodes to {actual} bytes, expected {expected}")]
    TokenLength {
        /// Required raw length.
        expected: usize,
        /// Raw length after hex decoding.
        actual: usize,
    },
    /// Serialized body does not fit the 16-bit length field.
    #[error("payload of {0} bytes does not fit a 16-bit length field")]
    PayloadTooLarge(usize),
    /// JSON serialization failed.
    #[error("failed to serialize payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ApnsBody<'a> {
    aps: ApnsAlert<'a>,
}

#[derive(Serialize)]
struct ApnsAlert<'a> {
    alert: &'a str,
    sound: &'a str,
}

#[derive(Serialize)]
struct GcmBody<'a> {
    registration_ids: [&'a str; 1],
    data: GcmData<'a>,
}

#[derive(Serialize)]
struct GcmData<'a> {
    message: &'a str,
    vibrate: u8,
    sound: u8,
}

/// Encode a request for its target platform.
pub fn encode(request: &NotificationRequest) -> Result<Vec<u8>, EncodeError> {
    match request.platform {
        Platform::Ios => encode_apns(&request.device_token, &request.message),
        Platform::Android => encode_gcm(&request.device_token, &request.message),
    }
}

/// Build a binary APNs notification frame.
///
/// ```text
/// [u8 0] [u16 BE 32] [32 raw token bytes] [u16 BE body len] [JSON body]
/// ```
///
/// The token must hex-decode to exactly 32 bytes; anything else is
/// rejected rather than truncated or padded.
pub fn encode_apns(device_token: &str, message: &str) -> Result<Vec<u8>, EncodeError> {
    let token = data_encoding::HEXLOWER_PERMISSIVE
        .decode(device_token.as_bytes())
        .map_err(|e| EncodeError::InvalidTokenHex(e.to_string()))?;
    if token.len() != APNS_TOKEN_LEN {
        return Err(EncodeError::TokenLength {
            expected: APNS_TOKEN_LEN,
            actual: token.len(),
        });
    }

    let body = serde_json::to_vec(&ApnsBody {
        aps: ApnsAlert {
            alert: message,
            sound: APNS_DEFAULT_SOUND,
        },
    })?;
    let body_len = u16::try_from(body.len()).map_err(|_e| EncodeError::PayloadTooLarge(body.len()))?;

    let mut frame = Vec::with_capacity(1 + 2 + APNS_TOKEN_LEN + 2 + body.len());
    frame.push(APNS_COMMAND_SIMPLE);
    frame.extend_from_slice(&(APNS_TOKEN_LEN as u16).to_be_bytes());
    frame.extend_from_slice(&token);
    frame.extend_from_slice(&body_len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Build a GCM JSON request body. No framing; the body goes out as-is.
pub fn encode_gcm(device_token: &str, message: &str) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(&GcmBody {
        registration_ids: [device_token],
        data: GcmData {
            message,
            vibrate: 1,
            sound: 1,
        },
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_HEX: &str = "ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789";

    /// Split a binary APNs frame into (command, token, body) checking both length fields.
    fn parse_apns_frame(frame: &[u8]) -> (u8, &[u8], &[u8]) {
        let token_len = u16::from_be_bytes([frame[1], frame[2]]) as usize;
        let token = &frame[3..3 + token_len];
        let rest = &frame[3 + token_len..];
        let body_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
        let body = &rest[2..];
        assert_eq!(body.len(), body_len, "declared body length must match");
        (frame[0], token, body)
    }

    #[test]
    fn test_apns_frame_layout() {
        let frame = encode_apns(TOKEN_HEX, "Hello world").unwrap();
        let (command, token, body) = parse_apns_frame(&frame);

        assert_eq!(command, 0);
        assert_eq!(token.len(), 32);
        assert_eq!(token[..3], [0xAB, 0xCD, 0xEF]);
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["aps"]["alert"], "Hello world");
        assert_eq!(json["aps"]["sound"], "default");
    }

    #[test]
    fn test_apns_body_is_compact_json() {
        let frame = encode_apns(TOKEN_HEX, "Hi").unwrap();
        let (_, _, body) = parse_apns_frame(&frame);
        assert_eq!(body, br#"{"aps":{"alert":"Hi","sound":"default"}}"#);
    }

    #[test]
    fn test_apns_lowercase_token_accepted() {
        let lower = TOKEN_HEX.to_ascii_lowercase();
        assert_eq!(
            encode_apns(&lower, "x").unwrap(),
            encode_apns(TOKEN_HEX, "x").unwrap()
        );
    }

    #[test]
    fn test_apns_short_token_rejected() {
        let err = encode_apns("abcdef", "Hello").unwrap_err();
        assert!(matches!(
            err,
            EncodeError::TokenLength { expected: 32, actual: 3 }
        ));
    }

    #[test]
    fn test_apns_long_token_rejected() {
        let token = "ab".repeat(33);
        let err = encode_apns(&token, "Hello").unwrap_err();
        assert!(matches!(err, EncodeError::TokenLength { actual: 33, .. }));
    }

    #[test]
    fn test_apns_non_hex_token_rejected() {
        let token = "zz".repeat(32);
        assert!(matches!(
            encode_apns(&token, "Hello"),
            Err(EncodeError::InvalidTokenHex(_))
        ));
        // Odd length is not hex either
        assert!(matches!(
            encode_apns("abc", "Hello"),
            Err(EncodeError::InvalidTokenHex(_))
        ));
    }

    #[test]
    fn test_apns_oversized_message_rejected() {
        let message = "x".repeat(70_000);
        assert!(matches!(
            encode_apns(TOKEN_HEX, &message),
            Err(EncodeError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_gcm_body_shape() {
        let body = encode_gcm("sometoken", "Hi").unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains(r#""registration_ids":["sometoken"]"#));
        assert!(text.contains(r#""message":"Hi""#));

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["data"]["vibrate"], 1);
        assert_eq!(json["data"]["sound"], 1);
    }

    #[test]
    fn test_gcm_escapes_message() {
        let body = encode_gcm("tok", "say \"hi\"").unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["message"], "say \"hi\"");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        for platform in [Platform::Ios, Platform::Android] {
            let request = NotificationRequest {
                platform,
                device_token: TOKEN_HEX.to_string(),
                message: "same every time".to_string(),
            };
            assert_eq!(encode(&request).unwrap(), encode(&request).unwrap());
        }
    }

    #[test]
    fn test_encode_routes_by_platform() {
        let request = NotificationRequest {
            platform: Platform::Android,
            device_token: "not-hex-but-fine-for-gcm".to_string(),
            message: "Hi".to_string(),
        };
        assert!(encode(&request).is_ok());

        let request = NotificationRequest {
            platform: Platform::Ios,
            ..request
        };
        assert!(encode(&request).is_err());
    }
}
