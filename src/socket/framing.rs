//! Line protocol codec for caller → relay requests.
//!
//! One plaintext frame per connection:
//!
//! ```text
//! <platform id><DELIM><device token><DELIM><message text><TERMINATOR>
//! ```
//!
//! With the default tokens a frame looks like `ios::<hex token>::Hello/ntf`.
//! The relay never answers a frame, whether it decodes or not.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{FRAME_DELIMITER, FRAME_TERMINATOR, PLATFORM_ID_ANDROID, PLATFORM_ID_IOS};

/// Push platform a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Apple push, delivered over the persistent APNs connection.
    Ios,
    /// Google push, delivered with one GCM HTTP call per request.
    Android,
}

/// A decoded inbound request. Consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    /// Target platform.
    pub platform: Platform,
    /// Device token as sent by the caller (hex text for iOS).
    pub device_token: String,
    /// Alert text.
    pub message: String,
}

/// Reasons an inbound chunk is dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Chunk is not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
    /// Delimiter or terminator missing.
    #[error("frame is missing its delimiter or terminator")]
    Incomplete,
    /// Wrong field count or an empty field.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
    /// Platform identifier is not one of the two configured ids.
    #[error("unknown platform identifier {0:?}")]
    UnknownPlatform(String),
}

/// Delimiter, terminator and platform ids used on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameCodec {
    /// Field separator.
    pub delimiter: String,
    /// End-of-frame marker.
    pub terminator: String,
    /// Identifier for [`Platform::Ios`].
    pub ios_id: String,
    /// Identifier for [`Platform::Android`].
    pub android_id: String,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            delimiter: FRAME_DELIMITER.to_string(),
            terminator: FRAME_TERMINATOR.to_string(),
            ios_id: PLATFORM_ID_IOS.to_string(),
            android_id: PLATFORM_ID_ANDROID.to_string(),
        }
    }
}

impl FrameCodec {
    /// Check that the tokens can actually frame a request.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.delimiter.is_empty() || self.terminator.is_empty() {
            anyhow::bail!("frame delimiter and terminator must be non-empty");
        }
        if self.ios_id.is_empty() || self.android_id.is_empty() {
            anyhow::bail!("platform identifiers must be non-empty");
        }
        if self.ios_id == self.android_id {
            anyhow::bail!("platform identifiers must differ (both are {:?})", self.ios_id);
        }
        if self.ios_id.contains(&self.delimiter) || self.android_id.contains(&self.delimiter) {
            anyhow::bail!("platform identifiers must not contain the delimiter");
        }
        Ok(())
    }

    /// Wire identifier for a platform.
    pub fn platform_id(&self, platform: Platform) -> &str {
        match platform {
            Platform::Ios => &self.ios_id,
            Platform::Android => &self.android_id,
        }
    }

    /// Resolve a wire identifier; `None` for anything unrecognized.
    pub fn platform_for(&self, id: &str) -> Option<Platform> {
        if id == self.ios_id {
            Some(Platform::Ios)
        } else if id == self.android_id {
            Some(Platform::Android)
        } else {
            None
        }
    }

    /// Whether `buf` holds a terminator, i.e. a full frame may be present.
    pub fn has_terminator(&self, buf: &[u8]) -> bool {
        let term = self.terminator.as_bytes();
        !term.is_empty() && buf.windows(term.len()).any(|w| w == term)
    }

    /// Build the wire bytes for a request.
    pub fn encode(&self, request: &NotificationRequest) -> Vec<u8> {
        format!(
            "{}{delim}{}{delim}{}{}",
            self.platform_id(request.platform),
            request.device_token,
            request.message,
            self.terminator,
            delim = self.delimiter,
        )
        .into_bytes()
    }

    /// Decode one received chunk.
    ///
    /// The chunk must contain both the delimiter and the terminator. It is
    /// cut at the last terminator (trailing bytes such as a newline are
    /// ignored) and split into exactly three fields; the message field may
    /// itself contain the delimiter.
    pub fn decode(&self, chunk: &[u8]) -> Result<NotificationRequest, FrameError> {
        let Ok(text) = std::str::from_utf8(chunk) else {
            return Err(FrameError::InvalidUtf8);
        };

        if !text.contains(self.delimiter.as_str()) {
            return Err(FrameError::Incomplete);
        }
        let Some(end) = text.rfind(self.terminator.as_str()) else {
            return Err(FrameError::Incomplete);
        };
        let body = &text[..end];

        let mut fields = body.splitn(3, self.delimiter.as_str());
        let (Some(id), Some(token), Some(message)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(FrameError::Malformed("expected three fields"));
        };

        let platform = self
            .platform_for(id)
            .ok_or_else(|| FrameError::UnknownPlatform(id.to_string()))?;

        if token.is_empty() {
            return Err(FrameError::Malformed("empty device token"));
        }
        if message.is_empty() {
            return Err(FrameError::Malformed("empty message"));
        }

        Ok(NotificationRequest {
            platform,
            device_token: token.to_string(),
            message: message.to_string(),
        })
    }
}
