//! `t.me` start links that open an entity's timetable.
//!
//! The payload is the entity name, base64url-encoded without padding so that
//! Cyrillic names fit Telegram's `start` parameter alphabet.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tracing::warn;

/// Longest `start` parameter Telegram accepts.
pub const MAX_START_PARAMETER: usize = 64;

const PAYLOAD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes a payload for a `start` parameter.
#[must_use]
pub fn encode_payload(payload: &str) -> String {
    PAYLOAD.encode(payload.as_bytes())
}

/// Reverses [`encode_payload`]. Returns `None` for anything that is not a
/// base64url-encoded UTF-8 string.
#[must_use]
pub fn decode_payload(encoded: &str) -> Option<String> {
    let bytes = PAYLOAD.decode(encoded.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Builds `https://t.me/<bot>?start=<payload>`.
#[must_use]
pub fn start_link(bot_username: &str, payload: &str) -> String {
    let encoded = encode_payload(payload);
    if encoded.len() > MAX_START_PARAMETER {
        warn!(
            "Start payload for '{}' is {} chars, Telegram may ignore it",
            payload,
            encoded.len()
        );
    }
    format!("https://t.me/{bot_username}?start={encoded}")
}
