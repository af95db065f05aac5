//! Redemption payload decoding
//!
//! Redemptions arrive from the peer as JSON carrying a title, spoken text,
//! an inline audio payload, and optionally a countdown duration. The audio
//! field is either a raw byte array or a base64 string depending on the
//! sender version; both are accepted. Likewise the timer marker appears as a
//! numeric `message_type` (0 = plain, 1 = with timer) or as a tagged `type`
//! string, and both spellings decode to the same [`RedemptionEvent`].

use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DecodeError;

// ----------------------------------------------------------------------------
// Decoded Event
// ----------------------------------------------------------------------------

/// Container format of an inline audio payload, inferred from magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// Sniff the container from the payload's leading bytes. Senders store
    /// MP3 by default, so that is the fallback for unrecognized data.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() >= 4 && &bytes[..4] == b"RIFF" {
            return AudioFormat::Wav;
        }
        if bytes.len() >= 4 && &bytes[..4] == b"OggS" {
            return AudioFormat::Ogg;
        }
        if bytes.len() >= 3 && &bytes[..3] == b"ID3" {
            return AudioFormat::Mp3;
        }
        // Raw MPEG frame sync: 11 set bits
        if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0 {
            return AudioFormat::Mp3;
        }
        AudioFormat::Mp3
    }
}

/// A fully decoded redemption, ready for playback and timer registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedemptionEvent {
    /// Locally generated correlation id
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub audio: Vec<u8>,
    pub format: AudioFormat,
    /// Countdown duration; present iff the redemption carries a timer
    pub timer_duration_secs: Option<u32>,
    /// Redeeming user, when the sender includes one
    pub source_user: Option<String>,
}

// ----------------------------------------------------------------------------
// Wire Format
// ----------------------------------------------------------------------------

/// Audio payload as it appears on the wire
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireAudio {
    Bytes(Vec<u8>),
    Base64(String),
}

/// Timer marker as it appears on the wire
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireKind {
    Numeric(u8),
    Tagged(String),
}

#[derive(Debug, Deserialize)]
struct WireRedemption {
    audio: Option<WireAudio>,
    title: Option<String>,
    content: Option<String>,
    #[serde(alias = "type")]
    message_type: Option<WireKind>,
    time: Option<u32>,
    #[serde(alias = "user")]
    source_user: Option<String>,
}

/// Decode one redemption payload.
///
/// `max_audio_bytes` bounds the decoded audio size; oversized payloads are
/// rejected before any allocation-heavy work.
pub fn decode_redemption(
    payload: &serde_json::Value,
    max_audio_bytes: usize,
) -> Result<RedemptionEvent, DecodeError> {
    if !payload.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    let wire: WireRedemption = serde_json::from_value(payload.clone())
        .map_err(|_| DecodeError::NotAnObject)?;

    let title = wire.title.ok_or(DecodeError::MissingField { field: "title" })?;
    let content = wire
        .content
        .ok_or(DecodeError::MissingField { field: "content" })?;

    let audio = match wire.audio {
        None => return Err(DecodeError::MissingField { field: "audio" }),
        Some(WireAudio::Bytes(bytes)) => bytes,
        Some(WireAudio::Base64(text)) => base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map_err(|e| DecodeError::InvalidBase64 {
                reason: e.to_string(),
            })?,
    };
    if audio.len() > max_audio_bytes {
        return Err(DecodeError::PayloadTooLarge {
            size: audio.len(),
            max: max_audio_bytes,
        });
    }

    let with_timer = match wire.message_type {
        None => return Err(DecodeError::MissingField { field: "message_type" }),
        Some(WireKind::Numeric(n)) => n == 1,
        Some(WireKind::Tagged(tag)) => tag == "redemption-with-timer",
    };

    let timer_duration_secs = if with_timer {
        match wire.time {
            None => return Err(DecodeError::MissingTimerDuration),
            Some(0) => return Err(DecodeError::ZeroTimerDuration),
            Some(secs) => Some(secs),
        }
    } else {
        None
    };

    let format = AudioFormat::sniff(&audio);
    Ok(RedemptionEvent {
        id: Uuid::new_v4(),
        title,
        content,
        audio,
        format,
        timer_duration_secs,
        source_user: wire.source_user,
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
