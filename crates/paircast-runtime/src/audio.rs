//! Audio playback session
//!
//! Playback goes through the `AudioSink` seam so the engine never touches a
//! device directly; frontends plug in their platform sink and tests use
//! [`NullSink`]. The session enforces the single-playback rule: starting a
//! new payload always stops the current one first, and the last decoded
//! payload is retained so a replay never re-decodes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use paircast_core::errors::PlaybackError;
use paircast_core::redemption::AudioFormat;
use paircast_core::types::PlaybackStatus;

/// A decoded audio payload ready for a sink
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub bytes: Arc<[u8]>,
    pub format: AudioFormat,
}

/// Platform audio output seam.
///
/// `Send + Sync` because the orchestrator future borrows the session across
/// await points while it runs on the multi-threaded runtime.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Start playing the payload from the beginning, replacing anything the
    /// sink is currently emitting.
    async fn play(&mut self, audio: &DecodedAudio) -> Result<(), PlaybackError>;

    /// Stop emitting. Must be safe to call when nothing is playing.
    async fn stop(&mut self);

    /// Whether the sink has run out of the payload it was given
    fn is_finished(&self) -> bool;
}

/// Sink that swallows audio; playback "finishes" on the next poll
#[derive(Debug, Default)]
pub struct NullSink {
    playing: bool,
}

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&mut self, _audio: &DecodedAudio) -> Result<(), PlaybackError> {
        self.playing = true;
        Ok(())
    }

    async fn stop(&mut self) {
        self.playing = false;
    }

    fn is_finished(&self) -> bool {
        // No device to drain, so the payload is "done" immediately
        true
    }
}

/// At most one active playback, with replay of the last decoded payload
pub struct PlaybackSession {
    sink: Box<dyn AudioSink>,
    last: Option<DecodedAudio>,
    is_loading: bool,
    is_playing: bool,
}

impl PlaybackSession {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            last: None,
            is_loading: false,
            is_playing: false,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            is_loading: self.is_loading,
            is_playing: self.is_playing,
        }
    }

    /// Play a freshly decoded payload, interrupting any current playback.
    /// The payload is retained for replay whether or not the sink accepts it.
    pub async fn play(&mut self, bytes: Vec<u8>, format: AudioFormat) -> Result<(), PlaybackError> {
        if bytes.is_empty() {
            return Err(PlaybackError::EmptyPayload);
        }
        let audio = DecodedAudio {
            bytes: bytes.into(),
            format,
        };
        self.last = Some(audio.clone());
        self.start(&audio).await
    }

    /// Replay the last decoded payload from the beginning
    pub async fn replay(&mut self) -> Result<(), PlaybackError> {
        let audio = self.last.clone().ok_or(PlaybackError::NothingToReplay)?;
        debug!(format = ?audio.format, bytes = audio.bytes.len(), "replaying last payload");
        self.start(&audio).await
    }

    /// Stop playback. A no-op when nothing is playing.
    pub async fn stop(&mut self) {
        if self.is_playing || self.is_loading {
            self.sink.stop().await;
            self.is_playing = false;
            self.is_loading = false;
        }
    }

    /// Poll the sink for natural completion. Returns true when playback just
    /// transitioned from playing to stopped.
    pub fn poll_finished(&mut self) -> bool {
        if self.is_playing && self.sink.is_finished() {
            self.is_playing = false;
            true
        } else {
            false
        }
    }

    async fn start(&mut self, audio: &DecodedAudio) -> Result<(), PlaybackError> {
        self.stop().await;
        self.is_loading = true;
        let result = self.sink.play(audio).await;
        self.is_loading = false;
        match result {
            Ok(()) => {
                self.is_playing = true;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "sink rejected payload");
                self.is_playing = false;
                Err(e)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
