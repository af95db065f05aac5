//! Configuration for the Paircast session orchestrator
//!
//! Consolidates every tunable in one place: channel buffer sizes, reconnect
//! timing, and playback limits. `PaircastConfig::default()` is the production
//! preset; `testing()` shrinks every delay so paused-clock tests run fast.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PaircastError, PaircastResult};

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the typed channels between presentation, orchestrator,
/// and the peer-connection service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    /// Commands from the presentation layer
    pub command_buffer_size: usize,
    /// Notifications from the peer-connection service
    pub peer_event_buffer_size: usize,
    /// Effects toward the peer-connection service
    pub effect_buffer_size: usize,
    /// App events toward the presentation layer
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            peer_event_buffer_size: 128,
            effect_buffer_size: 64,
            app_event_buffer_size: 64,
        }
    }
}

impl ChannelConfig {
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 8,
            peer_event_buffer_size: 16,
            effect_buffer_size: 8,
            app_event_buffer_size: 16,
        }
    }

    pub fn validate(&self) -> PaircastResult<()> {
        if self.command_buffer_size == 0
            || self.peer_event_buffer_size == 0
            || self.effect_buffer_size == 0
            || self.app_event_buffer_size == 0
        {
            return Err(PaircastError::Configuration {
                reason: "channel buffer sizes must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Reconnect Configuration
// ----------------------------------------------------------------------------

/// Timing for the auto-reconnect engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry; doubles on each subsequent failure
    pub base_delay: Duration,
    /// Ceiling for the exponential ladder
    pub max_delay: Duration,
    /// Upper bound (exclusive) for the uniform jitter added to each delay
    pub jitter_window: Duration,
    /// Watchdog: an attempt with no terminal notification within this window
    /// is treated as failed
    pub attempt_timeout: Duration,
    /// Delay before re-arming after a graceful peer disconnect; bypasses the
    /// backoff ladder
    pub grace_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter_window: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(15),
            grace_delay: Duration::from_secs(3),
        }
    }
}

impl ReconnectConfig {
    pub fn testing() -> Self {
        Self {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(400),
            jitter_window: Duration::from_millis(10),
            attempt_timeout: Duration::from_millis(500),
            grace_delay: Duration::from_millis(30),
        }
    }

    pub fn validate(&self) -> PaircastResult<()> {
        if self.base_delay.is_zero() {
            return Err(PaircastError::Configuration {
                reason: "reconnect base_delay must be non-zero".to_string(),
            });
        }
        if self.max_delay < self.base_delay {
            return Err(PaircastError::Configuration {
                reason: "reconnect max_delay must be >= base_delay".to_string(),
            });
        }
        if self.attempt_timeout.is_zero() {
            return Err(PaircastError::Configuration {
                reason: "reconnect attempt_timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Playback Configuration
// ----------------------------------------------------------------------------

/// Limits for inbound audio payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    /// Maximum accepted decoded audio payload in bytes
    pub max_payload_bytes: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            // 16 MiB covers multi-minute MP3s comfortably
            max_payload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl PlaybackConfig {
    pub fn testing() -> Self {
        Self {
            max_payload_bytes: 64 * 1024,
        }
    }

    pub fn validate(&self) -> PaircastResult<()> {
        if self.max_payload_bytes == 0 {
            return Err(PaircastError::Configuration {
                reason: "playback max_payload_bytes must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Master Configuration
// ----------------------------------------------------------------------------

/// Master configuration consolidating all subsystem settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaircastConfig {
    pub channels: ChannelConfig,
    pub reconnect: ReconnectConfig,
    pub playback: PlaybackConfig,
}

impl PaircastConfig {
    /// Preset with short delays and small buffers for tests
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig::testing(),
            reconnect: ReconnectConfig::testing(),
            playback: PlaybackConfig::testing(),
        }
    }

    pub fn validate(&self) -> PaircastResult<()> {
        self.channels.validate()?;
        self.reconnect.validate()?;
        self.playback.validate()?;
        Ok(())
    }
}
