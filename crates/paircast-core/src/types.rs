//! Shared snapshot types surfaced to the presentation layer

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Point-in-time view of the auto-reconnect engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSnapshot {
    /// Whether auto-reconnect is enabled at all
    pub enabled: bool,
    /// Whether the retry loop currently has a pending or in-flight attempt
    pub loop_active: bool,
    /// Consecutive failed attempts since the loop (re)started
    pub attempt_count: u32,
    /// Delay until the next scheduled attempt, if one is pending
    pub next_retry_delay: Option<Duration>,
    /// Last reported failure, cleared on success
    pub last_error: Option<String>,
}

/// Point-in-time view of one countdown timer, carrying the redemption
/// metadata it was registered from so the presentation layer can render it
/// without a separate lookup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub source_user: Option<String>,
    pub total_secs: u32,
    pub remaining_secs: u32,
    /// Registration time, milliseconds since the Unix epoch
    pub started_at_epoch_ms: u64,
}

/// Point-in-time view of the playback session
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub is_loading: bool,
    pub is_playing: bool,
}
