//! Countdown timer registry
//!
//! Redemptions may carry a countdown duration; each one becomes an entry
//! here. All entries share the orchestrator's single 1-second ticker instead
//! of owning their own clocks, so one `tick()` advances everything.
//!
//! Ids come from a monotonic counter and are never reused, even after a
//! timer is cancelled, so a stale cancel from the presentation layer can
//! never hit a newer timer.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use paircast_core::types::TimerSnapshot;

#[derive(Debug, Clone)]
struct TimerEntry {
    title: String,
    content: String,
    source_user: Option<String>,
    total_secs: u32,
    remaining_secs: u32,
    started_at_epoch_ms: u64,
}

impl TimerEntry {
    fn snapshot(&self, id: u64) -> TimerSnapshot {
        TimerSnapshot {
            id,
            title: self.title.clone(),
            content: self.content.clone(),
            source_user: self.source_user.clone(),
            total_secs: self.total_secs,
            remaining_secs: self.remaining_secs,
            started_at_epoch_ms: self.started_at_epoch_ms,
        }
    }
}

/// Active countdown timers, keyed by id in registration order
#[derive(Debug, Default)]
pub struct TimerRegistry {
    next_id: u64,
    entries: BTreeMap<u64, TimerEntry>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a countdown carrying the redemption metadata it came from.
    /// `duration_secs` must be positive; the decoder rejects zero-duration
    /// timers before they reach the registry.
    pub fn register(
        &mut self,
        title: &str,
        content: &str,
        source_user: Option<&str>,
        duration_secs: u32,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(
            id,
            TimerEntry {
                title: title.to_string(),
                content: content.to_string(),
                source_user: source_user.map(str::to_string),
                total_secs: duration_secs,
                remaining_secs: duration_secs,
                started_at_epoch_ms: epoch_ms(),
            },
        );
        id
    }

    /// Cancel a timer. Unknown ids (already expired, already cancelled, or
    /// never issued) are ignored; returns whether an entry was removed.
    pub fn cancel(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Advance every timer by one second. Entries that reach zero on this
    /// tick are removed and returned; nothing ever reports a negative
    /// remaining time.
    pub fn tick(&mut self) -> Vec<TimerSnapshot> {
        let mut expired = Vec::new();
        self.entries.retain(|&id, entry| {
            entry.remaining_secs = entry.remaining_secs.saturating_sub(1);
            if entry.remaining_secs == 0 {
                expired.push(entry.snapshot(id));
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn snapshots(&self) -> Vec<TimerSnapshot> {
        self.entries
            .iter()
            .map(|(&id, entry)| entry.snapshot(id))
            .collect()
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
