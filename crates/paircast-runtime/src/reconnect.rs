//! Auto-reconnect engine
//!
//! Owns the retry ladder for the connection loop: exponential backoff with
//! jitter between attempts, a per-attempt watchdog, and the short grace delay
//! used after a graceful peer disconnect. The engine never performs I/O and
//! never arms an OS timer itself; the orchestrator reads the deadlines out of
//! it and sleeps on them inside its select loop, so there is at most one
//! pending retry and one watchdog at any time.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use paircast_core::config::ReconnectConfig;
use paircast_core::types::ReconnectSnapshot;

/// Next-attempt delay on the exponential ladder, before jitter.
///
/// Attempt numbering starts at 1; the delay doubles per failed attempt and
/// is capped at `max`.
pub fn backoff_base(attempt: u32, base: Duration, max: Duration) -> Duration {
    let attempt = attempt.max(1);
    // Saturate instead of overflowing for absurd attempt counts
    let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
    let delay = base
        .as_millis()
        .saturating_mul(factor as u128)
        .min(max.as_millis());
    Duration::from_millis(delay as u64)
}

/// Reconnect loop state
#[derive(Debug)]
pub struct ReconnectEngine {
    config: ReconnectConfig,
    /// Auto-reconnect toggle from settings
    enabled: bool,
    /// Operator temporarily suspended the loop
    paused: bool,
    /// Operator is editing the address field; never fire while active
    manual_override: bool,
    /// Address the loop targets
    target: Option<String>,
    /// Consecutive failed attempts since the loop (re)started
    attempt_count: u32,
    /// When the next attempt should fire, if one is scheduled
    retry_deadline: Option<Instant>,
    /// When the current in-flight attempt is declared dead
    watchdog_deadline: Option<Instant>,
    attempt_in_flight: bool,
    last_error: Option<String>,
}

impl ReconnectEngine {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            enabled: false,
            paused: false,
            manual_override: false,
            target: None,
            attempt_count: 0,
            retry_deadline: None,
            watchdog_deadline: None,
            attempt_in_flight: false,
            last_error: None,
        }
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.stop("auto-connect disabled");
        }
    }

    pub fn set_target(&mut self, address: Option<String>) {
        self.target = address;
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn set_manual_override(&mut self, active: bool) {
        self.manual_override = active;
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// An attempt is leaving the station: arm the watchdog and count it on
    /// the ladder. Called for engine-fired retries.
    pub fn begin_attempt(&mut self, now: Instant) {
        self.attempt_count += 1;
        self.attempt_in_flight = true;
        self.retry_deadline = None;
        self.watchdog_deadline = Some(now + self.config.attempt_timeout);
        debug!(attempt = self.attempt_count, "reconnect attempt started");
    }

    /// A manual connect restarts the ladder from attempt 1 but still gets
    /// the watchdog.
    pub fn begin_manual_attempt(&mut self, now: Instant) {
        self.attempt_count = 0;
        self.begin_attempt(now);
    }

    /// The current attempt failed; schedule the next one on the ladder.
    /// When auto-reconnect is disabled the failure is only recorded.
    pub fn schedule_next(&mut self, now: Instant, error: &str) {
        self.attempt_in_flight = false;
        self.watchdog_deadline = None;
        self.last_error = Some(error.to_string());
        if !self.enabled {
            self.retry_deadline = None;
            return;
        }
        let delay = self.next_delay();
        self.retry_deadline = Some(now + delay);
        info!(
            attempt = self.attempt_count,
            delay_ms = delay.as_millis() as u64,
            error,
            "reconnect scheduled"
        );
    }

    /// The peer tore the session down cleanly. A clean teardown is not a
    /// failed attempt: the ladder resets and the loop re-arms after the
    /// short grace delay.
    pub fn schedule_grace(&mut self, now: Instant, reason: &str) {
        self.attempt_in_flight = false;
        self.watchdog_deadline = None;
        self.attempt_count = 0;
        self.last_error = None;
        if !self.enabled {
            self.retry_deadline = None;
            return;
        }
        self.retry_deadline = Some(now + self.config.grace_delay);
        info!(reason, "reconnect re-armed after graceful disconnect");
    }

    /// Connection established: the loop goes idle and the ladder resets.
    pub fn on_success(&mut self) {
        self.stop("connected");
        self.attempt_count = 0;
        self.last_error = None;
    }

    /// Fire an attempt as soon as possible: loop start, or settings changed
    /// while disconnected. A no-op while disabled or mid-attempt.
    pub fn kick(&mut self, now: Instant) {
        if self.enabled && !self.attempt_in_flight {
            self.retry_deadline = Some(now);
        }
    }

    /// Cancel any pending retry and watchdog. Safe to call repeatedly.
    pub fn stop(&mut self, reason: &str) {
        if self.retry_deadline.is_some() || self.watchdog_deadline.is_some() || self.attempt_in_flight
        {
            debug!(reason, "reconnect loop stopped");
        }
        self.retry_deadline = None;
        self.watchdog_deadline = None;
        self.attempt_in_flight = false;
    }

    /// Record that a retry fired with no target to aim at. The loop goes
    /// idle rather than spinning.
    pub fn fail_no_target(&mut self) {
        self.abort_attempt("no target address available for reconnect");
    }

    /// The attempt was rejected before it could even start (invalid target).
    /// Clears the in-flight state and idles the loop: invalid input is never
    /// retried automatically.
    pub fn abort_attempt(&mut self, error: &str) {
        self.retry_deadline = None;
        self.attempt_in_flight = false;
        self.watchdog_deadline = None;
        self.last_error = Some(error.to_string());
    }

    // ------------------------------------------------------------------
    // Deadlines
    // ------------------------------------------------------------------

    /// Deadline the orchestrator should sleep on for the next retry.
    /// Suppressed while paused or while the operator is editing the address.
    pub fn retry_deadline(&self) -> Option<Instant> {
        if self.paused || self.manual_override {
            return None;
        }
        self.retry_deadline
    }

    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.watchdog_deadline
    }

    /// The retry deadline fired: clear it so it cannot fire twice.
    pub fn take_due_retry(&mut self) {
        self.retry_deadline = None;
    }

    /// The watchdog fired: clear it and report the timeout duration.
    pub fn take_due_watchdog(&mut self) -> Duration {
        self.watchdog_deadline = None;
        self.config.attempt_timeout
    }

    pub fn attempt_in_flight(&self) -> bool {
        self.attempt_in_flight
    }

    /// True while the loop has a pending retry or an in-flight attempt
    pub fn loop_active(&self) -> bool {
        self.attempt_in_flight || self.retry_deadline.is_some()
    }

    pub fn snapshot(&self, now: Instant) -> ReconnectSnapshot {
        ReconnectSnapshot {
            enabled: self.enabled,
            loop_active: self.loop_active(),
            attempt_count: self.attempt_count,
            next_retry_delay: self
                .retry_deadline
                .map(|d| d.saturating_duration_since(now)),
            last_error: self.last_error.clone(),
        }
    }

    fn next_delay(&self) -> Duration {
        let base = backoff_base(
            self.attempt_count,
            self.config.base_delay,
            self.config.max_delay,
        );
        base + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let window = self.config.jitter_window.as_millis() as u64;
        if window == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random::<u64>() % window)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
