//! Orchestrator task
//!
//! The single logical owner of all session state. Every command from the
//! presentation layer and every notification from the peer-connection
//! service flows through one `tokio::select!` loop; the loop folds them
//! through the pure session reducer, executes the resulting effects, and
//! drives the reconnect engine, timer registry, and playback session. No
//! other task mutates any of this state, so there are no locks and no
//! mutable captures.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use paircast_core::channel::{
    AppEvent, AppEventSender, Command, CommandReceiver, Effect, EffectSender, PeerEvent,
    PeerEventReceiver,
};
use paircast_core::config::PaircastConfig;
use paircast_core::errors::{ChannelError, CommandError, PaircastError, PaircastResult};
use paircast_core::prefs::{push_recent, AutoConnectConfig, PreferenceStore};
use paircast_core::redemption::{decode_redemption, RedemptionEvent};
use paircast_core::session::{ConnectionPhase, Directive, SessionError, SessionInput, SessionState};
use paircast_core::status::{classify_status, PhaseHint};
use paircast_core::types::TimerSnapshot;

use crate::audio::{AudioSink, PlaybackSession};
use crate::reconnect::ReconnectEngine;
use crate::timers::TimerRegistry;

/// Shared cadence for countdown timers and playback-completion polling
const TICK_PERIOD: Duration = Duration::from_secs(1);

// ----------------------------------------------------------------------------
// Orchestrator Task
// ----------------------------------------------------------------------------

pub struct OrchestratorTask {
    config: PaircastConfig,
    session: SessionState,
    reconnect: ReconnectEngine,
    timers: TimerRegistry,
    playback: PlaybackSession,
    /// Most recent decoded redemption, audio stripped; surfaced in status
    /// reports so late-attaching frontends can render it
    latest_redemption: Option<RedemptionEvent>,
    prefs: Box<dyn PreferenceStore>,
    command_receiver: CommandReceiver,
    peer_event_receiver: PeerEventReceiver,
    effect_sender: EffectSender,
    app_event_sender: AppEventSender,
    running: bool,
}

impl OrchestratorTask {
    pub fn new(
        config: PaircastConfig,
        command_receiver: CommandReceiver,
        peer_event_receiver: PeerEventReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
        prefs: Box<dyn PreferenceStore>,
        sink: Box<dyn AudioSink>,
    ) -> Self {
        let reconnect = ReconnectEngine::new(config.reconnect.clone());
        Self {
            config,
            session: SessionState::default(),
            reconnect,
            timers: TimerRegistry::new(),
            playback: PlaybackSession::new(sink),
            latest_redemption: None,
            prefs,
            command_receiver,
            peer_event_receiver,
            effect_sender,
            app_event_sender,
            running: true,
        }
    }

    /// Run the orchestrator loop until shutdown or an unrecoverable error
    pub async fn run(&mut self) -> PaircastResult<()> {
        info!("orchestrator starting");

        // Restore auto-connect settings. Enabled always kicks the loop:
        // target resolution (configured address, then recent list, then the
        // no-target failure) happens when the retry fires.
        let auto = self.prefs.auto_connect();
        self.reconnect.set_enabled(auto.enabled);
        self.reconnect.set_target(auto.address);
        if auto.enabled {
            self.reconnect.kick(Instant::now());
        }

        let mut ticker = tokio::time::interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick_was_needed = false;

        while self.running {
            let retry_deadline = self.reconnect.retry_deadline();
            let watchdog_deadline = self.reconnect.watchdog_deadline();
            let tick_needed =
                !self.timers.is_empty() || self.playback.status().is_playing;
            // The interval accumulates an overdue tick while nothing needs
            // it; fire a full period after the first timer registers, not
            // immediately
            if tick_needed && !tick_was_needed {
                ticker.reset();
            }
            tick_was_needed = tick_needed;

            let step = tokio::select! {
                command = self.command_receiver.recv() => match command {
                    Some(command) => self.process_command(command).await,
                    None => {
                        info!("command channel closed, shutting down");
                        break;
                    }
                },

                event = self.peer_event_receiver.recv() => match event {
                    Some(event) => self.process_peer_event(event).await,
                    None => {
                        info!("peer event channel closed, shutting down");
                        break;
                    }
                },

                _ = tokio::time::sleep_until(retry_deadline.unwrap_or_else(Instant::now)),
                        if retry_deadline.is_some() => {
                    self.on_retry_due().await
                }

                _ = tokio::time::sleep_until(watchdog_deadline.unwrap_or_else(Instant::now)),
                        if watchdog_deadline.is_some() => {
                    self.on_watchdog_fired().await
                }

                _ = ticker.tick(), if tick_needed => {
                    self.on_tick().await
                }
            };

            if let Err(e) = step {
                if e.is_fatal() {
                    error!(error = %e, "unrecoverable error, shutting down orchestrator");
                    return Err(e);
                }
                warn!(error = %e, "recoverable error");
                self.report_error(&e).await?;
            }
        }

        info!("orchestrator stopped");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn process_command(&mut self, command: Command) -> PaircastResult<()> {
        debug!(?command, "processing command");
        match command {
            Command::Connect { address } => self.handle_connect(address).await,
            Command::ConfirmPairing => self.apply_session(SessionInput::ConfirmPairing).await,
            Command::Disconnect => self.apply_session(SessionInput::DisconnectRequested).await,
            Command::ToggleAutoConnect { enabled } => {
                self.reconnect.set_enabled(enabled);
                let mut auto = self.prefs.auto_connect();
                auto.enabled = enabled;
                self.prefs.set_auto_connect(auto);
                if enabled && self.session.phase == ConnectionPhase::Disconnected {
                    self.reconnect.kick(Instant::now());
                }
                self.emit_reconnect_state().await
            }
            Command::SetAutoConnectAddress { address } => {
                let trimmed = address.trim().to_string();
                if trimmed.is_empty() {
                    return Err(CommandError::BlankAddress.into());
                }
                self.reconnect.set_target(Some(trimmed.clone()));
                let mut auto = self.prefs.auto_connect();
                auto.address = Some(trimmed);
                self.prefs.set_auto_connect(auto);
                self.emit_reconnect_state().await
            }
            Command::PauseReconnect => {
                self.reconnect.pause();
                self.emit_reconnect_state().await
            }
            Command::ResumeReconnect => {
                self.reconnect.resume();
                self.emit_reconnect_state().await
            }
            Command::OverrideManualEntry { active } => {
                self.reconnect.set_manual_override(active);
                self.emit_reconnect_state().await
            }
            Command::StopPlayback => {
                self.playback.stop().await;
                self.emit_playback_state().await
            }
            Command::ReplayLastAudio => {
                self.playback.replay().await.map_err(PaircastError::from)?;
                self.emit_playback_state().await
            }
            Command::CancelTimer { id } => {
                if self.timers.cancel(id) {
                    self.emit_timers(Vec::new()).await?;
                }
                Ok(())
            }
            Command::GetStatus => self.emit_status_report().await,
            Command::Shutdown => {
                info!("shutdown requested");
                self.playback.stop().await;
                self.reconnect.stop("shutdown");
                self.running = false;
                Ok(())
            }
        }
    }

    async fn handle_connect(&mut self, address: String) -> PaircastResult<()> {
        let trimmed = address.trim().to_string();
        self.apply_session(SessionInput::ConnectRequested {
            address: trimmed.clone(),
        })
        .await?;
        // Only reached when the reducer accepted the request
        if self.session.phase == ConnectionPhase::Connecting {
            self.reconnect.set_target(Some(trimmed));
            self.reconnect.begin_manual_attempt(Instant::now());
            self.emit_reconnect_state().await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Peer events
    // ------------------------------------------------------------------

    async fn process_peer_event(&mut self, event: PeerEvent) -> PaircastResult<()> {
        match event {
            PeerEvent::StatusUpdate { text } => {
                let hint = classify_status(&text);
                if hint == PhaseHint::Unknown {
                    debug!(%text, "unrecognized status text, ignoring");
                    return Ok(());
                }
                self.apply_session(SessionInput::Status { hint, raw: text }).await
            }
            PeerEvent::PairingRequired { code } => {
                self.apply_session(SessionInput::PairingRequired { code }).await
            }
            PeerEvent::ConnectSuccess { text } => {
                self.apply_session(SessionInput::ConnectSucceeded { detail: text }).await
            }
            PeerEvent::PeerConnected => {
                self.apply_session(SessionInput::ConnectSucceeded {
                    detail: "peer connected".to_string(),
                })
                .await
            }
            PeerEvent::PeerDisconnected { reason } => {
                self.apply_session(SessionInput::PeerDisconnected { reason }).await
            }
            PeerEvent::Error { message } => {
                self.apply_session(SessionInput::Failed { error: message }).await
            }
            PeerEvent::RedemptionReceived { payload } => self.handle_redemption(&payload).await,
        }
    }

    async fn handle_redemption(&mut self, payload: &serde_json::Value) -> PaircastResult<()> {
        let event = decode_redemption(payload, self.config.playback.max_payload_bytes)
            .map_err(PaircastError::from)?;
        info!(
            id = %event.id,
            title = %event.title,
            timer_secs = event.timer_duration_secs,
            "redemption received"
        );

        if let Some(secs) = event.timer_duration_secs {
            self.timers.register(
                &event.title,
                &event.content,
                event.source_user.as_deref(),
                secs,
            );
            self.emit_timers(Vec::new()).await?;
        }

        // Listeners get the metadata; the payload stays here
        let stripped = RedemptionEvent {
            audio: Vec::new(),
            ..event.clone()
        };
        self.latest_redemption = Some(stripped.clone());
        self.emit(AppEvent::RedemptionReceived { event: stripped }).await?;

        match self.playback.play(event.audio, event.format).await {
            Ok(()) => self.emit_playback_state().await,
            Err(e) => {
                // Playback trouble must not disturb the connection or timers
                self.report_error(&e.into()).await
            }
        }
    }

    // ------------------------------------------------------------------
    // Deadlines and ticks
    // ------------------------------------------------------------------

    async fn on_retry_due(&mut self) -> PaircastResult<()> {
        self.reconnect.take_due_retry();
        if self.session.phase != ConnectionPhase::Disconnected {
            // A connection raced ahead of the timer; nothing to do
            self.reconnect.stop("session no longer disconnected");
            return Ok(());
        }
        let target = self
            .reconnect
            .target()
            .map(str::to_string)
            .or_else(|| self.prefs.auto_connect().address)
            .or_else(|| self.prefs.recent_servers().first().cloned());
        match target {
            None => {
                warn!("reconnect fired with no target address");
                self.reconnect.fail_no_target();
                self.emit_reconnect_state().await
            }
            Some(address) => {
                self.reconnect.begin_attempt(Instant::now());
                if let Err(e) = self.apply_session(SessionInput::ConnectRequested { address }).await
                {
                    // The reducer rejected the target outright (blank address
                    // from a stale preference); retrying the same input would
                    // loop forever, so idle instead
                    self.reconnect.abort_attempt(&e.to_string());
                    self.emit_reconnect_state().await?;
                    return Err(e);
                }
                self.emit_reconnect_state().await
            }
        }
    }

    async fn on_watchdog_fired(&mut self) -> PaircastResult<()> {
        let timeout = self.reconnect.take_due_watchdog();
        let seconds = timeout.as_secs();
        warn!(seconds, "connection attempt watchdog fired");
        self.report_error(&PaircastError::Timeout { seconds }).await?;
        self.apply_session(SessionInput::Failed {
            error: format!("connection attempt timed out after {seconds}s"),
        })
        .await
    }

    async fn on_tick(&mut self) -> PaircastResult<()> {
        if !self.timers.is_empty() {
            let expired = self.timers.tick();
            self.emit_timers(expired).await?;
        }
        if self.playback.poll_finished() {
            self.emit_playback_state().await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session reducer plumbing
    // ------------------------------------------------------------------

    async fn apply_session(&mut self, input: SessionInput) -> PaircastResult<()> {
        let prev_phase = self.session.phase;
        let transition = match self.session.clone().apply(input) {
            Ok(transition) => transition,
            Err(SessionError::Command(e)) => {
                return Err(PaircastError::InvalidInput(e));
            }
            Err(e @ SessionError::InvalidTransition { .. }) => {
                // State is untouched; record the rejected edge and move on
                warn!(error = %e, phase = self.session.phase.name(), "rejected transition");
                return Ok(());
            }
        };
        self.session = transition.new_state;

        for effect in transition.effects {
            self.send_effect(effect).await?;
        }
        for directive in transition.directives {
            self.apply_directive(directive).await?;
        }

        if self.session.phase != prev_phase {
            info!(
                from = prev_phase.name(),
                to = self.session.phase.name(),
                "phase changed"
            );
            self.emit(AppEvent::PhaseChanged {
                phase: self.session.phase,
                pairing_challenge: self.session.pairing_challenge.clone(),
                detail: self.session.last_error.clone(),
            })
            .await?;
        }
        Ok(())
    }

    async fn apply_directive(&mut self, directive: Directive) -> PaircastResult<()> {
        let now = Instant::now();
        match directive {
            Directive::StopReconnect => {
                if self.session.phase == ConnectionPhase::Connected {
                    self.reconnect.on_success();
                } else {
                    self.reconnect.stop("disconnect requested");
                }
                self.emit_reconnect_state().await
            }
            Directive::ScheduleRetry { error } => {
                self.reconnect.schedule_next(now, &error);
                self.emit_reconnect_state().await
            }
            Directive::ScheduleGraceRetry { reason } => {
                self.reconnect.schedule_grace(now, &reason);
                self.emit_reconnect_state().await
            }
            Directive::PersistAddress { address } => {
                let mut recent = self.prefs.recent_servers();
                if push_recent(&mut recent, &address) {
                    self.prefs.set_recent_servers(recent);
                }
                let auto = self.prefs.auto_connect();
                if auto.address.is_none() {
                    self.prefs.set_auto_connect(AutoConnectConfig {
                        address: Some(address),
                        ..auto
                    });
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Emission helpers
    // ------------------------------------------------------------------

    async fn send_effect(&self, effect: Effect) -> PaircastResult<()> {
        self.effect_sender
            .send(effect)
            .await
            .map_err(|_| PaircastError::Channel(ChannelError::Closed))
    }

    async fn emit(&self, event: AppEvent) -> PaircastResult<()> {
        self.app_event_sender
            .send(event)
            .await
            .map_err(|_| PaircastError::Channel(ChannelError::Closed))
    }

    async fn report_error(&self, error: &PaircastError) -> PaircastResult<()> {
        self.emit(AppEvent::SystemError {
            kind: error.kind(),
            message: error.to_string(),
        })
        .await
    }

    async fn emit_reconnect_state(&self) -> PaircastResult<()> {
        self.emit(AppEvent::ReconnectStateChanged {
            snapshot: self.reconnect.snapshot(Instant::now()),
        })
        .await
    }

    async fn emit_playback_state(&self) -> PaircastResult<()> {
        self.emit(AppEvent::PlaybackStateChanged {
            status: self.playback.status(),
        })
        .await
    }

    async fn emit_timers(&self, expired: Vec<TimerSnapshot>) -> PaircastResult<()> {
        self.emit(AppEvent::TimersUpdated {
            timers: self.timers.snapshots(),
            expired,
        })
        .await
    }

    async fn emit_status_report(&self) -> PaircastResult<()> {
        self.emit(AppEvent::StatusReport {
            phase: self.session.phase,
            target_address: self.session.target_address.clone(),
            reconnect: self.reconnect.snapshot(Instant::now()),
            playback: self.playback.status(),
            timers: self.timers.snapshots(),
            latest_redemption: self.latest_redemption.clone(),
        })
        .await
    }
}
