//! Channel Communication Protocol Types
//!
//! This module defines the typed communication protocol between the
//! presentation layer, the orchestrator task, and the peer-connection
//! service. All inter-task communication flows through these message types.
//!
//! Handlers are attached per session: the runtime creates one set of channels
//! when it starts and tears them all down when it stops, so no subscription
//! outlives the session that created it.

use serde::{Deserialize, Serialize};

use crate::config::ChannelConfig;
use crate::errors::{ChannelError, ErrorKind};
use crate::redemption::RedemptionEvent;
use crate::session::ConnectionPhase;
use crate::types::{PlaybackStatus, ReconnectSnapshot, TimerSnapshot};

// ----------------------------------------------------------------------------
// Command: Presentation → Orchestrator
// ----------------------------------------------------------------------------

/// Commands sent from the presentation layer to the orchestrator task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Initiate a connection to a peer address
    Connect { address: String },
    /// Confirm the pending pairing challenge on this side
    ConfirmPairing,
    /// Tear down the current connection (or abandon the current attempt)
    Disconnect,
    /// Enable or disable auto-reconnect
    ToggleAutoConnect { enabled: bool },
    /// Set the address auto-reconnect should target
    SetAutoConnectAddress { address: String },
    /// Suspend the retry loop without clearing its state
    PauseReconnect,
    /// Resume a previously paused retry loop
    ResumeReconnect,
    /// Signal that the operator is editing the address field; reconnect must
    /// not fire while this is active
    OverrideManualEntry { active: bool },
    /// Stop current playback, if any
    StopPlayback,
    /// Replay the last decoded audio payload
    ReplayLastAudio,
    /// Cancel one countdown timer
    CancelTimer { id: u64 },
    /// Request a full status snapshot
    GetStatus,
    /// Shut the orchestrator down gracefully
    Shutdown,
}

// ----------------------------------------------------------------------------
// PeerEvent: Peer-Connection Service → Orchestrator
// ----------------------------------------------------------------------------

/// Notifications from the peer-connection service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PeerEvent {
    /// Free-form handshake progress text
    StatusUpdate { text: String },
    /// The peer requires pairing confirmation; carries the challenge code
    PairingRequired { code: String },
    /// The secure channel is established
    ConnectSuccess { text: String },
    /// The peer connected at the session level (same meaning as success)
    PeerConnected,
    /// The peer disconnected gracefully
    PeerDisconnected { reason: String },
    /// The service reported an error for the current attempt or session
    Error { message: String },
    /// An application payload arrived from the peer
    RedemptionReceived { payload: serde_json::Value },
}

// ----------------------------------------------------------------------------
// Effect: Orchestrator → Peer-Connection Service
// ----------------------------------------------------------------------------

/// Instructions toward the peer-connection service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Effect {
    /// Open a connection attempt to the given address
    Connect { address: String },
    /// Confirm the pending pairing challenge
    ConfirmPairing,
    /// Best-effort notice to the peer that we are about to disconnect
    NotifyPeerDisconnecting { reason: String },
    /// Tear the connection down
    Disconnect,
}

// ----------------------------------------------------------------------------
// AppEvent: Orchestrator → Presentation
// ----------------------------------------------------------------------------

/// Events surfaced to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Connection phase changed
    PhaseChanged {
        phase: ConnectionPhase,
        /// Challenge code; present only while `phase` is `Pairing`
        pairing_challenge: Option<String>,
        /// Human-readable detail accompanying the change
        detail: Option<String>,
    },
    /// Reconnect engine state changed
    ReconnectStateChanged { snapshot: ReconnectSnapshot },
    /// A redemption arrived and was decoded
    RedemptionReceived { event: RedemptionEvent },
    /// The countdown timer set changed (registered, cancelled, ticked,
    /// or expired)
    TimersUpdated {
        timers: Vec<TimerSnapshot>,
        expired: Vec<TimerSnapshot>,
    },
    /// Playback started, stopped, or finished
    PlaybackStateChanged { status: PlaybackStatus },
    /// A recoverable error was reported and survived
    SystemError { kind: ErrorKind, message: String },
    /// Answer to `Command::GetStatus`
    StatusReport {
        phase: ConnectionPhase,
        target_address: Option<String>,
        reconnect: ReconnectSnapshot,
        playback: PlaybackStatus,
        timers: Vec<TimerSnapshot>,
        /// Most recent decoded redemption, audio payload stripped
        latest_redemption: Option<RedemptionEvent>,
    },
}

// ----------------------------------------------------------------------------
// Channel Type Aliases
// ----------------------------------------------------------------------------

pub type CommandSender = tokio::sync::mpsc::Sender<Command>;
pub type CommandReceiver = tokio::sync::mpsc::Receiver<Command>;
pub type PeerEventSender = tokio::sync::mpsc::Sender<PeerEvent>;
pub type PeerEventReceiver = tokio::sync::mpsc::Receiver<PeerEvent>;
pub type EffectSender = tokio::sync::mpsc::Sender<Effect>;
pub type EffectReceiver = tokio::sync::mpsc::Receiver<Effect>;
pub type AppEventSender = tokio::sync::mpsc::Sender<AppEvent>;
pub type AppEventReceiver = tokio::sync::mpsc::Receiver<AppEvent>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded command channel (presentation → orchestrator)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    tokio::sync::mpsc::channel(config.command_buffer_size)
}

/// Create bounded peer event channel (peer service → orchestrator)
pub fn create_peer_event_channel(config: &ChannelConfig) -> (PeerEventSender, PeerEventReceiver) {
    tokio::sync::mpsc::channel(config.peer_event_buffer_size)
}

/// Create bounded effect channel (orchestrator → peer service)
pub fn create_effect_channel(config: &ChannelConfig) -> (EffectSender, EffectReceiver) {
    tokio::sync::mpsc::channel(config.effect_buffer_size)
}

/// Create bounded app event channel (orchestrator → presentation)
pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    tokio::sync::mpsc::channel(config.app_event_buffer_size)
}

// ----------------------------------------------------------------------------
// Non-blocking Send Utilities
// ----------------------------------------------------------------------------

/// Non-blocking send for presentation-side callers that must never stall
pub trait NonBlockingSend<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
}

impl NonBlockingSend<Command> for CommandSender {
    fn try_send_non_blocking(&self, command: Command) -> Result<(), ChannelError> {
        self.try_send(command).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::Full,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

impl NonBlockingSend<AppEvent> for AppEventSender {
    fn try_send_non_blocking(&self, event: AppEvent) -> Result<(), ChannelError> {
        self.try_send(event).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::Full,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
