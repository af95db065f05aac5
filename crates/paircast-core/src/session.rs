//! Connection session state machine
//!
//! Pure reducer over the connection lifecycle. The orchestrator folds every
//! command and peer notification through [`SessionState::apply`]; the reducer
//! never performs I/O and never touches a clock. It returns the next state
//! plus the effects to execute and directives for the reconnect engine, so
//! every transition is testable with plain assertions.
//!
//! Phase graph:
//!
//! ```text
//! Disconnected → Connecting → Pairing → Connected
//!       ↑            |    \______↗|        |
//!       └────────────┴────────────┴────────┘
//! ```
//!
//! There is no `Disconnected → Connected` edge: an establishment notification
//! arriving while disconnected is rejected as an invalid transition.

use serde::{Deserialize, Serialize};

use crate::channel::Effect;
use crate::errors::CommandError;
use crate::status::PhaseHint;

// ----------------------------------------------------------------------------
// Phase
// ----------------------------------------------------------------------------

/// Lifecycle phase of the peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPhase {
    /// No connection and no attempt in flight
    Disconnected,
    /// An attempt is in flight, handshake not yet past authentication
    Connecting,
    /// Handshake advanced; pairing confirmation may be required
    Pairing,
    /// Secure channel established
    Connected,
}

impl Default for ConnectionPhase {
    fn default() -> Self {
        ConnectionPhase::Disconnected
    }
}

impl ConnectionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Pairing => "pairing",
            ConnectionPhase::Connected => "connected",
        }
    }

    /// True while an attempt is in flight but not yet established
    pub fn is_attempting(&self) -> bool {
        matches!(self, ConnectionPhase::Connecting | ConnectionPhase::Pairing)
    }
}

// ----------------------------------------------------------------------------
// Inputs
// ----------------------------------------------------------------------------

/// Everything the reducer can be fed: validated operator commands and
/// translated peer notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// Operator (or reconnect engine) asked to connect
    ConnectRequested { address: String },
    /// A status line arrived, already classified
    Status { hint: PhaseHint, raw: String },
    /// The peer requires pairing confirmation
    PairingRequired { code: String },
    /// Operator confirmed the pairing challenge on this side
    ConfirmPairing,
    /// The peer service reported the connection established
    ConnectSucceeded { detail: String },
    /// The current attempt or session failed
    Failed { error: String },
    /// The peer disconnected gracefully
    PeerDisconnected { reason: String },
    /// Operator asked to disconnect
    DisconnectRequested,
}

/// Instructions for the reconnect engine, produced alongside effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Cancel any pending retry and watchdog; the loop goes idle
    StopReconnect,
    /// A failure occurred; schedule the next attempt on the backoff ladder
    ScheduleRetry { error: String },
    /// A graceful teardown occurred; re-arm after the short grace delay
    /// with the attempt counter reset
    ScheduleGraceRetry { reason: String },
    /// Connection succeeded; persist the address to the recent-server list
    PersistAddress { address: String },
}

// ----------------------------------------------------------------------------
// State
// ----------------------------------------------------------------------------

/// Connection session state. Owned by the orchestrator, advanced only
/// through [`SessionState::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub phase: ConnectionPhase,
    /// Address of the current or most recent attempt
    pub target_address: Option<String>,
    /// Pairing challenge code; only populated while `phase` is `Pairing`
    pub pairing_challenge: Option<String>,
    /// Most recent failure, cleared when a connection establishes
    pub last_error: Option<String>,
}

/// Result of applying one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
    pub directives: Vec<Directive>,
}

impl Transition {
    fn noop(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: Vec::new(),
            directives: Vec::new(),
        }
    }
}

/// Reducer-level failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("invalid transition: cannot apply {input} while {phase}")]
    InvalidTransition {
        phase: &'static str,
        input: &'static str,
    },
}

impl SessionState {
    /// Apply one input, consuming the current state.
    ///
    /// Errors leave the session unchanged; the caller still holds the state
    /// it passed in conceptually, so it should clone before applying if it
    /// needs to keep the old value on failure.
    pub fn apply(self, input: SessionInput) -> Result<Transition, SessionError> {
        match input {
            SessionInput::ConnectRequested { address } => self.on_connect_requested(address),
            SessionInput::Status { hint, raw } => Ok(self.on_status(hint, raw)),
            SessionInput::PairingRequired { code } => Ok(self.on_pairing_required(code)),
            SessionInput::ConfirmPairing => self.on_confirm_pairing(),
            SessionInput::ConnectSucceeded { detail } => self.on_established(detail),
            SessionInput::Failed { error } => Ok(self.on_failed(error)),
            SessionInput::PeerDisconnected { reason } => Ok(self.on_peer_disconnected(reason)),
            SessionInput::DisconnectRequested => Ok(self.on_disconnect_requested()),
        }
    }

    fn on_connect_requested(mut self, address: String) -> Result<Transition, SessionError> {
        if address.trim().is_empty() {
            return Err(CommandError::BlankAddress.into());
        }
        match self.phase {
            ConnectionPhase::Connecting | ConnectionPhase::Pairing => {
                Err(CommandError::AttemptInFlight.into())
            }
            ConnectionPhase::Connected => Err(CommandError::AlreadyConnected.into()),
            ConnectionPhase::Disconnected => {
                self.phase = ConnectionPhase::Connecting;
                self.target_address = Some(address.clone());
                self.pairing_challenge = None;
                self.last_error = None;
                Ok(Transition {
                    new_state: self,
                    effects: vec![Effect::Connect { address }],
                    directives: Vec::new(),
                })
            }
        }
    }

    fn on_status(mut self, hint: PhaseHint, raw: String) -> Transition {
        match hint {
            PhaseHint::HandshakeProgress => {
                // Progress text only ever advances Connecting → Pairing.
                // Anywhere else it is informational.
                if self.phase == ConnectionPhase::Connecting {
                    self.phase = ConnectionPhase::Pairing;
                }
                Transition::noop(self)
            }
            PhaseHint::ChannelEstablished => {
                let unchanged = self.clone();
                match self.on_established(raw) {
                    Ok(transition) => transition,
                    // Stale success text while disconnected: ignore rather
                    // than conjure a connection out of nothing.
                    Err(_) => Transition::noop(unchanged),
                }
            }
            PhaseHint::ConnectionClosed => self.on_peer_disconnected(raw),
            PhaseHint::Unknown => Transition::noop(self),
        }
    }

    fn on_pairing_required(mut self, code: String) -> Transition {
        // The peer decides when pairing is required; this forces the phase
        // regardless of where the handshake appeared to be.
        self.phase = ConnectionPhase::Pairing;
        self.pairing_challenge = Some(code);
        Transition::noop(self)
    }

    fn on_confirm_pairing(self) -> Result<Transition, SessionError> {
        if self.phase != ConnectionPhase::Pairing || self.pairing_challenge.is_none() {
            return Err(CommandError::NoPendingChallenge.into());
        }
        // Confirmation is one side of a two-sided exchange: the phase only
        // advances when the peer service reports success.
        Ok(Transition {
            new_state: self,
            effects: vec![Effect::ConfirmPairing],
            directives: Vec::new(),
        })
    }

    fn on_established(mut self, _detail: String) -> Result<Transition, SessionError> {
        match self.phase {
            ConnectionPhase::Disconnected => Err(SessionError::InvalidTransition {
                phase: self.phase.name(),
                input: "connection established",
            }),
            ConnectionPhase::Connected => Ok(Transition::noop(self)),
            ConnectionPhase::Connecting | ConnectionPhase::Pairing => {
                self.phase = ConnectionPhase::Connected;
                self.pairing_challenge = None;
                self.last_error = None;
                let mut directives = vec![Directive::StopReconnect];
                if let Some(address) = self.target_address.clone() {
                    directives.push(Directive::PersistAddress { address });
                }
                Ok(Transition {
                    new_state: self,
                    effects: Vec::new(),
                    directives,
                })
            }
        }
    }

    fn on_failed(mut self, error: String) -> Transition {
        // A trailing error after we already tore down (explicit disconnect,
        // watchdog, or a lost bridge socket) must not re-arm the loop.
        if self.phase == ConnectionPhase::Disconnected {
            return Transition::noop(self);
        }
        self.phase = ConnectionPhase::Disconnected;
        self.pairing_challenge = None;
        self.last_error = Some(error.clone());
        Transition {
            new_state: self,
            effects: Vec::new(),
            directives: vec![Directive::ScheduleRetry { error }],
        }
    }

    fn on_peer_disconnected(mut self, reason: String) -> Transition {
        if self.phase == ConnectionPhase::Disconnected {
            return Transition::noop(self);
        }
        self.phase = ConnectionPhase::Disconnected;
        self.pairing_challenge = None;
        Transition {
            new_state: self,
            effects: Vec::new(),
            directives: vec![Directive::ScheduleGraceRetry { reason }],
        }
    }

    fn on_disconnect_requested(mut self) -> Transition {
        // Always honored locally, whatever the peer thinks.
        self.phase = ConnectionPhase::Disconnected;
        self.pairing_challenge = None;
        Transition {
            new_state: self,
            effects: vec![
                Effect::NotifyPeerDisconnecting {
                    reason: "user requested disconnect".to_string(),
                },
                Effect::Disconnect,
            ],
            directives: vec![Directive::StopReconnect],
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
