//! Error types for the Paircast orchestrator
//!
//! This module contains all error types used throughout the Paircast core,
//! including command validation errors, redemption decode errors, playback
//! errors, and the main PaircastError type that unifies them all.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Synchronous validation failures for operator commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("address must not be blank")]
    BlankAddress,
    #[error("a connection attempt is already in flight")]
    AttemptInFlight,
    #[error("already connected")]
    AlreadyConnected,
    #[error("no pairing challenge is pending confirmation")]
    NoPendingChallenge,
    #[error("no target address available for reconnect")]
    NoTargetAddress,
}

/// Failures while decoding an inbound redemption payload
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    #[error("redemption payload is not a JSON object")]
    NotAnObject,
    #[error("redemption payload is missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("redemption audio is not valid base64: {reason}")]
    InvalidBase64 { reason: String },
    #[error("redemption declares a timer but carries no duration")]
    MissingTimerDuration,
    #[error("timer duration must be positive")]
    ZeroTimerDuration,
    #[error("audio payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Failures local to the audio playback session
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlaybackError {
    #[error("audio resource unavailable: {reason}")]
    ResourceUnavailable { reason: String },
    #[error("audio payload is empty")]
    EmptyPayload,
    #[error("nothing to replay")]
    NothingToReplay,
}

/// Channel delivery failures between tasks
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("channel buffer is full")]
    Full,
    #[error("channel is closed")]
    Closed,
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Top-level error for the Paircast session orchestrator
#[derive(Debug, Clone, thiserror::Error)]
pub enum PaircastError {
    /// Rejected synchronously, never retried automatically
    #[error("invalid input: {0}")]
    InvalidInput(#[from] CommandError),
    /// The connect command itself failed before any notification arrived
    #[error("connect command failed: {reason}")]
    ConnectCommand { reason: String },
    /// The peer-connection service reported a handshake failure
    #[error("handshake error: {reason}")]
    Handshake { reason: String },
    /// The per-attempt watchdog expired before a terminal notification
    #[error("connection attempt timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("redemption decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("playback failed: {0}")]
    Playback(#[from] PlaybackError),
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },
}

/// Coarse error category surfaced to the presentation layer alongside the
/// human-readable message
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    ConnectCommand,
    Handshake,
    Timeout,
    Decode,
    Playback,
    Channel,
    Configuration,
}

impl PaircastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaircastError::InvalidInput(_) => ErrorKind::InvalidInput,
            PaircastError::ConnectCommand { .. } => ErrorKind::ConnectCommand,
            PaircastError::Handshake { .. } => ErrorKind::Handshake,
            PaircastError::Timeout { .. } => ErrorKind::Timeout,
            PaircastError::Decode(_) => ErrorKind::Decode,
            PaircastError::Playback(_) => ErrorKind::Playback,
            PaircastError::Channel(_) => ErrorKind::Channel,
            PaircastError::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Errors that should shut the orchestrator down rather than be reported
    /// and survived
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PaircastError::Channel(_) | PaircastError::Configuration { .. }
        )
    }
}

/// Convenience result type used throughout Paircast
pub type PaircastResult<T> = Result<T, PaircastError>;
