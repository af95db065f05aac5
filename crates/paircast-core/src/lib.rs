//! Paircast Core
//!
//! Stable API definitions for the Paircast session orchestrator: the typed
//! channel protocol between presentation, orchestrator, and the
//! peer-connection service, the pure connection session reducer, status-text
//! classification, redemption payload decoding, the error taxonomy,
//! configuration, and the preference-store seam.
//!
//! `paircast-runtime` provides the engine that drives these types; this crate
//! stays free of tasks and I/O so every piece is unit-testable in isolation.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod prefs;
pub mod redemption;
pub mod session;
pub mod status;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{AppEvent, Command, Effect, PeerEvent};
pub use config::{ChannelConfig, PaircastConfig, PlaybackConfig, ReconnectConfig};
pub use errors::{ErrorKind, PaircastError, PaircastResult};
pub use prefs::{AutoConnectConfig, PreferenceStore};
pub use redemption::{AudioFormat, RedemptionEvent};
pub use session::{ConnectionPhase, SessionInput, SessionState};
pub use status::{classify_status, PhaseHint};
pub use types::{PlaybackStatus, ReconnectSnapshot, TimerSnapshot};
