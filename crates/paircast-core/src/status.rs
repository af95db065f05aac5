//! Status text classification
//!
//! The peer-connection service reports handshake progress as free-form text.
//! All substring matching against that vocabulary lives in this one function;
//! the session reducer only ever sees the closed `PhaseHint` set. When the
//! backend vocabulary grows, this is the single place to amend.

use serde::{Deserialize, Serialize};

/// Closed set of meanings extracted from raw status text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseHint {
    /// Handshake is progressing; advance `Connecting → Pairing`
    HandshakeProgress,
    /// The secure channel is up; advance to `Connected`
    ChannelEstablished,
    /// The connection was torn down
    ConnectionClosed,
    /// Unrecognized text; log and ignore
    Unknown,
}

/// Phrases the peer service emits while the handshake is still in flight
const HANDSHAKE_PROGRESS_PHRASES: &[&str] = &[
    "New peer",
    "Known peer found",
    "Challenge received",
    "Challenge sent",
    "DH key received",
    "Authentication successful",
    "Creating session keys",
    "Completing session key setup",
    "Peer confirmed pairing",
];

/// Phrases announcing an established secure channel
const CHANNEL_ESTABLISHED_PHRASES: &[&str] = &[
    "Secure encrypted channel established",
    "Session keys established",
    "Session encryption keys established",
];

const CONNECTION_CLOSED_PHRASES: &[&str] = &["Connection closed"];

/// Translate one raw status line into a `PhaseHint`.
///
/// Established beats progress: some success lines also contain progress
/// vocabulary, so the established list is checked first.
pub fn classify_status(text: &str) -> PhaseHint {
    if CHANNEL_ESTABLISHED_PHRASES.iter().any(|p| text.contains(p)) {
        return PhaseHint::ChannelEstablished;
    }
    if CONNECTION_CLOSED_PHRASES.iter().any(|p| text.contains(p)) {
        return PhaseHint::ConnectionClosed;
    }
    if HANDSHAKE_PROGRESS_PHRASES.iter().any(|p| text.contains(p)) {
        return PhaseHint::HandshakeProgress;
    }
    PhaseHint::Unknown
}
