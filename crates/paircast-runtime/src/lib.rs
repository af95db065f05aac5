//! Paircast Runtime Engine
//!
//! This crate contains the engine driving the Paircast session:
//! - `OrchestratorTask`: the single owner loop folding commands and peer
//!   notifications through the session reducer
//! - `ReconnectEngine`: exponential backoff, watchdog, grace delay
//! - `TimerRegistry`: shared-ticker countdown timers
//! - `PlaybackSession`: single-playback audio over the `AudioSink` seam
//! - `PaircastRuntime`: channel wiring and task lifecycle, plus the
//!   `PeerConnector` seam toward the peer-connection service
//!
//! `paircast-core` provides the stable API definitions; nothing here adds
//! new wire types.

pub mod audio;
pub mod orchestrator;
pub mod reconnect;
pub mod timers;
mod runtime;

pub use audio::{AudioSink, DecodedAudio, NullSink, PlaybackSession};
pub use orchestrator::OrchestratorTask;
pub use reconnect::ReconnectEngine;
pub use runtime::{PaircastRuntime, PeerConnector};
pub use timers::TimerRegistry;

// Re-export core types for convenience
pub use paircast_core::{
    channel::{
        create_app_event_channel, create_command_channel, create_effect_channel,
        create_peer_event_channel, AppEvent, AppEventReceiver, AppEventSender, Command,
        CommandReceiver, CommandSender, Effect, EffectReceiver, EffectSender, NonBlockingSend,
        PeerEvent, PeerEventReceiver, PeerEventSender,
    },
    ConnectionPhase, PaircastConfig, PaircastError, PaircastResult,
};
