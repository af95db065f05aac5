//! Paircast runtime
//!
//! Wires the channels together, spawns the orchestrator task, and hosts the
//! `PeerConnector` seam toward whatever actually speaks to the peer service
//! (the CLI bridges over a local socket; tests use scripted stubs).

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use paircast_core::channel::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_peer_event_channel, AppEventReceiver, Command, CommandSender, EffectReceiver,
    PeerEventSender,
};
use paircast_core::config::PaircastConfig;
use paircast_core::errors::PaircastResult;
use paircast_core::prefs::PreferenceStore;

use crate::audio::AudioSink;
use crate::orchestrator::OrchestratorTask;

/// Seam toward the peer-connection service.
///
/// Implementations receive effects from the orchestrator and feed peer
/// notifications back; `run` owns the I/O loop and returns when the effect
/// channel closes.
#[async_trait]
pub trait PeerConnector: Send + 'static {
    fn attach_channels(&mut self, effects: EffectReceiver, events: PeerEventSender);
    async fn run(&mut self) -> PaircastResult<()>;
}

/// Handle to a running Paircast session
pub struct PaircastRuntime {
    command_sender: CommandSender,
    app_event_receiver: Option<AppEventReceiver>,
    orchestrator_handle: Option<JoinHandle<PaircastResult<()>>>,
    connector_handle: Option<JoinHandle<PaircastResult<()>>>,
}

impl PaircastRuntime {
    /// Validate the config, build the channel fabric, and spawn the
    /// orchestrator plus the connector.
    pub fn start(
        config: PaircastConfig,
        prefs: Box<dyn PreferenceStore>,
        sink: Box<dyn AudioSink>,
        mut connector: Box<dyn PeerConnector>,
    ) -> PaircastResult<Self> {
        config.validate()?;

        let (command_sender, command_receiver) = create_command_channel(&config.channels);
        let (peer_event_sender, peer_event_receiver) =
            create_peer_event_channel(&config.channels);
        let (effect_sender, effect_receiver) = create_effect_channel(&config.channels);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(&config.channels);

        connector.attach_channels(effect_receiver, peer_event_sender);

        let mut orchestrator = OrchestratorTask::new(
            config,
            command_receiver,
            peer_event_receiver,
            effect_sender,
            app_event_sender,
            prefs,
            sink,
        );

        let orchestrator_handle = tokio::spawn(async move { orchestrator.run().await });
        let connector_handle = tokio::spawn(async move {
            let result = connector.run().await;
            if let Err(ref e) = result {
                warn!(error = %e, "peer connector exited with error");
            }
            result
        });

        info!("runtime started");
        Ok(Self {
            command_sender,
            app_event_receiver: Some(app_event_receiver),
            orchestrator_handle: Some(orchestrator_handle),
            connector_handle: Some(connector_handle),
        })
    }

    /// Sender for operator commands. Cheap to clone.
    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    /// The app event stream. Can only be taken once.
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    /// Graceful shutdown: ask the orchestrator to stop and wait for both
    /// tasks to unwind.
    pub async fn stop(mut self) -> PaircastResult<()> {
        let _ = self.command_sender.send(Command::Shutdown).await;
        let mut result = Ok(());
        if let Some(handle) = self.orchestrator_handle.take() {
            result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "orchestrator task panicked or was aborted");
                    Ok(())
                }
            };
        }
        // The connector unwinds once the effect channel closes
        if let Some(handle) = self.connector_handle.take() {
            handle.abort();
            let _ = handle.await;
        }
        info!("runtime stopped");
        result
    }
}

impl Drop for PaircastRuntime {
    fn drop(&mut self) {
        if let Some(handle) = &self.orchestrator_handle {
            handle.abort();
        }
        if let Some(handle) = &self.connector_handle {
            handle.abort();
        }
    }
}
