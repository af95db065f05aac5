//! Peer-connection service bridge
//!
//! The handshake and transport live in a separate local service; this
//! connector bridges the orchestrator's effects and the service's
//! notifications over a newline-delimited JSON TCP socket. A lost socket is
//! reported as a session error and redialed, so the reconnect engine sees it
//! like any other failure.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use paircast_core::channel::{EffectReceiver, PeerEvent, PeerEventSender};
use paircast_core::errors::{ChannelError, PaircastError, PaircastResult};
use paircast_runtime::PeerConnector;

const REDIAL_DELAY: std::time::Duration = std::time::Duration::from_secs(2);

pub struct IpcPeerConnector {
    service_addr: String,
    effects: Option<EffectReceiver>,
    events: Option<PeerEventSender>,
}

impl IpcPeerConnector {
    pub fn new(service_addr: String) -> Self {
        Self {
            service_addr,
            effects: None,
            events: None,
        }
    }
}

#[async_trait]
impl PeerConnector for IpcPeerConnector {
    fn attach_channels(&mut self, effects: EffectReceiver, events: PeerEventSender) {
        self.effects = Some(effects);
        self.events = Some(events);
    }

    async fn run(&mut self) -> PaircastResult<()> {
        let mut effects = self
            .effects
            .take()
            .ok_or(PaircastError::Channel(ChannelError::Closed))?;
        let events = self
            .events
            .take()
            .ok_or(PaircastError::Channel(ChannelError::Closed))?;

        loop {
            let stream = match TcpStream::connect(&self.service_addr).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(addr = %self.service_addr, error = %e, "peer service unreachable");
                    if events
                        .send(PeerEvent::Error {
                            message: format!("peer service unreachable: {e}"),
                        })
                        .await
                        .is_err()
                    {
                        return Ok(());
                    }
                    // Drain effects while down so the orchestrator never blocks
                    tokio::select! {
                        _ = tokio::time::sleep(REDIAL_DELAY) => {}
                        effect = effects.recv() => match effect {
                            None => return Ok(()),
                            Some(effect) => debug!(?effect, "dropping effect, service down"),
                        }
                    }
                    continue;
                }
            };
            info!(addr = %self.service_addr, "connected to peer service");
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            loop {
                tokio::select! {
                    effect = effects.recv() => match effect {
                        None => return Ok(()),
                        Some(effect) => {
                            let mut line = match serde_json::to_string(&effect) {
                                Ok(line) => line,
                                Err(e) => {
                                    warn!(error = %e, "unencodable effect, dropping");
                                    continue;
                                }
                            };
                            line.push('\n');
                            if write_half.write_all(line.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    },

                    line = lines.next_line() => match line {
                        Ok(Some(line)) => match serde_json::from_str::<PeerEvent>(&line) {
                            Ok(event) => {
                                if events.send(event).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Err(e) => warn!(error = %e, %line, "malformed peer event, skipping"),
                        },
                        // EOF or socket error: redial
                        _ => break,
                    }
                }
            }

            if events
                .send(PeerEvent::Error {
                    message: "peer service connection lost".to_string(),
                })
                .await
                .is_err()
            {
                return Ok(());
            }
        }
    }
}
