//! Interactive session driver
//!
//! Wires the runtime together and runs a line-oriented loop: operator
//! commands in on stdin, app events printed as they arrive. This is a thin
//! demonstration surface; the engine does all the work.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use paircast_core::channel::{AppEvent, Command};
use paircast_runtime::{NullSink, PaircastRuntime};

use crate::config::CliAppConfig;
use crate::connector::IpcPeerConnector;
use crate::store::JsonPreferenceStore;

pub struct PaircastApp {
    runtime: PaircastRuntime,
}

impl PaircastApp {
    pub fn start(config: CliAppConfig) -> anyhow::Result<Self> {
        let prefs = JsonPreferenceStore::open(&config.data_dir())
            .context("failed to open preference store")?;
        let connector = IpcPeerConnector::new(config.cli.service_addr.clone());
        // No audio device layer here; payloads are decoded and tracked but
        // discarded by the null sink
        let runtime = PaircastRuntime::start(
            config.core,
            Box::new(prefs),
            Box::new(NullSink::default()),
            Box::new(connector),
        )?;
        Ok(Self { runtime })
    }

    /// Run until the operator quits or the engine stops
    pub async fn run_interactive(mut self, initial_address: Option<String>) -> anyhow::Result<()> {
        let commands = self.runtime.command_sender();
        let mut app_events = self
            .runtime
            .take_app_event_receiver()
            .context("app event stream already taken")?;

        if let Some(address) = initial_address {
            commands.send(Command::Connect { address }).await?;
        }

        println!("paircast ready; type `help` for commands");
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                event = app_events.recv() => match event {
                    Some(event) => print_event(&event),
                    None => break,
                },
                line = stdin.next_line() => match line? {
                    Some(line) => {
                        if !self.dispatch(&commands, line.trim()).await? {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        self.runtime.stop().await?;
        Ok(())
    }

    /// Returns false when the operator asked to quit
    async fn dispatch(
        &self,
        commands: &paircast_core::channel::CommandSender,
        line: &str,
    ) -> anyhow::Result<bool> {
        let mut parts = line.splitn(2, ' ');
        let verb = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        let command = match verb {
            "" => return Ok(true),
            "help" => {
                print_help();
                return Ok(true);
            }
            "quit" | "exit" => {
                commands.send(Command::Shutdown).await?;
                return Ok(false);
            }
            "connect" => Command::Connect {
                address: rest.to_string(),
            },
            "confirm" => Command::ConfirmPairing,
            "disconnect" => Command::Disconnect,
            "auto" => Command::ToggleAutoConnect {
                enabled: rest == "on",
            },
            "target" => Command::SetAutoConnectAddress {
                address: rest.to_string(),
            },
            "pause" => Command::PauseReconnect,
            "resume" => Command::ResumeReconnect,
            "manual" => Command::OverrideManualEntry {
                active: rest == "on",
            },
            "replay" => Command::ReplayLastAudio,
            "stop-audio" => Command::StopPlayback,
            "cancel" => match rest.parse::<u64>() {
                Ok(id) => Command::CancelTimer { id },
                Err(_) => {
                    println!("usage: cancel <timer-id>");
                    return Ok(true);
                }
            },
            "status" => Command::GetStatus,
            other => {
                println!("unknown command `{other}`; type `help`");
                return Ok(true);
            }
        };
        commands.send(command).await?;
        Ok(true)
    }
}

fn print_help() {
    println!(
        "commands:\n  \
         connect <addr>     connect to a peer\n  \
         confirm            confirm the pending pairing challenge\n  \
         disconnect         tear down the connection\n  \
         auto on|off        toggle auto-reconnect\n  \
         target <addr>      set the auto-reconnect address\n  \
         pause | resume     suspend / resume the retry loop\n  \
         manual on|off      mark the address field as being edited\n  \
         replay             replay the last audio payload\n  \
         stop-audio         stop playback\n  \
         cancel <id>        cancel a countdown timer\n  \
         status             print a status snapshot\n  \
         quit               exit"
    );
}

fn print_event(event: &AppEvent) {
    match event {
        AppEvent::PhaseChanged {
            phase,
            pairing_challenge,
            detail,
        } => {
            match pairing_challenge {
                Some(code) => println!("[phase] {} (pairing code: {code})", phase.name()),
                None => println!("[phase] {}", phase.name()),
            }
            if let Some(detail) = detail {
                println!("        {detail}");
            }
        }
        AppEvent::ReconnectStateChanged { snapshot } => {
            if snapshot.loop_active {
                println!(
                    "[reconnect] attempt {} active, next retry in {:?}",
                    snapshot.attempt_count, snapshot.next_retry_delay
                );
            } else if let Some(error) = &snapshot.last_error {
                println!("[reconnect] idle ({error})");
            }
        }
        AppEvent::RedemptionReceived { event } => {
            println!("[redemption] {}: {}", event.title, event.content);
        }
        AppEvent::TimersUpdated { timers, expired } => {
            for timer in expired {
                println!("[timer] '{}' finished", timer.title);
            }
            for timer in timers {
                println!("[timer] #{} '{}' {}s left", timer.id, timer.title, timer.remaining_secs);
            }
        }
        AppEvent::PlaybackStateChanged { status } => {
            if status.is_playing {
                println!("[audio] playing");
            } else {
                println!("[audio] stopped");
            }
        }
        AppEvent::SystemError { kind, message } => {
            println!("[error] {kind:?}: {message}");
        }
        AppEvent::StatusReport {
            phase,
            target_address,
            reconnect,
            playback,
            timers,
            latest_redemption,
        } => {
            println!(
                "[status] phase={} target={} auto={} attempts={} playing={} timers={}",
                phase.name(),
                target_address.as_deref().unwrap_or("-"),
                reconnect.enabled,
                reconnect.attempt_count,
                playback.is_playing,
                timers.len()
            );
            if let Some(event) = latest_redemption {
                println!("         last redemption: {} ({})", event.title, event.id);
            }
        }
    }
}
