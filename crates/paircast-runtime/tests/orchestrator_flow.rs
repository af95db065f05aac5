//! End-to-end orchestrator tests
//!
//! These drive the orchestrator through its real channels with scripted peer
//! notifications, the in-memory preference store, and the null audio sink.
//! The clock starts paused so backoff and watchdog waits complete instantly.

use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use paircast_core::channel::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_peer_event_channel, AppEvent, AppEventReceiver, Command, CommandSender, Effect,
    EffectReceiver, PeerEvent, PeerEventSender,
};
use paircast_core::config::PaircastConfig;
use paircast_core::errors::{ErrorKind, PaircastResult};
use paircast_core::prefs::{AutoConnectConfig, MemoryPreferenceStore, PreferenceStore};
use paircast_core::session::ConnectionPhase;
use paircast_runtime::audio::NullSink;
use paircast_runtime::orchestrator::OrchestratorTask;

const WAIT: Duration = Duration::from_secs(10);

struct Harness {
    commands: CommandSender,
    peer_events: PeerEventSender,
    effects: EffectReceiver,
    app_events: AppEventReceiver,
    _task: JoinHandle<PaircastResult<()>>,
}

fn spawn_orchestrator() -> Harness {
    spawn_orchestrator_with_prefs(MemoryPreferenceStore::default())
}

/// Spawn against a pre-seeded store, as if settings survived from an
/// earlier session
fn spawn_orchestrator_with_prefs(prefs: MemoryPreferenceStore) -> Harness {
    let config = PaircastConfig::testing();
    let (commands, command_rx) = create_command_channel(&config.channels);
    let (peer_events, peer_event_rx) = create_peer_event_channel(&config.channels);
    let (effect_tx, effects) = create_effect_channel(&config.channels);
    let (app_event_tx, app_events) = create_app_event_channel(&config.channels);

    let mut task = OrchestratorTask::new(
        config,
        command_rx,
        peer_event_rx,
        effect_tx,
        app_event_tx,
        Box::new(prefs),
        Box::new(NullSink::default()),
    );
    // Spawning onto the runtime requires the orchestrator future to be Send,
    // exactly as the real runtime does it
    let handle = tokio::spawn(async move { task.run().await });

    Harness {
        commands,
        peer_events,
        effects,
        app_events,
        _task: handle,
    }
}

async fn next_effect(effects: &mut EffectReceiver) -> Effect {
    timeout(WAIT, effects.recv())
        .await
        .expect("timed out waiting for effect")
        .expect("effect channel closed")
}

async fn next_app_event(app_events: &mut AppEventReceiver) -> AppEvent {
    timeout(WAIT, app_events.recv())
        .await
        .expect("timed out waiting for app event")
        .expect("app event channel closed")
}

/// Skip to the next phase change, ignoring interleaved snapshots
async fn next_phase(app_events: &mut AppEventReceiver) -> (ConnectionPhase, Option<String>) {
    loop {
        if let AppEvent::PhaseChanged {
            phase,
            pairing_challenge,
            ..
        } = next_app_event(app_events).await
        {
            return (phase, pairing_challenge);
        }
    }
}

async fn connect(harness: &mut Harness, address: &str) {
    harness
        .commands
        .send(Command::Connect {
            address: address.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(
        next_effect(&mut harness.effects).await,
        Effect::Connect {
            address: address.to_string()
        }
    );
    let (phase, _) = next_phase(&mut harness.app_events).await;
    assert_eq!(phase, ConnectionPhase::Connecting);
}

async fn establish(harness: &mut Harness, address: &str) {
    connect(harness, address).await;
    harness
        .peer_events
        .send(PeerEvent::ConnectSuccess {
            text: "Secure encrypted channel established!".to_string(),
        })
        .await
        .unwrap();
    let (phase, _) = next_phase(&mut harness.app_events).await;
    assert_eq!(phase, ConnectionPhase::Connected);
}

// ----------------------------------------------------------------------------
// Connection lifecycle
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn happy_path_walks_all_phases() {
    let mut h = spawn_orchestrator();
    connect(&mut h, "peer.local:7400").await;

    h.peer_events
        .send(PeerEvent::StatusUpdate {
            text: "Known peer found! Sending challenge...".to_string(),
        })
        .await
        .unwrap();
    let (phase, challenge) = next_phase(&mut h.app_events).await;
    assert_eq!(phase, ConnectionPhase::Pairing);
    assert!(challenge.is_none());

    h.peer_events
        .send(PeerEvent::StatusUpdate {
            text: "Secure encrypted channel established!".to_string(),
        })
        .await
        .unwrap();
    let (phase, _) = next_phase(&mut h.app_events).await;
    assert_eq!(phase, ConnectionPhase::Connected);
}

#[tokio::test(start_paused = true)]
async fn pairing_challenge_is_surfaced_and_confirmed() {
    let mut h = spawn_orchestrator();
    connect(&mut h, "peer.local:7400").await;

    h.peer_events
        .send(PeerEvent::PairingRequired {
            code: "482913".to_string(),
        })
        .await
        .unwrap();
    let (phase, challenge) = next_phase(&mut h.app_events).await;
    assert_eq!(phase, ConnectionPhase::Pairing);
    assert_eq!(challenge.as_deref(), Some("482913"));

    h.commands.send(Command::ConfirmPairing).await.unwrap();
    assert_eq!(next_effect(&mut h.effects).await, Effect::ConfirmPairing);

    // Confirmation alone does not advance the phase; success does
    h.peer_events.send(PeerEvent::PeerConnected).await.unwrap();
    let (phase, challenge) = next_phase(&mut h.app_events).await;
    assert_eq!(phase, ConnectionPhase::Connected);
    assert!(challenge.is_none());
}

#[tokio::test(start_paused = true)]
async fn success_while_disconnected_is_rejected() {
    let mut h = spawn_orchestrator();
    h.peer_events
        .send(PeerEvent::ConnectSuccess {
            text: "Secure encrypted channel established!".to_string(),
        })
        .await
        .unwrap();

    h.commands.send(Command::GetStatus).await.unwrap();
    loop {
        match next_app_event(&mut h.app_events).await {
            AppEvent::StatusReport { phase, .. } => {
                assert_eq!(phase, ConnectionPhase::Disconnected);
                break;
            }
            AppEvent::PhaseChanged { .. } => panic!("no phase change expected"),
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn blank_address_is_reported_not_attempted() {
    let mut h = spawn_orchestrator();
    h.commands
        .send(Command::Connect {
            address: "   ".to_string(),
        })
        .await
        .unwrap();

    match next_app_event(&mut h.app_events).await {
        AppEvent::SystemError { kind, .. } => assert_eq!(kind, ErrorKind::InvalidInput),
        other => panic!("expected SystemError, got {other:?}"),
    }
    // No connect effect was emitted
    h.commands.send(Command::Disconnect).await.unwrap();
    assert!(matches!(
        next_effect(&mut h.effects).await,
        Effect::NotifyPeerDisconnecting { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn disconnect_notifies_peer_and_stops_loop() {
    let mut h = spawn_orchestrator();
    h.commands
        .send(Command::ToggleAutoConnect { enabled: true })
        .await
        .unwrap();
    establish(&mut h, "peer.local:7400").await;

    h.commands.send(Command::Disconnect).await.unwrap();
    assert!(matches!(
        next_effect(&mut h.effects).await,
        Effect::NotifyPeerDisconnecting { .. }
    ));
    assert_eq!(next_effect(&mut h.effects).await, Effect::Disconnect);

    let (phase, _) = next_phase(&mut h.app_events).await;
    assert_eq!(phase, ConnectionPhase::Disconnected);

    // Explicit disconnect parks the loop: no retry fires afterwards
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.effects.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn stale_error_after_disconnect_does_not_rearm_loop() {
    let mut h = spawn_orchestrator();
    h.commands
        .send(Command::ToggleAutoConnect { enabled: true })
        .await
        .unwrap();
    establish(&mut h, "peer.local:7400").await;

    h.commands.send(Command::Disconnect).await.unwrap();
    assert!(matches!(
        next_effect(&mut h.effects).await,
        Effect::NotifyPeerDisconnecting { .. }
    ));
    assert_eq!(next_effect(&mut h.effects).await, Effect::Disconnect);
    let (phase, _) = next_phase(&mut h.app_events).await;
    assert_eq!(phase, ConnectionPhase::Disconnected);

    // The bridge socket often dies a moment after the teardown; that
    // trailing error must not restart the retry loop
    h.peer_events
        .send(PeerEvent::Error {
            message: "socket closed by remote".to_string(),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.effects.try_recv().is_err());
}

// ----------------------------------------------------------------------------
// Reconnect behaviour
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn error_triggers_backoff_retry() {
    let mut h = spawn_orchestrator();
    h.commands
        .send(Command::ToggleAutoConnect { enabled: true })
        .await
        .unwrap();
    connect(&mut h, "peer.local:7400").await;

    h.peer_events
        .send(PeerEvent::Error {
            message: "connection refused".to_string(),
        })
        .await
        .unwrap();
    let (phase, _) = next_phase(&mut h.app_events).await;
    assert_eq!(phase, ConnectionPhase::Disconnected);

    // The engine retries the same target after the backoff delay
    assert_eq!(
        next_effect(&mut h.effects).await,
        Effect::Connect {
            address: "peer.local:7400".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn watchdog_fails_a_silent_attempt() {
    let mut h = spawn_orchestrator();
    h.commands
        .send(Command::ToggleAutoConnect { enabled: true })
        .await
        .unwrap();
    connect(&mut h, "peer.local:7400").await;

    // No peer notification ever arrives; the watchdog must fire and the
    // loop must retry on its own.
    loop {
        match next_app_event(&mut h.app_events).await {
            AppEvent::SystemError { kind, .. } => {
                assert_eq!(kind, ErrorKind::Timeout);
                break;
            }
            AppEvent::ReconnectStateChanged { .. } => {}
            other => panic!("unexpected event before timeout: {other:?}"),
        }
    }
    assert!(matches!(
        next_effect(&mut h.effects).await,
        Effect::Connect { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn graceful_disconnect_rearms_after_grace_delay() {
    let mut h = spawn_orchestrator();
    h.commands
        .send(Command::ToggleAutoConnect { enabled: true })
        .await
        .unwrap();
    establish(&mut h, "peer.local:7400").await;

    h.peer_events
        .send(PeerEvent::PeerDisconnected {
            reason: "peer shutting down".to_string(),
        })
        .await
        .unwrap();
    let (phase, _) = next_phase(&mut h.app_events).await;
    assert_eq!(phase, ConnectionPhase::Disconnected);

    assert_eq!(
        next_effect(&mut h.effects).await,
        Effect::Connect {
            address: "peer.local:7400".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn reconnect_disabled_means_no_retry() {
    let mut h = spawn_orchestrator();
    connect(&mut h, "peer.local:7400").await;

    h.peer_events
        .send(PeerEvent::Error {
            message: "connection refused".to_string(),
        })
        .await
        .unwrap();
    let (phase, _) = next_phase(&mut h.app_events).await;
    assert_eq!(phase, ConnectionPhase::Disconnected);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.effects.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn loop_goes_idle_once_connected() {
    let mut h = spawn_orchestrator();
    h.commands
        .send(Command::ToggleAutoConnect { enabled: true })
        .await
        .unwrap();
    establish(&mut h, "peer.local:7400").await;

    h.commands.send(Command::GetStatus).await.unwrap();
    loop {
        if let AppEvent::StatusReport { reconnect, .. } = next_app_event(&mut h.app_events).await {
            assert!(!reconnect.loop_active);
            assert_eq!(reconnect.attempt_count, 0);
            assert!(reconnect.last_error.is_none());
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn startup_with_saved_address_dials_on_its_own() {
    let mut prefs = MemoryPreferenceStore::default();
    prefs.set_auto_connect(AutoConnectConfig {
        enabled: true,
        address: Some("peer.saved:7400".to_string()),
    });
    let mut h = spawn_orchestrator_with_prefs(prefs);

    // No command is ever sent; the loop dials the persisted address itself
    assert_eq!(
        next_effect(&mut h.effects).await,
        Effect::Connect {
            address: "peer.saved:7400".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn startup_enabled_without_address_idles_with_an_error() {
    let mut prefs = MemoryPreferenceStore::default();
    prefs.set_auto_connect(AutoConnectConfig {
        enabled: true,
        address: None,
    });
    let mut h = spawn_orchestrator_with_prefs(prefs);

    loop {
        if let AppEvent::ReconnectStateChanged { snapshot } =
            next_app_event(&mut h.app_events).await
        {
            assert!(!snapshot.loop_active);
            assert_eq!(
                snapshot.last_error.as_deref(),
                Some("no target address available for reconnect")
            );
            break;
        }
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.effects.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn startup_falls_back_to_recent_server_list() {
    let mut prefs = MemoryPreferenceStore::default();
    prefs.set_auto_connect(AutoConnectConfig {
        enabled: true,
        address: None,
    });
    prefs.set_recent_servers(vec![
        "peer.recent:7400".to_string(),
        "peer.older:7400".to_string(),
    ]);
    let mut h = spawn_orchestrator_with_prefs(prefs);

    assert_eq!(
        next_effect(&mut h.effects).await,
        Effect::Connect {
            address: "peer.recent:7400".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn blank_saved_address_is_rejected_once_not_retried_forever() {
    let mut prefs = MemoryPreferenceStore::default();
    prefs.set_auto_connect(AutoConnectConfig {
        enabled: true,
        address: Some("   ".to_string()),
    });
    let mut h = spawn_orchestrator_with_prefs(prefs);

    loop {
        match next_app_event(&mut h.app_events).await {
            AppEvent::SystemError { kind, .. } => {
                assert_eq!(kind, ErrorKind::InvalidInput);
                break;
            }
            AppEvent::ReconnectStateChanged { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // The loop idles instead of spinning on the same bad input
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.effects.try_recv().is_err());
    h.commands.send(Command::GetStatus).await.unwrap();
    loop {
        if let AppEvent::StatusReport { reconnect, .. } = next_app_event(&mut h.app_events).await {
            assert!(!reconnect.loop_active);
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn blank_auto_connect_address_command_is_rejected() {
    let mut h = spawn_orchestrator();
    h.commands
        .send(Command::SetAutoConnectAddress {
            address: "  ".to_string(),
        })
        .await
        .unwrap();

    match next_app_event(&mut h.app_events).await {
        AppEvent::SystemError { kind, .. } => assert_eq!(kind, ErrorKind::InvalidInput),
        other => panic!("expected SystemError, got {other:?}"),
    }

    // The bad address was not persisted
    h.commands
        .send(Command::ToggleAutoConnect { enabled: true })
        .await
        .unwrap();
    loop {
        if let AppEvent::ReconnectStateChanged { snapshot } =
            next_app_event(&mut h.app_events).await
        {
            if snapshot.last_error.is_some() {
                assert_eq!(
                    snapshot.last_error.as_deref(),
                    Some("no target address available for reconnect")
                );
                break;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Redemptions, timers, playback
// ----------------------------------------------------------------------------

fn redemption_payload(timer_secs: Option<u32>) -> serde_json::Value {
    let mut audio = b"ID3".to_vec();
    audio.extend_from_slice(&[0u8; 32]);
    match timer_secs {
        Some(secs) => json!({
            "audio": audio,
            "title": "Posture check",
            "content": "Sit up straight",
            "message_type": 1,
            "time": secs,
        }),
        None => json!({
            "audio": audio,
            "title": "Hydrate",
            "content": "Drink some water",
            "message_type": 0,
        }),
    }
}

#[tokio::test(start_paused = true)]
async fn redemption_with_timer_registers_and_expires() {
    let mut h = spawn_orchestrator();
    h.peer_events
        .send(PeerEvent::RedemptionReceived {
            payload: redemption_payload(Some(2)),
        })
        .await
        .unwrap();

    // Registration announcement
    loop {
        if let AppEvent::TimersUpdated { timers, expired } = next_app_event(&mut h.app_events).await
        {
            assert_eq!(timers.len(), 1);
            assert_eq!(timers[0].title, "Posture check");
            assert_eq!(timers[0].content, "Sit up straight");
            assert_eq!(timers[0].total_secs, 2);
            assert_eq!(timers[0].remaining_secs, 2);
            assert!(timers[0].started_at_epoch_ms > 0);
            assert!(expired.is_empty());
            break;
        }
    }

    // The shared ticker counts it down to expiry
    loop {
        if let AppEvent::TimersUpdated { timers, expired } = next_app_event(&mut h.app_events).await
        {
            if !expired.is_empty() {
                assert_eq!(expired[0].title, "Posture check");
                assert_eq!(expired[0].remaining_secs, 0);
                assert!(timers.is_empty());
                break;
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn redemption_without_timer_only_plays() {
    let mut h = spawn_orchestrator();
    h.peer_events
        .send(PeerEvent::RedemptionReceived {
            payload: redemption_payload(None),
        })
        .await
        .unwrap();

    loop {
        match next_app_event(&mut h.app_events).await {
            AppEvent::RedemptionReceived { event } => {
                assert_eq!(event.title, "Hydrate");
                assert!(event.timer_duration_secs.is_none());
            }
            AppEvent::PlaybackStateChanged { status } => {
                assert!(status.is_playing);
                break;
            }
            AppEvent::TimersUpdated { .. } => panic!("no timer expected"),
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn malformed_redemption_is_survived() {
    let mut h = spawn_orchestrator();
    h.peer_events
        .send(PeerEvent::RedemptionReceived {
            payload: json!({"title": "broken"}),
        })
        .await
        .unwrap();

    match next_app_event(&mut h.app_events).await {
        AppEvent::SystemError { kind, .. } => assert_eq!(kind, ErrorKind::Decode),
        other => panic!("expected SystemError, got {other:?}"),
    }

    // The orchestrator is still alive and responsive
    h.commands.send(Command::GetStatus).await.unwrap();
    loop {
        if let AppEvent::StatusReport { .. } = next_app_event(&mut h.app_events).await {
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_timer_is_idempotent() {
    let mut h = spawn_orchestrator();
    h.peer_events
        .send(PeerEvent::RedemptionReceived {
            payload: redemption_payload(Some(600)),
        })
        .await
        .unwrap();

    let id = loop {
        if let AppEvent::TimersUpdated { timers, .. } = next_app_event(&mut h.app_events).await {
            break timers[0].id;
        }
    };

    h.commands.send(Command::CancelTimer { id }).await.unwrap();
    loop {
        if let AppEvent::TimersUpdated { timers, .. } = next_app_event(&mut h.app_events).await {
            // Ticks may interleave before the cancel lands
            if timers.is_empty() {
                break;
            }
        }
    }

    // Cancelling again is harmless and emits nothing new
    h.commands.send(Command::CancelTimer { id }).await.unwrap();
    h.commands.send(Command::GetStatus).await.unwrap();
    loop {
        match next_app_event(&mut h.app_events).await {
            AppEvent::TimersUpdated { .. } => panic!("stale cancel produced an update"),
            AppEvent::StatusReport { timers, .. } => {
                assert!(timers.is_empty());
                break;
            }
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn status_report_carries_latest_redemption_without_audio() {
    let mut h = spawn_orchestrator();
    h.commands.send(Command::GetStatus).await.unwrap();
    loop {
        if let AppEvent::StatusReport {
            latest_redemption, ..
        } = next_app_event(&mut h.app_events).await
        {
            assert!(latest_redemption.is_none());
            break;
        }
    }

    h.peer_events
        .send(PeerEvent::RedemptionReceived {
            payload: redemption_payload(None),
        })
        .await
        .unwrap();
    loop {
        if let AppEvent::PlaybackStateChanged { .. } = next_app_event(&mut h.app_events).await {
            break;
        }
    }

    // A frontend attaching after the fact still learns what played last
    h.commands.send(Command::GetStatus).await.unwrap();
    loop {
        if let AppEvent::StatusReport {
            latest_redemption, ..
        } = next_app_event(&mut h.app_events).await
        {
            let event = latest_redemption.expect("latest redemption recorded");
            assert_eq!(event.title, "Hydrate");
            assert!(event.audio.is_empty());
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn first_timer_tick_waits_a_full_period() {
    let mut h = spawn_orchestrator();

    // Idle long enough that the shared ticker has a stale tick queued up
    tokio::time::sleep(Duration::from_secs(30)).await;
    let registered_at = tokio::time::Instant::now();

    h.peer_events
        .send(PeerEvent::RedemptionReceived {
            payload: redemption_payload(Some(1)),
        })
        .await
        .unwrap();
    loop {
        if let AppEvent::TimersUpdated { expired, .. } = next_app_event(&mut h.app_events).await {
            if !expired.is_empty() {
                break;
            }
        }
    }

    // A 1-second timer must live a full second, not expire on the stale tick
    assert!(registered_at.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn replay_without_history_reports_playback_error() {
    let mut h = spawn_orchestrator();
    h.commands.send(Command::ReplayLastAudio).await.unwrap();
    match next_app_event(&mut h.app_events).await {
        AppEvent::SystemError { kind, .. } => assert_eq!(kind, ErrorKind::Playback),
        other => panic!("expected SystemError, got {other:?}"),
    }
}
