//! Wraith Runtime
//!
//! Hosts the drowsiness engine: loads settings, sets up logging and drives
//! the engine from recorded frame, position and input streams.

pub mod host;
pub mod scenario;
pub mod settings;

pub use host::{EngineHost, HostEvent, HostOutput, HostSummary};
pub use scenario::{
    load_scenario, parse_scenario, replay, PositionEvent, ScenarioEvent, UserAction, UserInput,
};
pub use settings::{RuntimeSettings, Settings};

use std::time::Duration;

use anyhow::{Context, Result};
use cloud_sync::AlertNotifier;
use safety_gate::DrowsinessEngine;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging. `RUST_LOG` overrides the default `info` level.
/// Logs go to stderr; stdout carries engine output.
pub fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.context("Failed to set tracing subscriber")
}

/// Replay a scenario through a freshly built engine host.
///
/// Every event goes through one channel in timestamp order; the host drops
/// positions while the engine holds no geolocation watch. Returns once the
/// scenario is exhausted or `shutdown` fires.
pub async fn run_scenario(
    settings: &Settings,
    mut events: Vec<ScenarioEvent>,
    outputs: mpsc::UnboundedSender<HostOutput>,
    shutdown: watch::Receiver<bool>,
) -> Result<HostSummary> {
    events.sort_by_key(ScenarioEvent::timestamp_ms);
    let runtime = &settings.runtime;

    let mut engine = match runtime.seed {
        Some(seed) => DrowsinessEngine::with_seed(settings.engine.clone(), seed),
        None => DrowsinessEngine::new(settings.engine.clone()),
    };
    engine.set_geolocation_available(runtime.geolocation_available);

    let notifier = if runtime.notify {
        Some(AlertNotifier::new(settings.notifier.clone()).context("Failed to create notifier")?)
    } else {
        None
    };

    let (event_tx, event_rx) = mpsc::channel(runtime.channel_capacity.max(1));
    let host = EngineHost::new(
        engine,
        notifier,
        outputs,
        Duration::from_millis(runtime.tick_interval_ms.max(1)),
    );
    let feeder = tokio::spawn(replay(events, event_tx, runtime.realtime));

    info!(realtime = runtime.realtime, "Replaying scenario");
    let summary = host.run(event_rx, shutdown).await;

    // Early shutdown leaves the feeder mid-scenario
    feeder.abort();
    match feeder.await {
        Ok(Ok(sent)) => debug!(sent, "Scenario fully replayed"),
        Ok(Err(e)) => debug!("Replay stopped early: {}", e),
        Err(e) if e.is_cancelled() => debug!("Replay cancelled"),
        Err(e) => return Err(e).context("Replay task failed"),
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::AlertCommand;
    use attention_game::{ChallengeOutcome, FailReason};
    use cloud_sync::NotifyOutcome;
    use dms::landmarks::{self, EyeIndices};
    use dms::{FaceLandmarks, FrameInput, Point};
    use safety_gate::{EngineConfig, EngineEffect};
    use vehicle_stop::GeoFix;

    const FRAME_MS: u64 = 33;

    fn add_eye(face: &mut FaceLandmarks, eye: EyeIndices, x: f32, ear: f32) {
        let gap = ear * 0.04;
        face.insert(eye.outer, Point::new(x - 0.02, 0.4));
        face.insert(eye.inner, Point::new(x + 0.02, 0.4));
        face.insert(eye.upper[0], Point::new(x - 0.005, 0.4 - gap / 2.0));
        face.insert(eye.upper[1], Point::new(x + 0.005, 0.4 - gap / 2.0));
        face.insert(eye.lower[0], Point::new(x - 0.005, 0.4 + gap / 2.0));
        face.insert(eye.lower[1], Point::new(x + 0.005, 0.4 + gap / 2.0));
    }

    fn face(closed: bool) -> FaceLandmarks {
        let ear = if closed { 0.1 } else { 0.32 };
        let mut face = FaceLandmarks::new();
        add_eye(&mut face, landmarks::LEFT_EYE, 0.56, ear);
        add_eye(&mut face, landmarks::RIGHT_EYE, 0.44, ear);
        face.insert(landmarks::MOUTH_LEFT, Point::new(0.46, 0.62));
        face.insert(landmarks::MOUTH_RIGHT, Point::new(0.54, 0.62));
        face.insert(landmarks::UPPER_LIP, Point::new(0.5, 0.618));
        face.insert(landmarks::LOWER_LIP, Point::new(0.5, 0.622));
        face.insert(landmarks::LEFT_CHEEK, Point::new(0.4, 0.5));
        face.insert(landmarks::RIGHT_CHEEK, Point::new(0.6, 0.5));
        face
    }

    fn frames(events: &mut Vec<ScenarioEvent>, closed: bool, from_ms: u64, to_ms: u64) {
        let f = face(closed);
        let mut now = from_ms;
        while now < to_ms {
            events.push(ScenarioEvent::Frame(FrameInput::new(now, vec![f.clone()])));
            now += FRAME_MS;
        }
    }

    /// Eyes closed for 1.7s then open until `to_ms`: drowsy once, one overlay edge
    fn drowsy_episode(to_ms: u64) -> Vec<ScenarioEvent> {
        let mut events = Vec::new();
        frames(&mut events, true, 0, 1_700);
        frames(&mut events, false, 1_700, to_ms);
        events
    }

    fn fixes(events: &mut Vec<ScenarioEvent>, speed_mps: f64) {
        for t in (500..9_000).step_by(500) {
            let fix = GeoFix::new(48.1, 11.5, t)
                .with_accuracy(5.0)
                .with_speed(speed_mps);
            events.push(ScenarioEvent::Position(fix));
        }
    }

    fn input(timestamp_ms: u64, action: UserAction) -> ScenarioEvent {
        ScenarioEvent::Input(UserInput {
            timestamp_ms,
            action,
        })
    }

    fn settings(threshold: u32) -> Settings {
        Settings {
            engine: EngineConfig {
                drowsy_event_threshold: threshold,
                ..Default::default()
            },
            runtime: RuntimeSettings {
                realtime: true,
                seed: Some(7),
                notify: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn run(settings: Settings, events: Vec<ScenarioEvent>) -> (HostSummary, Vec<HostOutput>) {
        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let summary = run_scenario(&settings, events, output_tx, shutdown_rx)
            .await
            .unwrap();

        let mut outputs = Vec::new();
        while let Ok(output) = output_rx.try_recv() {
            outputs.push(output);
        }
        (summary, outputs)
    }

    fn effects(outputs: &[HostOutput]) -> Vec<&EngineEffect> {
        outputs
            .iter()
            .filter_map(|o| match o {
                HostOutput::Effect { effect, .. } => Some(effect),
                _ => None,
            })
            .collect()
    }

    fn position(effects: &[&EngineEffect], pred: impl Fn(&EngineEffect) -> bool) -> Option<usize> {
        effects.iter().position(|e| pred(e))
    }

    #[tokio::test(start_paused = true)]
    async fn test_drowsy_episode_counts_and_alerts() {
        let (summary, outputs) = run(settings(5), drowsy_episode(3_000)).await;
        let effects = effects(&outputs);

        assert_eq!(summary.drowsy_events, 1);
        assert!(summary.frames > 80);
        assert!(effects.contains(&&EngineEffect::DrowsyCount { count: 1 }));
        assert!(effects.iter().any(|e| matches!(
            e,
            EngineEffect::Alert {
                command: AlertCommand::Start { .. }
            }
        )));
        // Below threshold: no stop request
        assert!(!effects.contains(&&EngineEffect::StartGeoWatch));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_confirmation_opens_challenge() {
        // Grab a free port, then close it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut settings = settings(0);
        settings.runtime.notify = true;
        settings.notifier.endpoint = format!("http://{addr}/api/alert");
        settings.notifier.timeout_ms = 500;

        let mut events = drowsy_episode(9_000);
        fixes(&mut events, 0.0);

        let (summary, outputs) = run(settings, events).await;
        let effects = effects(&outputs);

        let start_watch = position(&effects, |e| *e == EngineEffect::StartGeoWatch);
        let stop_watch = position(&effects, |e| *e == EngineEffect::StopGeoWatch);
        let challenge = position(&effects, |e| matches!(e, EngineEffect::Challenge { .. }));
        assert!(start_watch.is_some());
        assert!(stop_watch > start_watch);
        assert!(challenge > start_watch);

        // Fixes before the watch started never reached the engine
        assert!(summary.positions > 0);
        assert!(summary.positions_dropped >= 2);
        assert_eq!(summary.positions + summary.positions_dropped, 17);
        assert_eq!(summary.notifications, 1);
        assert!(outputs.iter().any(|o| matches!(
            o,
            HostOutput::Notification {
                outcome: NotifyOutcome::Simulated,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_replay_confirms_stop() {
        let mut settings = settings(0);
        settings.runtime.realtime = false;
        let mut events = drowsy_episode(9_000);
        fixes(&mut events, 0.0);

        let (summary, outputs) = run(settings, events).await;
        let effects = effects(&outputs);

        let start_watch = position(&effects, |e| *e == EngineEffect::StartGeoWatch);
        let challenge = position(&effects, |e| matches!(e, EngineEffect::Challenge { .. }));
        assert!(start_watch.is_some());
        assert!(challenge > start_watch);
        assert!(summary.positions > 0);
        assert_eq!(summary.positions + summary.positions_dropped, 17);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_replay_runs_timers_on_event_time() {
        let mut settings = settings(0);
        settings.runtime.realtime = false;
        settings.runtime.geolocation_available = false;
        settings.runtime.tick_interval_ms = 100;
        let mut events = drowsy_episode(3_000);
        events.push(input(2_900, UserAction::ProceedManually));
        events.push(input(2_950, UserAction::StartChallenge));
        frames(&mut events, false, 3_000, 49_000);

        let (_, outputs) = run(settings, events).await;
        let effects = effects(&outputs);

        // The 45s countdown expires on scenario time, not wall time
        assert!(effects.iter().any(|e| matches!(
            e,
            EngineEffect::ChallengeFinished {
                outcome: ChallengeOutcome::Failed(FailReason::TimeUp)
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_moving_vehicle_never_opens_challenge() {
        let mut events = drowsy_episode(9_000);
        fixes(&mut events, 3.0);
        events.push(input(8_600, UserAction::StartChallenge));

        let (_, outputs) = run(settings(0), events).await;
        let effects = effects(&outputs);

        assert!(!effects
            .iter()
            .any(|e| matches!(e, EngineEffect::Challenge { .. })));
        assert!(outputs
            .iter()
            .any(|o| matches!(o, HostOutput::InputRejected { .. })));

        // Stopping the engine drops the watch and the banner
        let last_start = effects.iter().rposition(|e| **e == EngineEffect::StartGeoWatch);
        let last_stop = effects.iter().rposition(|e| **e == EngineEffect::StopGeoWatch);
        assert!(last_stop > last_start);
        assert!(effects.contains(&&EngineEffect::HideParkBanner));
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_geolocation_manual_proceed_opens_challenge() {
        let mut settings = settings(0);
        settings.runtime.geolocation_available = false;
        let mut events = drowsy_episode(3_000);
        events.push(input(2_900, UserAction::ProceedManually));

        let (_, outputs) = run(settings, events).await;
        let effects = effects(&outputs);

        assert!(!effects.contains(&&EngineEffect::StartGeoWatch));
        let banner = position(&effects, |e| matches!(e, EngineEffect::ParkBanner { .. }));
        let hide = position(&effects, |e| *e == EngineEffect::HideParkBanner);
        let challenge = position(&effects, |e| matches!(e, EngineEffect::Challenge { .. }));
        assert!(banner.is_some());
        assert!(hide > banner);
        assert!(challenge > hide);
    }

    #[tokio::test(start_paused = true)]
    async fn test_test_alert_without_notifier_is_simulated() {
        let events = vec![input(100, UserAction::SendTestAlert)];
        let (summary, outputs) = run(settings(5), events).await;

        assert_eq!(summary.notifications, 1);
        assert!(outputs.iter().any(|o| matches!(
            o,
            HostOutput::Notification {
                outcome: NotifyOutcome::Simulated,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_replay() {
        let (output_tx, _output_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let settings = settings(5);

        let run = tokio::spawn(async move {
            run_scenario(&settings, drowsy_episode(60_000), output_tx, shutdown_rx).await
        });
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        shutdown_tx.send(true).unwrap();

        let summary = run.await.unwrap().unwrap();
        assert!(summary.frames > 0);
        assert!(summary.frames < 100);
    }
}
