//! Engine host loop
//!
//! Owns the [`DrowsinessEngine`] inside one task and consumes a single event
//! stream fed by every source (camera, position, UI), interleaved with a
//! timer tick. Engine effects are applied here (geolocation watch,
//! notifications) and forwarded to the output channel.

use std::time::Duration;

use cloud_sync::{AlertNotifier, NotifyOutcome};
use dms::FrameInput;
use safety_gate::{DrowsinessEngine, EngineEffect, EngineError, IncidentReport};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::scenario::{PositionEvent, UserAction, UserInput};

/// Everything the host reports to its consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostOutput {
    Effect { at_ms: u64, effect: EngineEffect },
    Notification { outcome: NotifyOutcome, status: String },
    InputRejected { at_ms: u64, reason: String },
}

/// One input from any source. Sources share a channel so the host sees
/// events in the order they were sent.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Frame(FrameInput),
    Position(PositionEvent),
    Input(UserInput),
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostSummary {
    pub frames: u64,
    /// Positions handed to the engine
    pub positions: u64,
    /// Positions that arrived while no geolocation watch was held
    pub positions_dropped: u64,
    pub inputs: u64,
    pub notifications: u64,
    pub drowsy_events: u32,
}

/// Engine time: the latest event timestamp, advanced by elapsed time between events
struct HostClock {
    last_ms: u64,
    at: Instant,
}

impl HostClock {
    fn new() -> Self {
        Self {
            last_ms: 0,
            at: Instant::now(),
        }
    }

    fn now(&self) -> u64 {
        let elapsed = u64::try_from(self.at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_ms.saturating_add(elapsed)
    }

    fn observe(&mut self, timestamp_ms: u64) -> u64 {
        if timestamp_ms >= self.now() {
            self.last_ms = timestamp_ms;
            self.at = Instant::now();
            timestamp_ms
        } else {
            self.now()
        }
    }
}

pub struct EngineHost {
    engine: DrowsinessEngine,
    notifier: Option<AlertNotifier>,
    outputs: mpsc::UnboundedSender<HostOutput>,
    tick_interval: Duration,
    clock: HostClock,
    /// Engine holds a geolocation watch
    watching: bool,
    last_tick_ms: u64,
    notifications: JoinSet<()>,
    summary: HostSummary,
}

impl EngineHost {
    pub fn new(
        engine: DrowsinessEngine,
        notifier: Option<AlertNotifier>,
        outputs: mpsc::UnboundedSender<HostOutput>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            engine,
            notifier,
            outputs,
            tick_interval,
            clock: HostClock::new(),
            watching: false,
            last_tick_ms: 0,
            notifications: JoinSet::new(),
            summary: HostSummary::default(),
        }
    }

    /// Run until the event stream closes or shutdown is signalled, then
    /// stop the engine and wait for in-flight notifications.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<HostEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> HostSummary {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Engine host started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping engine host");
                        break;
                    }
                }
                event = events.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => break,
                },
                _ = interval.tick() => {
                    let now = self.clock.now();
                    self.tick(now);
                }
            }
        }

        let now = self.clock.now();
        let effects = self.engine.stop();
        self.emit(now, effects);

        while let Some(result) = self.notifications.join_next().await {
            if let Err(e) = result {
                warn!("Notification task failed: {}", e);
            }
        }

        self.summary.drowsy_events = self.engine.drowsy_count();
        info!(summary = ?self.summary, "Engine host stopped");
        self.summary
    }

    fn on_event(&mut self, event: HostEvent) {
        let now = match event {
            HostEvent::Frame(frame) => self.on_frame(frame),
            HostEvent::Position(position) => self.on_position(position),
            HostEvent::Input(input) => self.on_input(input),
        };
        // Event time can outrun the interval when replaying fast
        let interval_ms = u64::try_from(self.tick_interval.as_millis()).unwrap_or(u64::MAX);
        if now >= self.last_tick_ms.saturating_add(interval_ms) {
            self.tick(now);
        }
    }

    fn tick(&mut self, now: u64) {
        self.last_tick_ms = now;
        let effects = self.engine.tick(now);
        self.emit(now, effects);
    }

    fn on_frame(&mut self, frame: FrameInput) -> u64 {
        self.summary.frames += 1;
        let now = self.clock.observe(frame.timestamp_ms);
        let effects = self.engine.process_frame(&frame);
        self.emit(now, effects);
        now
    }

    fn on_position(&mut self, position: PositionEvent) -> u64 {
        let now = self.clock.observe(position.timestamp_ms());
        if !self.watching {
            self.summary.positions_dropped += 1;
            return now;
        }
        self.summary.positions += 1;
        let effects = match position {
            PositionEvent::Fix(fix) => self.engine.on_position(fix, now),
            PositionEvent::Error { error, .. } => self.engine.on_position_error(error),
        };
        self.emit(now, effects);
        now
    }

    fn on_input(&mut self, input: UserInput) -> u64 {
        self.summary.inputs += 1;
        let now = self.clock.observe(input.timestamp_ms);
        debug!(action = ?input.action, now, "User input");

        let result: Result<Vec<EngineEffect>, EngineError> = match input.action {
            UserAction::StartChallenge => self.engine.start_challenge(now),
            UserAction::PressPad { pad } => self.engine.press_pad(pad, now),
            UserAction::ExitChallenge => Ok(self.engine.exit_challenge()),
            UserAction::ProceedManually => Ok(self.engine.proceed_manually()),
            UserAction::SendTestAlert => Ok(self.engine.send_test_alert()),
            UserAction::SelectFace { index } => Ok(self.engine.select_face(index)),
        };

        match result {
            Ok(effects) => self.emit(now, effects),
            Err(e) => {
                warn!(action = ?input.action, "Input rejected: {}", e);
                self.output(HostOutput::InputRejected {
                    at_ms: now,
                    reason: e.to_string(),
                });
            }
        }
        now
    }

    fn emit(&mut self, now: u64, effects: Vec<EngineEffect>) {
        for effect in effects {
            match &effect {
                EngineEffect::StartGeoWatch => {
                    info!("Starting geolocation watch");
                    self.watching = true;
                }
                EngineEffect::StopGeoWatch => {
                    info!("Stopping geolocation watch");
                    self.watching = false;
                }
                EngineEffect::NotifyIncident { report } => self.spawn_notification(report.clone()),
                _ => {}
            }
            self.output(HostOutput::Effect { at_ms: now, effect });
        }
    }

    fn spawn_notification(&mut self, report: IncidentReport) {
        self.summary.notifications += 1;
        let outputs = self.outputs.clone();

        let Some(notifier) = self.notifier.clone() else {
            debug!("Notifier disabled, incident reported as simulated");
            let outcome = NotifyOutcome::Simulated;
            let _ = outputs.send(HostOutput::Notification {
                outcome,
                status: outcome.status_text().to_string(),
            });
            return;
        };

        self.notifications.spawn(async move {
            let outcome = notifier.notify(&report).await;
            let _ = outputs.send(HostOutput::Notification {
                outcome,
                status: outcome.status_text().to_string(),
            });
        });
    }

    fn output(&self, output: HostOutput) {
        if self.outputs.send(output).is_err() {
            debug!("Output consumer gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safety_gate::EngineConfig;
    use vehicle_stop::GeoFix;

    fn spawn_host(
        events: mpsc::Receiver<HostEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> (tokio::task::JoinHandle<HostSummary>, mpsc::UnboundedReceiver<HostOutput>) {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let host = EngineHost::new(
            DrowsinessEngine::new(EngineConfig::default()),
            None,
            output_tx,
            Duration::from_millis(100),
        );
        (tokio::spawn(host.run(events, shutdown)), output_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_signal_stops_engine() {
        let (event_tx, event_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, _outputs) = spawn_host(event_rx, shutdown_rx);

        event_tx
            .send(HostEvent::Frame(FrameInput::new(0, Vec::new())))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        shutdown_tx.send(true).unwrap();

        let summary = handle.await.unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.drowsy_events, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_input_is_reported() {
        let (event_tx, event_rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, mut outputs) = spawn_host(event_rx, shutdown_rx);

        event_tx
            .send(HostEvent::Input(UserInput {
                timestamp_ms: 50,
                action: UserAction::PressPad { pad: 1 },
            }))
            .await
            .unwrap();
        drop(event_tx);
        handle.await.unwrap();

        let mut rejected = 0;
        while let Ok(output) = outputs.try_recv() {
            if let HostOutput::InputRejected { at_ms, .. } = output {
                assert!(at_ms >= 50);
                rejected += 1;
            }
        }
        assert_eq!(rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_positions_without_watch_are_dropped() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, _outputs) = spawn_host(event_rx, shutdown_rx);

        for t in [100, 200] {
            event_tx
                .send(HostEvent::Position(PositionEvent::Fix(GeoFix::new(1.0, 2.0, t))))
                .await
                .unwrap();
        }
        drop(event_tx);

        let summary = handle.await.unwrap();
        assert_eq!(summary.positions, 0);
        assert_eq!(summary.positions_dropped, 2);
    }
}
