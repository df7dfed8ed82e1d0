//! Drowsiness decision engine
//!
//! Owns every per-driver state machine. Frames, position fixes, timer ticks
//! and driver input arrive as separate calls; each returns the effects the
//! host must apply.

use alerting::AlertManager;
use attention_game::{AttentionChallenge, ChallengeOutcome, ChallengeUpdate};
use dms::{DmsAnalysis, DmsEvent, DmsModule, FrameInput};
use tracing::{debug, info};
use vehicle_stop::{GeoError, GeoFix, StopDetector, StopOutcome, StopUpdate};

use crate::counter::DrowsyEventCounter;
use crate::effect::{EngineEffect, IncidentReport, DROWSY_MESSAGE};
use crate::gate::{GateState, SafetyGate};
use crate::{EngineConfig, EngineError};

const GATE_REASON: &str = "Repeated drowsiness detected, driver asked to pull over";
const TEST_REASON: &str = "Manual test alert";

pub struct DrowsinessEngine {
    config: EngineConfig,
    dms: DmsModule,
    alert: AlertManager,
    counter: DrowsyEventCounter,
    gate: SafetyGate,
    stop: StopDetector,
    challenge: AttentionChallenge,
    geolocation_available: bool,
    last_fix: Option<GeoFix>,
}

impl DrowsinessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_challenge(
            AttentionChallenge::new(config.challenge.clone()),
            config,
        )
    }

    /// Engine with reproducible challenge sequences
    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        Self::with_challenge(
            AttentionChallenge::with_seed(config.challenge.clone(), seed),
            config,
        )
    }

    fn with_challenge(challenge: AttentionChallenge, config: EngineConfig) -> Self {
        info!(
            threshold = config.drowsy_event_threshold,
            "Creating drowsiness engine"
        );
        Self {
            dms: DmsModule::new(config.dms.clone()),
            alert: AlertManager::new(config.alert.clone()),
            counter: DrowsyEventCounter::new(),
            gate: SafetyGate::new(config.drowsy_event_threshold),
            stop: StopDetector::new(config.stop.clone()),
            challenge,
            geolocation_available: true,
            last_fix: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn drowsy_count(&self) -> u32 {
        self.counter.count()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn in_challenge(&self) -> bool {
        self.challenge.is_active()
    }

    pub fn is_alert_playing(&self) -> bool {
        self.alert.is_playing()
    }

    pub fn is_awaiting_stop(&self) -> bool {
        self.stop.is_waiting()
    }

    pub fn challenge(&self) -> &AttentionChallenge {
        &self.challenge
    }

    /// Whether the host can supply positions at all
    pub fn set_geolocation_available(&mut self, available: bool) {
        self.geolocation_available = available;
    }

    /// Run one frame through the detectors
    pub fn process_frame(&mut self, frame: &FrameInput) -> Vec<EngineEffect> {
        self.process_frame_with_analysis(frame).1
    }

    /// Like [`Self::process_frame`] but also returns the DMS analysis
    pub fn process_frame_with_analysis(
        &mut self,
        frame: &FrameInput,
    ) -> (DmsAnalysis, Vec<EngineEffect>) {
        let now = frame.timestamp_ms;
        let in_challenge = self.challenge.is_active();
        let analysis = self.dms.analyze(frame, in_challenge);
        let mut effects = Vec::new();

        for event in &analysis.events {
            match event {
                DmsEvent::DrowsinessStarted => {
                    if !in_challenge {
                        if let Some(command) = self.alert.start(now, self.counter.count()) {
                            effects.push(EngineEffect::Alert { command });
                        }
                    }
                    effects.push(status(DROWSY_MESSAGE));
                }
                DmsEvent::DrowsinessCleared => effects.push(status("")),
                DmsEvent::OverlayShown => self.on_overlay_edge(now, in_challenge, &mut effects),
                DmsEvent::OverlayHidden => {}
                DmsEvent::TiltGesture(trigger) => {
                    effects.push(EngineEffect::Gesture { trigger: *trigger })
                }
                DmsEvent::Yawn(cue) => effects.push(EngineEffect::YawnCue { cue: *cue }),
            }
        }

        effects.push(EngineEffect::Overlay {
            showing: analysis.overlay.showing,
            fade: analysis.overlay.fade,
        });
        (analysis, effects)
    }

    fn on_overlay_edge(&mut self, now: u64, in_challenge: bool, effects: &mut Vec<EngineEffect>) {
        if !self.counter.record(in_challenge) {
            return;
        }
        let count = self.counter.count();
        effects.push(EngineEffect::DrowsyCount { count });

        if self.gate.on_increment(count, in_challenge) {
            self.begin_stop_wait(now, effects);
        }
    }

    fn begin_stop_wait(&mut self, now: u64, effects: &mut Vec<EngineEffect>) {
        effects.push(EngineEffect::NotifyIncident {
            report: self.incident(GATE_REASON),
        });
        let update = self.stop.begin(now, self.geolocation_available);
        if !update.is_terminal() {
            effects.push(EngineEffect::StartGeoWatch);
        }
        self.apply_stop_update(update, effects);
    }

    fn apply_stop_update(&mut self, update: StopUpdate, effects: &mut Vec<EngineEffect>) {
        match update.outcome {
            None => effects.push(EngineEffect::ParkBanner {
                status: update.status,
            }),
            Some(StopOutcome::Stopped) => {
                effects.push(EngineEffect::StopGeoWatch);
                if self.gate.wait_succeeded() {
                    effects.push(EngineEffect::HideParkBanner);
                    self.enter_challenge(effects);
                }
            }
            Some(StopOutcome::Failed(failure)) => {
                debug!(?failure, "Stop wait ended without confirmation");
                if self.geolocation_available {
                    effects.push(EngineEffect::StopGeoWatch);
                }
                self.gate.wait_failed();
                effects.push(EngineEffect::ParkBanner {
                    status: update.status,
                });
            }
        }
    }

    /// Position fix from the host's geolocation watch
    pub fn on_position(&mut self, fix: GeoFix, now_ms: u64) -> Vec<EngineEffect> {
        self.last_fix = Some(fix);
        let mut effects = Vec::new();
        if let Some(update) = self.stop.on_fix(&fix, now_ms) {
            self.apply_stop_update(update, &mut effects);
        }
        effects
    }

    /// Geolocation failure from the host
    pub fn on_position_error(&mut self, error: GeoError) -> Vec<EngineEffect> {
        let mut effects = Vec::new();
        if let Some(update) = self.stop.on_error(error) {
            self.apply_stop_update(update, &mut effects);
        }
        effects
    }

    /// Advance timers: alert cap, stop-wait timeout, challenge playback and countdown
    pub fn tick(&mut self, now_ms: u64) -> Vec<EngineEffect> {
        let mut effects = Vec::new();
        if let Some(command) = self.alert.tick(now_ms) {
            effects.push(EngineEffect::Alert { command });
        }
        if let Some(update) = self.stop.poll_timeout(now_ms) {
            self.apply_stop_update(update, &mut effects);
        }
        if let Some(update) = self.challenge.tick(now_ms) {
            self.apply_challenge_update(update, &mut effects);
        }
        effects
    }

    /// Driver pressed Start on the challenge screen
    pub fn start_challenge(&mut self, now_ms: u64) -> Result<Vec<EngineEffect>, EngineError> {
        let ui = self.challenge.start(now_ms)?;
        Ok(vec![EngineEffect::Challenge { ui }])
    }

    /// Driver pressed a pad
    pub fn press_pad(&mut self, pad: u8, now_ms: u64) -> Result<Vec<EngineEffect>, EngineError> {
        let mut effects = Vec::new();
        if let Some(update) = self.challenge.press(pad, now_ms)? {
            self.apply_challenge_update(update, &mut effects);
        }
        Ok(effects)
    }

    /// Driver closed the challenge screen; the counter is kept
    pub fn exit_challenge(&mut self) -> Vec<EngineEffect> {
        if !self.challenge.exit() {
            return Vec::new();
        }
        vec![EngineEffect::Challenge {
            ui: self.challenge.ui(0),
        }]
    }

    /// Driver confirmed from the park banner that it is safe to continue
    pub fn proceed_manually(&mut self) -> Vec<EngineEffect> {
        let mut effects = Vec::new();
        let was_waiting = self.stop.cancel();
        if !self.gate.proceed_manually() {
            return effects;
        }
        if was_waiting {
            effects.push(EngineEffect::StopGeoWatch);
        }
        effects.push(EngineEffect::HideParkBanner);
        if !self.challenge.is_active() {
            self.enter_challenge(&mut effects);
        }
        effects
    }

    /// Send an incident notification on demand
    pub fn send_test_alert(&self) -> Vec<EngineEffect> {
        vec![EngineEffect::NotifyIncident {
            report: self.incident(TEST_REASON),
        }]
    }

    /// Pick the monitored face (`None` = closest to centre)
    pub fn select_face(&mut self, index: Option<usize>) -> Vec<EngineEffect> {
        let events = self.dms.select_face(index);
        reset_effects(&events)
    }

    /// Apply new configuration; live values take effect immediately
    pub fn update_config(&mut self, config: EngineConfig) -> Vec<EngineEffect> {
        let events = self.dms.update_config(config.dms.clone());
        self.alert.set_config(config.alert.clone());
        self.stop.set_config(config.stop.clone());
        self.challenge.set_config(config.challenge.clone());
        self.gate.set_threshold(config.drowsy_event_threshold);
        self.config = config;
        debug!("Engine configuration updated");
        reset_effects(&events)
    }

    /// Shut down: cancel any stop wait and silence the alert
    pub fn stop(&mut self) -> Vec<EngineEffect> {
        let mut effects = Vec::new();
        if self.stop.cancel() {
            effects.push(EngineEffect::StopGeoWatch);
        }
        if self.gate.banner_visible() {
            effects.push(EngineEffect::HideParkBanner);
        }
        self.gate.reset();
        if let Some(command) = self.alert.stop() {
            effects.push(EngineEffect::Alert { command });
        }
        let events = self.dms.reset_state();
        effects.extend(reset_effects(&events));
        info!(drowsy_events = self.counter.count(), "Engine stopped");
        effects
    }

    fn enter_challenge(&mut self, effects: &mut Vec<EngineEffect>) {
        if let Some(command) = self.alert.stop() {
            effects.push(EngineEffect::Alert { command });
        }
        match self.challenge.enter() {
            Ok(ui) => effects.push(EngineEffect::Challenge { ui }),
            Err(e) => debug!(error = %e, "Challenge already open"),
        }
    }

    fn apply_challenge_update(&mut self, update: ChallengeUpdate, effects: &mut Vec<EngineEffect>) {
        effects.push(EngineEffect::Challenge { ui: update.ui });
        let Some(outcome) = update.outcome else {
            return;
        };
        if outcome == ChallengeOutcome::Passed {
            self.counter.reset();
            effects.push(EngineEffect::DrowsyCount { count: 0 });
        }
        effects.push(EngineEffect::ChallengeFinished { outcome });
    }

    fn incident(&self, reason: &str) -> IncidentReport {
        IncidentReport {
            reason: reason.to_string(),
            drowsy_events: self.counter.count(),
            position: self.last_fix,
        }
    }
}

/// Effects for state cleared outside the frame path
fn reset_effects(events: &[DmsEvent]) -> Vec<EngineEffect> {
    events
        .iter()
        .filter_map(|event| match event {
            DmsEvent::DrowsinessCleared => Some(status("")),
            DmsEvent::OverlayHidden => Some(EngineEffect::Overlay {
                showing: false,
                fade: 0.0,
            }),
            _ => None,
        })
        .collect()
}

fn status(text: &str) -> EngineEffect {
    EngineEffect::StatusMessage {
        text: text.to_string(),
    }
}
