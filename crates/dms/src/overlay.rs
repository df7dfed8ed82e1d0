//! Debounced overlay visibility with fade
//!
//! Shows once the current closure reaches the show delay, stays up through
//! reopenings no longer than the hide delay.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::OverlayState;
use crate::DmsConfig;

/// Overlay state after one frame, with the edges crossed in that frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OverlayUpdate {
    pub showing: bool,
    pub fade: f32,
    pub became_visible: bool,
    pub became_hidden: bool,
}

#[derive(Debug, Clone)]
pub struct OverlayVisibility {
    show_delay_ms: u64,
    hide_delay_ms: u64,
    fade_in_ms: u64,
    fade_out_ms: u64,
    state: OverlayState,
}

impl OverlayVisibility {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            show_delay_ms: config.overlay_show_delay_ms,
            hide_delay_ms: config.overlay_hide_delay_ms,
            fade_in_ms: config.overlay_fade_in_ms,
            fade_out_ms: config.overlay_fade_out_ms,
            state: OverlayState::default(),
        }
    }

    pub fn apply_config(&mut self, config: &DmsConfig) {
        self.show_delay_ms = config.overlay_show_delay_ms;
        self.hide_delay_ms = config.overlay_hide_delay_ms;
        self.fade_in_ms = config.overlay_fade_in_ms;
        self.fade_out_ms = config.overlay_fade_out_ms;
    }

    /// Advance one frame.
    ///
    /// `since_last_closed_ms` is `None` if the eyes were never seen closed.
    pub fn update(
        &mut self,
        closed: bool,
        closed_duration_ms: u64,
        since_last_closed_ms: Option<u64>,
        dt_ms: u64,
    ) -> OverlayUpdate {
        let was_showing = self.state.showing;
        self.state.showing = if closed {
            was_showing || closed_duration_ms >= self.show_delay_ms
        } else {
            was_showing && since_last_closed_ms.is_some_and(|since| since <= self.hide_delay_ms)
        };

        let rate_ms = if self.state.showing {
            self.fade_in_ms
        } else {
            self.fade_out_ms
        };
        let step = dt_ms as f32 / rate_ms.max(1) as f32;
        self.state.fade = if self.state.showing {
            (self.state.fade + step).min(1.0)
        } else {
            (self.state.fade - step).max(0.0)
        };

        let update = self.snapshot(was_showing);
        if update.became_visible {
            debug!(closed_duration_ms, "Overlay shown");
        } else if update.became_hidden {
            debug!("Overlay hidden");
        }
        update
    }

    /// Hide immediately with no fade-out
    pub fn force_hide(&mut self) -> OverlayUpdate {
        let was_showing = self.state.showing;
        self.state = OverlayState::default();
        self.snapshot(was_showing)
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    fn snapshot(&self, was_showing: bool) -> OverlayUpdate {
        OverlayUpdate {
            showing: self.state.showing,
            fade: self.state.fade,
            became_visible: !was_showing && self.state.showing,
            became_hidden: was_showing && !self.state.showing,
        }
    }
}
