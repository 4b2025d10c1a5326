//! Phase layout and easing of the cinematic transition.
//!
//! The whole transition is driven by one normalized progress value `p`. The
//! phase is a pure function of `p`; each phase then works with its own local
//! progress in `[0, 1]`, which is what the easing curve is applied to.

/// End of the zoom phase as a fraction of the whole transition.
pub const ZOOM_END: f32 = 0.70;
/// End of the blackout phase.
pub const BLACKOUT_END: f32 = 0.85;
/// Blackout-local progress at which the camera hand-off happens.
pub const HANDOFF_AT: f32 = 0.95;

/// Where an active transition currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionPhase {
    /// No transition running.
    #[default]
    Idle,
    /// Camera flies into the screen while grain builds up.
    ZoomGrain,
    /// Overlay fades to black; the hand-off happens near the end.
    Blackout,
    /// Overlay fades out over the secondary scene.
    FadeIn,
}

/// Progress of the one-time camera and scene hand-off.
///
/// Only ever moves from `Pending` to `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handoff {
    Pending,
    Done,
}

/// Phase boundaries of a transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseThresholds {
    pub zoom_end: f32,
    pub blackout_end: f32,
    /// Blackout-local progress that triggers the hand-off.
    pub handoff_at: f32,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            zoom_end: ZOOM_END,
            blackout_end: BLACKOUT_END,
            handoff_at: HANDOFF_AT,
        }
    }
}

impl PhaseThresholds {
    /// Build thresholds, keeping every phase non-empty and in order.
    pub fn new(zoom_end: f32, blackout_end: f32, handoff_at: f32) -> Self {
        let zoom_end = zoom_end.clamp(0.01, 0.98);
        Self {
            zoom_end,
            blackout_end: blackout_end.clamp(zoom_end + 0.01, 0.99),
            handoff_at: handoff_at.clamp(0.0, 1.0),
        }
    }

    /// The phase a running transition is in at progress `p`.
    pub fn phase(&self, p: f32) -> TransitionPhase {
        if p < self.zoom_end {
            TransitionPhase::ZoomGrain
        } else if p < self.blackout_end {
            TransitionPhase::Blackout
        } else {
            TransitionPhase::FadeIn
        }
    }

    /// The phase at `p` together with the progress inside that phase.
    pub fn locate(&self, p: f32) -> (TransitionPhase, f32) {
        let p = p.clamp(0.0, 1.0);
        let phase = self.phase(p);
        let (start, end) = match phase {
            TransitionPhase::ZoomGrain | TransitionPhase::Idle => (0.0, self.zoom_end),
            TransitionPhase::Blackout => (self.zoom_end, self.blackout_end),
            TransitionPhase::FadeIn => (self.blackout_end, 1.0),
        };
        (phase, ((p - start) / (end - start)).clamp(0.0, 1.0))
    }
}

/// Cubic ease-in-out over `[0, 1]`.
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}
