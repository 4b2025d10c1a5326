//! Screen effects the transition drives: film grain and a fade overlay.

use crate::color::Color;

/// Knobs of the film-grain post effect.
///
/// The transition writes these; [`GrainPass`](crate::GrainPass) reads them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrainSettings {
    /// Noise strength, 0 = off.
    pub intensity: f32,
    /// Blend towards grayscale, 0 = full color.
    pub desaturate: f32,
    /// Seconds, animates the noise pattern.
    pub time: f32,
    pub enabled: bool,
}

impl Default for GrainSettings {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            desaturate: 0.0,
            time: 0.0,
            enabled: false,
        }
    }
}

impl GrainSettings {
    /// Whether the effect would change the image at all.
    pub fn is_active(&self) -> bool {
        self.enabled && (self.intensity > 0.0 || self.desaturate > 0.0)
    }

    pub(crate) fn disable(&mut self) {
        self.enabled = false;
        self.intensity = 0.0;
        self.desaturate = 0.0;
    }
}

/// A full-screen color layer drawn over everything else.
pub trait FadeOverlay {
    /// Make the overlay visible with the given color, fully transparent.
    fn show(&mut self, color: Color);

    /// Set the overlay opacity in `[0, 1]`.
    fn set_opacity(&mut self, opacity: f32);

    /// Hide the overlay once `delay` seconds have passed.
    fn remove_after(&mut self, delay: f32);
}

/// A [`FadeOverlay`] that keeps its state on the CPU for a renderer to draw.
///
/// Call [`tick`](Self::tick) once per frame so scheduled removals fire.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayState {
    color: Color,
    opacity: f32,
    visible: bool,
    removal: Option<f32>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, dt: f32) {
        let Some(remaining) = self.removal.as_mut() else {
            return;
        };
        *remaining -= dt;
        if *remaining <= 0.0 {
            self.removal = None;
            self.visible = false;
            self.opacity = 0.0;
            log::debug!("fade overlay removed");
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Overlay color with the current opacity folded into alpha.
    pub fn color(&self) -> Color {
        self.color.with_alpha(self.color.a * self.opacity)
    }

    pub fn removal_pending(&self) -> bool {
        self.removal.is_some()
    }
}

impl FadeOverlay for OverlayState {
    fn show(&mut self, color: Color) {
        self.color = color;
        self.opacity = 0.0;
        self.visible = true;
        self.removal = None;
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    fn remove_after(&mut self, delay: f32) {
        if delay <= 0.0 {
            self.visible = false;
            self.opacity = 0.0;
            self.removal = None;
        } else {
            self.removal = Some(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_disappears_after_delay() {
        let mut overlay = OverlayState::new();
        overlay.show(Color::BLACK);
        overlay.set_opacity(0.4);
        overlay.remove_after(0.5);

        overlay.tick(0.3);
        assert!(overlay.is_visible());
        assert_eq!(overlay.color().a, 0.4);

        overlay.tick(0.3);
        assert!(!overlay.is_visible());
        assert!(!overlay.removal_pending());
    }

    #[test]
    fn show_cancels_pending_removal() {
        let mut overlay = OverlayState::new();
        overlay.show(Color::BLACK);
        overlay.remove_after(0.1);
        overlay.show(Color::WHITE);
        overlay.tick(1.0);
        assert!(overlay.is_visible());
    }

    #[test]
    fn disabled_grain_is_inactive() {
        let mut grain = GrainSettings {
            intensity: 0.5,
            desaturate: 0.5,
            time: 1.0,
            enabled: true,
        };
        assert!(grain.is_active());
        grain.disable();
        assert!(!grain.is_active());
        assert_eq!(grain.time, 1.0);
    }
}
