use futures::channel::oneshot;
use glam::{Quat, Vec3};
use hecs::Entity;
use thiserror::Error;

use super::effects::{FadeOverlay, GrainSettings};
use super::phase::{Handoff, PhaseThresholds, TransitionPhase, ease_in_out_cubic};
use crate::camera::Camera;
use crate::color::Color;
use crate::compositor::DisplaySurface;
use crate::follow_camera::{FollowCamera, FollowPose};
use crate::scene::{Avatar, SceneGraph, SceneRole};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransitionError {
    #[error("a transition is already in progress ({progress:.2} done)")]
    AlreadyInProgress { progress: f32 },
}

/// Resolves once the transition completes.
///
/// Yields `Err(Canceled)` if the controller is dropped mid-transition.
pub type Completion = oneshot::Receiver<()>;

/// Which camera the caller should render with this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActiveCamera {
    /// The camera watching the display surface in the primary scene.
    #[default]
    Primary,
    /// The camera inside the secondary scene.
    Secondary,
}

impl ActiveCamera {
    pub fn select<'c>(self, primary: &'c Camera, secondary: &'c Camera) -> &'c Camera {
        match self {
            ActiveCamera::Primary => primary,
            ActiveCamera::Secondary => secondary,
        }
    }
}

/// Where the viewer lands inside the secondary scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnPose {
    pub camera_position: Vec3,
    /// Point the camera looks at right after the hand-off.
    pub look_at: Vec3,
    /// Avatar position after the hand-off.
    pub avatar_origin: Vec3,
    /// Offset from the avatar origin to the point the follow camera tracks.
    pub look_offset: Vec3,
}

impl Default for SpawnPose {
    fn default() -> Self {
        Self {
            camera_position: Vec3::new(0.0, 3.0, 6.0),
            look_at: Vec3::new(0.0, 1.0, 0.0),
            avatar_origin: Vec3::ZERO,
            look_offset: Vec3::new(0.0, 1.0, 0.0),
        }
    }
}

/// Timing and look of a cinematic transition.
///
/// # Example
///
/// ```ignore
/// let config = TransitionConfig::default()
///     .duration(6.0)
///     .zoom_fov(15.0)
///     .grain_peak(0.8, 0.9);
/// ```
#[derive(Clone, Debug)]
pub struct TransitionConfig {
    /// Total length in seconds.
    pub duration: f32,
    pub thresholds: PhaseThresholds,
    /// How far in front of the display the zoom ends.
    pub approach_distance: f32,
    /// Field of view at the end of the zoom, radians.
    pub zoom_fov: f32,
    /// Field of view of the secondary camera after completion, radians.
    pub gameplay_fov: f32,
    pub grain_peak: f32,
    pub desaturate_peak: f32,
    pub spawn: SpawnPose,
    /// Display pose used when no display surface is known.
    pub fallback_screen_position: Vec3,
    pub fallback_screen_normal: Vec3,
    pub overlay_color: Color,
    /// Seconds the overlay stays around after completion.
    pub overlay_linger: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            duration: 8.0,
            thresholds: PhaseThresholds::default(),
            approach_distance: 0.5,
            zoom_fov: 20f32.to_radians(),
            gameplay_fov: 75f32.to_radians(),
            grain_peak: 0.6,
            desaturate_peak: 0.85,
            spawn: SpawnPose::default(),
            fallback_screen_position: Vec3::new(0.0, 1.5, -2.0),
            fallback_screen_normal: Vec3::Z,
            overlay_color: Color::BLACK,
            overlay_linger: 0.5,
        }
    }
}

impl TransitionConfig {
    /// Set the total duration in seconds.
    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = seconds.max(0.0);
        self
    }

    pub fn thresholds(mut self, thresholds: PhaseThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn approach_distance(mut self, distance: f32) -> Self {
        self.approach_distance = distance.max(0.0);
        self
    }

    /// Set the end-of-zoom field of view in degrees.
    pub fn zoom_fov(mut self, fov_degrees: f32) -> Self {
        self.zoom_fov = fov_degrees.to_radians();
        self
    }

    /// Set the post-transition field of view in degrees.
    pub fn gameplay_fov(mut self, fov_degrees: f32) -> Self {
        self.gameplay_fov = fov_degrees.to_radians();
        self
    }

    pub fn grain_peak(mut self, intensity: f32, desaturate: f32) -> Self {
        self.grain_peak = intensity;
        self.desaturate_peak = desaturate;
        self
    }

    pub fn spawn(mut self, spawn: SpawnPose) -> Self {
        self.spawn = spawn;
        self
    }

    pub fn fallback_screen(mut self, position: Vec3, normal: Vec3) -> Self {
        self.fallback_screen_position = position;
        self.fallback_screen_normal = normal;
        self
    }

    pub fn overlay(mut self, color: Color, linger: f32) -> Self {
        self.overlay_color = color;
        self.overlay_linger = linger;
        self
    }
}

/// The collaborators a transition reads and writes, borrowed for one call.
///
/// Only the first five are required. Optional pieces that are missing are
/// skipped or replaced by defaults from [`TransitionConfig`].
pub struct TransitionRig<'a> {
    pub primary_camera: &'a mut Camera,
    pub primary_scene: &'a mut SceneGraph,
    pub secondary_scene: &'a mut SceneGraph,
    pub secondary_camera: &'a mut Camera,
    pub avatar: &'a mut Avatar,
    pub display: Option<DisplaySurface>,
    /// Primary-scene entity removed at the hand-off.
    pub screen_prop: Option<Entity>,
    pub follow_camera: Option<&'a mut FollowCamera>,
    pub grain: Option<&'a mut GrainSettings>,
    pub overlay: Option<&'a mut dyn FadeOverlay>,
    /// Real window size in pixels.
    pub viewport: Option<(u32, u32)>,
}

impl<'a> TransitionRig<'a> {
    pub fn new(
        primary_camera: &'a mut Camera,
        primary_scene: &'a mut SceneGraph,
        secondary_scene: &'a mut SceneGraph,
        secondary_camera: &'a mut Camera,
        avatar: &'a mut Avatar,
    ) -> Self {
        Self {
            primary_camera,
            primary_scene,
            secondary_scene,
            secondary_camera,
            avatar,
            display: None,
            screen_prop: None,
            follow_camera: None,
            grain: None,
            overlay: None,
            viewport: None,
        }
    }

    /// Zoom towards `display`. Its mesh is removed at the hand-off unless a
    /// separate screen prop is set.
    pub fn display(mut self, display: Option<DisplaySurface>) -> Self {
        self.display = display;
        if self.screen_prop.is_none() {
            self.screen_prop = display.map(|d| d.entity);
        }
        self
    }

    pub fn screen_prop(mut self, entity: Entity) -> Self {
        self.screen_prop = Some(entity);
        self
    }

    pub fn follow_camera(mut self, follow: &'a mut FollowCamera) -> Self {
        self.follow_camera = Some(follow);
        self
    }

    pub fn grain(mut self, grain: &'a mut GrainSettings) -> Self {
        self.grain = Some(grain);
        self
    }

    pub fn overlay(mut self, overlay: &'a mut dyn FadeOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some((width, height));
        self
    }

    fn set_grain(&mut self, intensity: f32, desaturate: f32, time: f32) {
        if let Some(grain) = self.grain.as_deref_mut() {
            grain.intensity = intensity;
            grain.desaturate = desaturate;
            grain.time = time;
        }
    }

    fn set_overlay_opacity(&mut self, opacity: f32) {
        if let Some(overlay) = self.overlay.as_deref_mut() {
            overlay.set_opacity(opacity);
        }
    }
}

struct ActiveTransition {
    elapsed: f32,
    handoff: Handoff,
    start_position: Vec3,
    start_fov: f32,
    screen_position: Vec3,
    screen_normal: Vec3,
    on_complete: Option<Box<dyn FnOnce()>>,
    completion: Option<oneshot::Sender<()>>,
}

impl ActiveTransition {
    /// Place the primary camera at eased zoom progress `t`.
    ///
    /// The camera swings around the screen centre onto the normal while its
    /// distance shrinks, so it never moves away from the screen. It looks at
    /// the screen centre throughout.
    fn apply_zoom(&self, config: &TransitionConfig, camera: &mut Camera, t: f32) {
        let offset = self.start_position - self.screen_position;
        let start_distance = offset.length();
        let start_dir = offset.normalize_or(self.screen_normal);
        let swing = Quat::IDENTITY.slerp(Quat::from_rotation_arc(start_dir, self.screen_normal), t);
        let end_distance = config.approach_distance.min(start_distance);
        let distance = start_distance + (end_distance - start_distance) * t;

        camera.position = self.screen_position + swing * start_dir * distance;
        camera.look_at(self.screen_position);
        camera.fov = self.start_fov + (config.zoom_fov - self.start_fov) * t;
    }
}

/// Drives the zoom-into-the-screen hand-off from the primary to the secondary
/// scene.
///
/// The caller decides when to [`start`](Self::start) and then calls
/// [`update`](Self::update) once per frame, rendering with the returned
/// [`ActiveCamera`]. The transition cannot be cancelled; it ends by running
/// [`complete`](Self::complete), which `update` does on its own at the end.
///
/// # Example
///
/// ```ignore
/// let completion = transition.start(&mut rig, || log::info!("welcome"))?;
///
/// // In frame loop:
/// let active = transition.update(dt, &mut rig);
/// let camera = active.select(&room_camera, compositor.secondary_camera());
/// ```
pub struct CinematicTransitionController {
    config: TransitionConfig,
    active: Option<ActiveTransition>,
    active_camera: ActiveCamera,
    progress: f32,
}

impl CinematicTransitionController {
    pub fn new(config: TransitionConfig) -> Self {
        Self {
            config,
            active: None,
            active_camera: ActiveCamera::Primary,
            progress: 0.0,
        }
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    pub fn is_in_progress(&self) -> bool {
        self.active.is_some()
    }

    /// Overall progress in `[0, 1]`; stays at `1.0` after completion.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn phase(&self) -> TransitionPhase {
        match self.active {
            Some(_) => self.config.thresholds.phase(self.progress),
            None => TransitionPhase::Idle,
        }
    }

    /// Hand-off state of the running transition.
    pub fn handoff(&self) -> Option<Handoff> {
        self.active.as_ref().map(|active| active.handoff)
    }

    pub fn active_camera(&self) -> ActiveCamera {
        self.active_camera
    }

    /// Begin a transition from the primary camera's current pose.
    ///
    /// Fails, leaving the running transition untouched, if one is already in
    /// progress.
    pub fn start(
        &mut self,
        rig: &mut TransitionRig<'_>,
        on_complete: impl FnOnce() + 'static,
    ) -> Result<Completion, TransitionError> {
        if self.active.is_some() {
            log::warn!(
                "transition start ignored: already {:.0}% done",
                self.progress * 100.0
            );
            return Err(TransitionError::AlreadyInProgress {
                progress: self.progress,
            });
        }

        let (screen_position, screen_normal) = match rig.display {
            // The display may have moved since it was created.
            Some(display) => match rig.primary_scene.transform(display.entity) {
                Some(transform) => (transform.position, transform.front()),
                None => (display.position, display.normal),
            },
            None => {
                log::debug!("no display surface, zooming towards the fallback pose");
                (
                    self.config.fallback_screen_position,
                    self.config.fallback_screen_normal,
                )
            }
        };

        if let Some(overlay) = rig.overlay.as_deref_mut() {
            overlay.show(self.config.overlay_color);
        }
        if let Some(grain) = rig.grain.as_deref_mut() {
            grain.enabled = true;
            grain.intensity = 0.0;
            grain.desaturate = 0.0;
        }

        let (sender, receiver) = oneshot::channel();
        self.active = Some(ActiveTransition {
            elapsed: 0.0,
            handoff: Handoff::Pending,
            start_position: rig.primary_camera.position,
            start_fov: rig.primary_camera.fov,
            screen_position,
            screen_normal: screen_normal.normalize_or(Vec3::Z),
            on_complete: Some(Box::new(on_complete)),
            completion: Some(sender),
        });
        self.active_camera = ActiveCamera::Primary;
        self.progress = 0.0;

        log::info!("transition started ({:.1}s)", self.config.duration);
        Ok(receiver)
    }

    /// Advance the transition by `dt` seconds.
    ///
    /// Does nothing while idle. Returns the camera to render with this frame.
    pub fn update(&mut self, dt: f32, rig: &mut TransitionRig<'_>) -> ActiveCamera {
        let Some(active) = self.active.as_mut() else {
            return self.active_camera;
        };

        active.elapsed += dt.max(0.0);
        let p = if self.config.duration > 0.0 {
            (active.elapsed / self.config.duration).min(1.0)
        } else {
            1.0
        };
        self.progress = p;

        let config = &self.config;
        let (phase, local) = config.thresholds.locate(p);
        let eased = ease_in_out_cubic(local);
        let time = active.elapsed;

        match phase {
            TransitionPhase::ZoomGrain => {
                active.apply_zoom(config, rig.primary_camera, eased);
                let grain = if local > 0.5 {
                    ease_in_out_cubic((local - 0.5) * 2.0)
                } else {
                    0.0
                };
                rig.set_grain(config.grain_peak * grain, config.desaturate_peak * grain, time);
                rig.set_overlay_opacity(0.0);
            }
            TransitionPhase::Blackout => {
                if active.handoff == Handoff::Pending {
                    active.apply_zoom(config, rig.primary_camera, 1.0);
                }
                rig.set_grain(config.grain_peak, config.desaturate_peak, time);
                rig.set_overlay_opacity(eased);
                if local >= config.thresholds.handoff_at && active.handoff == Handoff::Pending {
                    hand_off(config, rig);
                    active.handoff = Handoff::Done;
                    self.active_camera = ActiveCamera::Secondary;
                }
            }
            TransitionPhase::FadeIn => {
                // A long frame can skip the hand-off window entirely.
                if active.handoff == Handoff::Pending {
                    hand_off(config, rig);
                    active.handoff = Handoff::Done;
                    self.active_camera = ActiveCamera::Secondary;
                }
                let fade = 1.0 - eased;
                rig.set_grain(config.grain_peak * fade, config.desaturate_peak * fade, time);
                rig.set_overlay_opacity(fade);
            }
            TransitionPhase::Idle => {}
        }

        log::trace!("transition {phase:?} p={p:.3}");

        if p >= 1.0 {
            self.complete(rig);
        }
        self.active_camera
    }

    /// Finish the running transition. Does nothing if none is running.
    pub fn complete(&mut self, rig: &mut TransitionRig<'_>) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        if active.handoff == Handoff::Pending {
            hand_off(&self.config, rig);
            active.handoff = Handoff::Done;
        }
        self.active_camera = ActiveCamera::Secondary;
        self.progress = 1.0;

        match rig.viewport {
            Some((width, height)) => {
                rig.secondary_camera.set_aspect_from_size(width, height);
                rig.secondary_camera.fov = self.config.gameplay_fov;
            }
            None => log::debug!("no viewport size, keeping the secondary camera projection"),
        }

        if let Some(follow) = rig.follow_camera.as_deref_mut() {
            let spawn = &self.config.spawn;
            let look_target = rig
                .secondary_scene
                .transform(rig.avatar.entity)
                .map(|transform| transform.position + spawn.look_offset)
                .unwrap_or(spawn.look_at);
            follow.snap_to(FollowPose::from_view(
                rig.secondary_camera.position,
                look_target,
            ));
            follow.fov = rig.secondary_camera.fov;
        }

        if let Some(overlay) = rig.overlay.as_deref_mut() {
            overlay.set_opacity(0.0);
            overlay.remove_after(self.config.overlay_linger);
        }
        if let Some(grain) = rig.grain.as_deref_mut() {
            grain.disable();
        }

        if let Some(on_complete) = active.on_complete.take() {
            on_complete();
        }
        if let Some(sender) = active.completion.take() {
            // The caller may have dropped the completion future.
            let _ = sender.send(());
        }
        log::info!("transition complete");
    }
}

/// The one-time switch from watching the screen to being inside it.
fn hand_off(config: &TransitionConfig, rig: &mut TransitionRig<'_>) {
    let spawn = &config.spawn;

    rig.secondary_camera.position = spawn.camera_position;
    rig.secondary_camera.up = Vec3::Y;
    rig.secondary_camera.look_at(spawn.look_at);

    if rig.avatar.scene == SceneRole::Primary {
        match rig.primary_scene.transfer(rig.avatar.entity, rig.secondary_scene) {
            Some(entity) => *rig.avatar = Avatar::new(entity, SceneRole::Secondary),
            None => log::warn!("avatar is missing from the primary scene"),
        }
    }

    let reset = rig
        .secondary_scene
        .transform(rig.avatar.entity)
        .map(|transform| transform.position(spawn.avatar_origin).rotation(Quat::IDENTITY));
    match reset {
        Some(transform) => {
            rig.secondary_scene.set_transform(rig.avatar.entity, transform);
        }
        None => log::warn!("avatar has no transform in the secondary scene"),
    }

    if let Some(prop) = rig.screen_prop {
        if !rig.primary_scene.remove(prop) {
            log::debug!("screen prop was already gone at hand-off");
        }
    }

    log::info!("camera hand-off to the secondary scene");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{MeshId, RenderMesh};
    use crate::material::Material;
    use crate::mesh::Transform;
    use crate::transition::effects::OverlayState;
    use glam::Vec2;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Fixture {
        primary_camera: Camera,
        primary_scene: SceneGraph,
        secondary_scene: SceneGraph,
        secondary_camera: Camera,
        avatar: Avatar,
        display: Option<DisplaySurface>,
        follow: FollowCamera,
        grain: GrainSettings,
        overlay: OverlayState,
        viewport: Option<(u32, u32)>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut primary_scene = SceneGraph::new("room");
            let mesh = || RenderMesh::new(MeshId(0), Material::standard(Color::WHITE));
            let screen = primary_scene.spawn_mesh(
                Transform::from_position(Vec3::new(0.0, 1.5, -2.0)).facing(Vec3::Z),
                mesh(),
            );
            let avatar = primary_scene.spawn_mesh(
                Transform::from_position(Vec3::new(3.0, 0.0, 3.0)).rotation(Quat::from_rotation_y(1.0)),
                mesh(),
            );
            Self {
                primary_camera: Camera::new()
                    .at(Vec3::new(1.0, 1.6, 3.0))
                    .looking_at(Vec3::new(0.0, 1.5, -2.0)),
                primary_scene,
                secondary_scene: SceneGraph::new("world"),
                secondary_camera: Camera::new().with_aspect(4.0 / 3.0).with_fov(50.0),
                avatar: Avatar::new(avatar, SceneRole::Primary),
                display: Some(DisplaySurface {
                    entity: screen,
                    position: Vec3::new(0.0, 1.5, -2.0),
                    normal: Vec3::Z,
                    size: Vec2::new(1.6, 1.2),
                }),
                follow: FollowCamera::new(),
                grain: GrainSettings::default(),
                overlay: OverlayState::new(),
                viewport: Some((1920, 1080)),
            }
        }

        fn rig(&mut self) -> TransitionRig<'_> {
            let mut rig = TransitionRig::new(
                &mut self.primary_camera,
                &mut self.primary_scene,
                &mut self.secondary_scene,
                &mut self.secondary_camera,
                &mut self.avatar,
            )
            .display(self.display)
            .follow_camera(&mut self.follow)
            .grain(&mut self.grain)
            .overlay(&mut self.overlay);
            if let Some((width, height)) = self.viewport {
                rig = rig.viewport(width, height);
            }
            rig
        }

        fn screen_distance(&self) -> f32 {
            let screen = self.display.map_or(Vec3::new(0.0, 1.5, -2.0), |d| d.position);
            self.primary_camera.position.distance(screen)
        }
    }

    fn controller(duration: f32) -> CinematicTransitionController {
        CinematicTransitionController::new(TransitionConfig::default().duration(duration))
    }

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
        let count = Rc::new(Cell::new(0));
        let inner = Rc::clone(&count);
        (count, move || inner.set(inner.get() + 1))
    }

    #[test]
    fn zoom_distance_never_increases() {
        let mut fx = Fixture::new();
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");

        let mut last = fx.screen_distance();
        let mut steps = 0;
        while transition.phase() == TransitionPhase::ZoomGrain {
            transition.update(0.004, &mut fx.rig());
            if transition.phase() != TransitionPhase::ZoomGrain {
                break;
            }
            let distance = fx.screen_distance();
            assert!(distance <= last + 1e-4, "{distance} > {last} at step {steps}");
            last = distance;
            steps += 1;
        }

        assert!(steps > 100);
        assert!((last - 0.5).abs() < 0.05);
        assert!((fx.primary_camera.fov - 20f32.to_radians()).abs() < 0.05);
    }

    #[test]
    fn zoom_from_behind_the_screen_still_approaches() {
        let mut fx = Fixture::new();
        fx.primary_camera = Camera::new().at(Vec3::new(0.0, 1.5, -6.0));
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");

        let mut last = fx.screen_distance();
        for _ in 0..170 {
            transition.update(0.004, &mut fx.rig());
            let distance = fx.screen_distance();
            assert!(distance <= last + 1e-4);
            last = distance;
        }
        assert!(fx.primary_camera.position.z > -2.0);
    }

    #[test]
    fn grain_builds_only_in_the_back_half_of_the_zoom() {
        let mut fx = Fixture::new();
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");
        assert!(fx.grain.enabled);

        transition.update(0.3, &mut fx.rig());
        assert_eq!(fx.grain.intensity, 0.0);
        transition.update(0.3, &mut fx.rig());
        assert!(fx.grain.intensity > 0.0 && fx.grain.intensity < 0.6);
        transition.update(0.15, &mut fx.rig());
        assert_eq!(fx.grain.intensity, 0.6);
        assert_eq!(fx.grain.desaturate, 0.85);
        assert!(fx.overlay.opacity() > 0.0);
    }

    #[test]
    fn handoff_happens_exactly_once() {
        let mut fx = Fixture::new();
        let screen = fx.display.map(|d| d.entity).expect("display set");
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");

        // Blackout local 0.95 is at p = 0.8425.
        let active = transition.update(0.845, &mut fx.rig());
        assert_eq!(transition.phase(), TransitionPhase::Blackout);
        assert_eq!(transition.handoff(), Some(Handoff::Done));
        assert_eq!(active, ActiveCamera::Secondary);
        assert_eq!(fx.avatar.scene, SceneRole::Secondary);
        assert!(fx.secondary_scene.contains(fx.avatar.entity));
        assert!(!fx.primary_scene.contains(screen));
        assert_eq!(fx.secondary_camera.position, SpawnPose::default().camera_position);
        let avatar = fx.secondary_scene.transform(fx.avatar.entity).expect("avatar moved");
        assert_eq!(avatar.position, Vec3::ZERO);
        assert_eq!(avatar.rotation, Quat::IDENTITY);

        // Anything moved after the hand-off stays where it was put.
        fx.secondary_camera.position = Vec3::new(9.0, 9.0, 9.0);
        let moved = Transform::from_position(Vec3::X);
        fx.secondary_scene.set_transform(fx.avatar.entity, moved);
        transition.update(0.001, &mut fx.rig());
        transition.update(0.001, &mut fx.rig());
        transition.complete(&mut fx.rig());

        assert_eq!(fx.secondary_camera.position, Vec3::new(9.0, 9.0, 9.0));
        assert_eq!(fx.secondary_scene.transform(fx.avatar.entity), Some(moved));
        assert_eq!(fx.secondary_scene.len(), 1);
    }

    #[test]
    fn idle_update_changes_nothing() {
        let mut fx = Fixture::new();
        let camera = fx.primary_camera;
        let mut transition = controller(1.0);

        let active = transition.update(0.5, &mut fx.rig());

        assert_eq!(active, ActiveCamera::Primary);
        assert_eq!(transition.phase(), TransitionPhase::Idle);
        assert_eq!(transition.progress(), 0.0);
        assert_eq!(fx.primary_camera, camera);
        assert_eq!(fx.grain, GrainSettings::default());
        assert_eq!(fx.overlay, OverlayState::new());
        assert_eq!(fx.avatar.scene, SceneRole::Primary);
    }

    #[test]
    fn one_second_run_completes_once() {
        let mut fx = Fixture::new();
        let mut transition = controller(1.0);
        let (count, on_complete) = counter();
        let mut completion = transition.start(&mut fx.rig(), on_complete).expect("idle");

        let mut simulated = 0.0;
        while simulated < 1.05 {
            transition.update(0.016, &mut fx.rig());
            simulated += 0.016;
        }

        assert_eq!(transition.progress(), 1.0);
        assert_eq!(count.get(), 1);
        assert!(!transition.is_in_progress());
        assert_eq!(transition.phase(), TransitionPhase::Idle);
        assert_eq!(completion.try_recv(), Ok(Some(())));
        assert!(!fx.grain.enabled);
        assert!(fx.overlay.removal_pending());
        assert_eq!(fx.overlay.opacity(), 0.0);
    }

    #[test]
    fn completion_future_resolves() {
        let mut fx = Fixture::new();
        let mut transition = controller(0.5);
        let completion = transition.start(&mut fx.rig(), || {}).expect("idle");
        transition.update(1.0, &mut fx.rig());
        assert_eq!(pollster::block_on(completion), Ok(()));
    }

    #[test]
    fn second_start_is_rejected() {
        let mut fx = Fixture::new();
        let mut transition = controller(1.0);
        let (first, first_done) = counter();
        let (second, second_done) = counter();

        let _completion = transition.start(&mut fx.rig(), first_done).expect("idle");
        transition.update(0.2, &mut fx.rig());
        let rejected = transition.start(&mut fx.rig(), second_done);

        assert!(matches!(rejected, Err(TransitionError::AlreadyInProgress { .. })));
        assert!((transition.progress() - 0.2).abs() < 1e-6);

        transition.update(1.0, &mut fx.rig());
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 0);
    }

    #[test]
    fn complete_is_idempotent() {
        let mut fx = Fixture::new();
        let mut transition = controller(1.0);
        let (count, on_complete) = counter();
        let _completion = transition.start(&mut fx.rig(), on_complete).expect("idle");

        transition.complete(&mut fx.rig());
        transition.complete(&mut fx.rig());

        assert_eq!(count.get(), 1);
        // Completing early still performs the hand-off.
        assert_eq!(fx.avatar.scene, SceneRole::Secondary);
        assert_eq!(transition.active_camera(), ActiveCamera::Secondary);
    }

    #[test]
    fn missing_display_zooms_to_fallback() {
        let mut fx = Fixture::new();
        fx.display = None;
        let config = TransitionConfig::default()
            .duration(1.0)
            .fallback_screen(Vec3::new(0.0, 2.0, -4.0), Vec3::Z);
        let mut transition = CinematicTransitionController::new(config);

        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");
        transition.update(0.7, &mut fx.rig());

        let target = Vec3::new(0.0, 2.0, -3.5);
        assert!((fx.primary_camera.position - target).length() < 1e-3);
    }

    #[test]
    fn zoom_keeps_the_screen_centre_in_view() {
        let mut fx = Fixture::new();
        fx.primary_camera = Camera::new()
            .at(Vec3::new(0.0, 1.5, 3.0))
            .looking_at(Vec3::new(1.0, 1.5, 3.0));
        let screen = Vec3::new(0.0, 1.5, -2.0);
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");

        for step in 1..14 {
            transition.update(0.05, &mut fx.rig());
            assert_eq!(transition.phase(), TransitionPhase::ZoomGrain);
            let camera = &fx.primary_camera;
            let angle = camera
                .forward
                .angle_between(screen - camera.position)
                .to_degrees();
            assert!(angle < 1.0, "{angle} degrees off at step {step}");
        }
    }

    #[test]
    fn zoom_follows_a_display_moved_after_creation() {
        let mut fx = Fixture::new();
        let screen = fx.display.map(|d| d.entity).expect("display set");
        fx.primary_scene.set_transform(
            screen,
            Transform::from_position(Vec3::new(2.0, 1.5, -2.0)).facing(Vec3::X),
        );
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");
        transition.update(0.7, &mut fx.rig());

        let target = Vec3::new(2.5, 1.5, -2.0);
        assert!((fx.primary_camera.position - target).length() < 1e-3);
    }

    #[test]
    fn complete_without_viewport_keeps_projection() {
        let mut fx = Fixture::new();
        fx.viewport = None;
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");
        transition.update(2.0, &mut fx.rig());

        assert_eq!(fx.secondary_camera.aspect, 4.0 / 3.0);
        assert_eq!(fx.secondary_camera.fov, 50f32.to_radians());
    }

    #[test]
    fn complete_resyncs_projection_to_viewport() {
        let mut fx = Fixture::new();
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");
        transition.update(2.0, &mut fx.rig());

        assert_eq!(fx.secondary_camera.aspect, 1920.0 / 1080.0);
        assert_eq!(fx.secondary_camera.fov, 75f32.to_radians());
    }

    #[test]
    fn follow_camera_is_synced_without_snap() {
        let mut fx = Fixture::new();
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");
        transition.update(2.0, &mut fx.rig());

        let spawn = SpawnPose::default();
        assert_eq!(fx.follow.target, spawn.avatar_origin + spawn.look_offset);
        assert!(fx.follow.is_settled());

        let before = fx.secondary_camera.position;
        fx.follow.update(0.016);
        fx.follow.apply(&mut fx.secondary_camera);
        assert!((fx.secondary_camera.position - before).length() < 1e-4);
    }

    #[test]
    fn restart_after_completion_starts_fresh() {
        let mut fx = Fixture::new();
        let mut transition = controller(1.0);
        let _completion = transition.start(&mut fx.rig(), || {}).expect("idle");
        transition.update(2.0, &mut fx.rig());

        let _restarted = transition.start(&mut fx.rig(), || {}).expect("previous run finished");
        assert_eq!(transition.progress(), 0.0);
        assert_eq!(transition.handoff(), Some(Handoff::Pending));
        assert_eq!(transition.active_camera(), ActiveCamera::Primary);
    }
}
