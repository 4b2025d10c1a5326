//! Screen-within-a-scene compositing.
//!
//! A [`RenderSurfaceCompositor`] renders a secondary scene into an offscreen
//! target of fixed resolution every frame and exposes the result as a texture
//! on a flat display mesh in the primary scene. Typical uses are a TV in a room
//! showing a live game world, a security monitor, or a portal.
//!
//! Each offscreen render is bracketed by material simplification so the
//! secondary scene stays under the device's texture-unit limit, and the
//! renderer's target, size and clear color are put back afterwards so the
//! primary render path never notices the offscreen pass.
//!
//! # Example
//!
//! ```ignore
//! use telescreen::*;
//!
//! let mut compositor = RenderSurfaceCompositor::new(
//!     &mut renderer,
//!     CompositorConfig::default().resolution(640, 480),
//!     world_scene,
//!     Camera::new().at(Vec3::new(0.0, 3.0, 8.0)).looking_at(Vec3::ZERO),
//! );
//! compositor.create_display_surface(
//!     &mut renderer,
//!     &mut room,
//!     Vec3::new(0.0, 1.5, -2.0),
//!     Vec2::new(1.6, 1.2),
//!     Vec3::Z,
//! )?;
//!
//! // Every frame, before drawing the room:
//! compositor.render_frame(&mut renderer, dt, elapsed)?;
//! renderer.render(&room, &room_camera)?;
//! ```

use crate::camera::Camera;
use crate::color::Color;
use crate::ecs::RenderMesh;
use crate::material::Material;
use crate::mesh::Transform;
use crate::renderer::{RenderError, RenderTarget, SceneRenderer};
use crate::scene::SceneGraph;
use crate::simplify::MaterialSimplificationCache;
use glam::{Vec2, Vec3};
use hecs::Entity;

/// Resolution and appearance of the offscreen surface.
#[derive(Clone, Debug)]
pub struct CompositorConfig {
    /// Offscreen width in pixels, independent of the window.
    pub width: u32,
    /// Offscreen height in pixels.
    pub height: u32,
    /// Background of the secondary scene.
    pub clear_color: Color,
    /// Debug label for the render target.
    pub label: String,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            clear_color: Color::rgb(0.02, 0.02, 0.04),
            label: "Render Surface".to_owned(),
        }
    }
}

impl CompositorConfig {
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    pub fn clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// The display mesh placed in the primary scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplaySurface {
    pub entity: Entity,
    /// World-space centre of the surface.
    pub position: Vec3,
    /// Unit normal the surface faces along.
    pub normal: Vec3,
    pub size: Vec2,
}

/// How an offscreen frame turned out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    /// The render exceeded the texture-unit budget; the surface shows whatever
    /// the renderer managed to produce.
    Degraded,
}

/// Renders a secondary scene into a texture shown inside the primary scene.
pub struct RenderSurfaceCompositor {
    config: CompositorConfig,
    target: Option<RenderTarget>,
    display: Option<DisplaySurface>,
    secondary_scene: SceneGraph,
    secondary_camera: Camera,
    cache: MaterialSimplificationCache,
    frame_generation: u64,
    last_elapsed: f32,
}

impl RenderSurfaceCompositor {
    /// Allocate the offscreen target and take ownership of the secondary scene.
    pub fn new(
        renderer: &mut dyn SceneRenderer,
        config: CompositorConfig,
        secondary_scene: SceneGraph,
        mut secondary_camera: Camera,
    ) -> Self {
        let target = renderer.create_render_target(config.width, config.height, &config.label);
        secondary_camera.set_aspect_from_size(target.width, target.height);
        log::debug!(
            "render surface '{}' allocated at {}x{}",
            config.label,
            target.width,
            target.height
        );

        Self {
            config,
            target: Some(target),
            display: None,
            secondary_scene,
            secondary_camera,
            cache: MaterialSimplificationCache::new(),
            frame_generation: 0,
            last_elapsed: 0.0,
        }
    }

    /// Build the flat display mesh in `primary_scene`, textured with the
    /// offscreen image.
    ///
    /// The quad is scaled to `size` and oriented so its front faces `normal`.
    /// A previously created surface is removed first.
    pub fn create_display_surface(
        &mut self,
        renderer: &mut dyn SceneRenderer,
        primary_scene: &mut SceneGraph,
        position: Vec3,
        size: Vec2,
        normal: Vec3,
    ) -> Result<Entity, RenderError> {
        let texture = self.target.as_ref().ok_or(RenderError::Disposed)?.texture;

        if let Some(old) = self.display.take() {
            primary_scene.remove(old.entity);
        }

        let normal = normal.normalize_or(Vec3::Z);
        let transform = Transform::new()
            .position(position)
            .facing(normal)
            .scale(Vec3::new(size.x, size.y, 1.0));
        let material = Material::basic(Color::WHITE).with_map(texture);
        let entity = primary_scene.spawn_mesh(
            transform,
            RenderMesh::new(renderer.unit_quad(), material),
        );

        self.display = Some(DisplaySurface {
            entity,
            position,
            normal,
            size,
        });
        Ok(entity)
    }

    /// Render the secondary scene into the offscreen target.
    ///
    /// Must run before the primary scene is drawn in the same tick. A
    /// texture-unit budget overflow is not an error: it is logged and reported
    /// as [`FrameOutcome::Degraded`]. Every other render failure is returned
    /// after materials and renderer state have been restored. The secondary
    /// camera's aspect matches the target only while the pass runs.
    pub fn render_frame(
        &mut self,
        renderer: &mut dyn SceneRenderer,
        _dt: f32,
        elapsed: f32,
    ) -> Result<FrameOutcome, RenderError> {
        let target = self.target.as_ref().ok_or(RenderError::Disposed)?;
        let (width, height) = (target.width, target.height);

        let saved = renderer.state();
        renderer.set_render_target(Some(target.id));
        renderer.set_size(width, height);
        renderer.set_clear_color(self.config.clear_color);
        renderer.clear();

        // The same camera may be the full-screen view after a hand-off.
        let saved_aspect = self.secondary_camera.aspect;
        self.secondary_camera.set_aspect_from_size(width, height);

        let result = match self.cache.simplify(&mut self.secondary_scene) {
            Ok(simplified) => {
                let result = renderer.render(&simplified, &self.secondary_camera);
                simplified.restore();
                result
            }
            Err(err) => Err(err.into()),
        };

        renderer.restore_state(saved);
        self.secondary_camera.aspect = saved_aspect;

        let outcome = match result {
            Ok(()) => FrameOutcome::Rendered,
            Err(err) if err.is_budget_overflow() => {
                log::warn!("render surface degraded: {err}");
                FrameOutcome::Degraded
            }
            Err(err) => return Err(err),
        };

        self.frame_generation += 1;
        self.last_elapsed = elapsed;
        log::trace!(
            "render surface frame {} at {elapsed:.3}s: {outcome:?}",
            self.frame_generation
        );
        Ok(outcome)
    }

    /// Reallocate the offscreen target at a new resolution.
    ///
    /// The texture handle survives the resize, so the display material keeps
    /// sampling the live image.
    pub fn resize(&mut self, renderer: &mut dyn SceneRenderer, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("ignoring render surface resize to {width}x{height}");
            return;
        }
        let Some(target) = self.target.as_mut() else {
            log::warn!("resize called on a disposed render surface");
            return;
        };

        renderer.resize_render_target(target, width, height);
        self.secondary_camera.set_aspect_from_size(width, height);
        log::debug!("render surface resized to {width}x{height}");
    }

    /// Release the render target and remove the display mesh. Safe to call twice.
    pub fn dispose(&mut self, renderer: &mut dyn SceneRenderer, primary_scene: &mut SceneGraph) {
        if let Some(target) = self.target.take() {
            renderer.dispose_render_target(target);
        }
        if let Some(display) = self.display.take() {
            if !primary_scene.remove(display.entity) {
                log::debug!("display surface was already removed from the primary scene");
            }
        }
    }

    pub fn display_surface(&self) -> Option<&DisplaySurface> {
        self.display.as_ref()
    }

    pub fn render_target(&self) -> Option<&RenderTarget> {
        self.target.as_ref()
    }

    /// Current offscreen resolution, `(0, 0)` once disposed.
    pub fn screen_size(&self) -> (u32, u32) {
        self.target
            .as_ref()
            .map_or((0, 0), |target| (target.width, target.height))
    }

    pub fn secondary_scene(&self) -> &SceneGraph {
        &self.secondary_scene
    }

    pub fn secondary_scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.secondary_scene
    }

    pub fn secondary_camera(&self) -> &Camera {
        &self.secondary_camera
    }

    pub fn secondary_camera_mut(&mut self) -> &mut Camera {
        &mut self.secondary_camera
    }

    /// Borrow the secondary scene and camera at the same time.
    pub fn secondary_parts_mut(&mut self) -> (&mut SceneGraph, &mut Camera) {
        (&mut self.secondary_scene, &mut self.secondary_camera)
    }

    /// Number of offscreen frames that completed, degraded ones included.
    pub fn frame_generation(&self) -> u64 {
        self.frame_generation
    }

    pub fn last_elapsed(&self) -> f32 {
        self.last_elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{MeshId, TextureId};
    use crate::material::MapSlot;
    use crate::testing::RecordingRenderer;

    fn textured(maps: usize) -> Material {
        let mut material = Material::standard(Color::WHITE).with_map(TextureId(1));
        for (i, slot) in MapSlot::ALL.iter().take(maps).enumerate() {
            material = material.with_slot(*slot, TextureId(10 + i));
        }
        material
    }

    fn setup(renderer: &mut RecordingRenderer, material: Material) -> (RenderSurfaceCompositor, Entity) {
        let mut scene = SceneGraph::new("secondary");
        let entity = scene.spawn_mesh(Transform::new(), RenderMesh::new(MeshId(1), material));
        let compositor = RenderSurfaceCompositor::new(
            renderer,
            CompositorConfig::default().resolution(320, 240),
            scene,
            Camera::new(),
        );
        (compositor, entity)
    }

    fn material_of(compositor: &RenderSurfaceCompositor, entity: Entity) -> Material {
        compositor
            .secondary_scene()
            .world()
            .get::<&RenderMesh>(entity)
            .map(|mesh| mesh.materials[0].clone())
            .expect("entity has a mesh")
    }

    #[test]
    fn six_extended_maps_survive_a_frame() {
        let mut renderer = RecordingRenderer::new(4);
        let original = textured(6);
        let (mut compositor, entity) = setup(&mut renderer, original.clone());
        let before = renderer.state();

        let outcome = compositor.render_frame(&mut renderer, 0.016, 0.016);

        assert_eq!(outcome, Ok(FrameOutcome::Rendered));
        // The renderer only ever saw the stripped material.
        assert_eq!(renderer.renders[0].max_texture_units, 1);
        let restored = material_of(&compositor, entity);
        for slot in MapSlot::ALL.iter().take(6) {
            assert_eq!(restored.slot(*slot), original.slot(*slot));
            assert!(restored.slot(*slot).is_some());
        }
        assert!(compositor.cache.is_empty());
        assert_eq!(renderer.state(), before);
    }

    #[test]
    fn offscreen_pass_uses_fixed_resolution() {
        let mut renderer = RecordingRenderer::new(16);
        let (mut compositor, _) = setup(&mut renderer, textured(0));

        compositor
            .render_frame(&mut renderer, 0.016, 0.016)
            .expect("frame renders");

        let record = &renderer.renders[0];
        let target = compositor.render_target().expect("target allocated");
        assert_eq!(record.target, Some(target.id));
        assert_eq!((record.width, record.height), (320, 240));
        assert_eq!(record.camera_aspect, 320.0 / 240.0);
        assert_eq!(renderer.clears, vec![Some(target.id)]);
        assert_eq!(renderer.state().width, 1280);
        assert_eq!(compositor.frame_generation(), 1);
    }

    #[test]
    fn budget_overflow_degrades_and_restores() {
        let mut renderer = RecordingRenderer::new(0);
        let original = textured(3);
        let (mut compositor, entity) = setup(&mut renderer, original.clone());
        let before = renderer.state();

        let outcome = compositor.render_frame(&mut renderer, 0.016, 1.0);

        assert_eq!(outcome, Ok(FrameOutcome::Degraded));
        assert_eq!(renderer.state(), before);
        assert_eq!(
            MapSlot::ALL.map(|slot| material_of(&compositor, entity).slot(slot)),
            MapSlot::ALL.map(|slot| original.slot(slot))
        );
        assert_eq!(compositor.frame_generation(), 1);
        assert_eq!(compositor.last_elapsed(), 1.0);
    }

    #[test]
    fn other_failures_propagate_after_restore() {
        let mut renderer = RecordingRenderer::new(16);
        let (mut compositor, entity) = setup(&mut renderer, textured(4));
        let before = renderer.state();
        renderer.fail_next_render(RenderError::MissingMesh(MeshId(1)));

        let outcome = compositor.render_frame(&mut renderer, 0.016, 0.016);

        assert_eq!(outcome, Err(RenderError::MissingMesh(MeshId(1))));
        assert_eq!(renderer.state(), before);
        assert!(compositor.cache.is_empty());
        assert_eq!(material_of(&compositor, entity).extended_map_count(), 4);
        assert_eq!(compositor.frame_generation(), 0);
    }

    #[test]
    fn resize_then_render_matches_new_size() {
        let mut renderer = RecordingRenderer::new(16);
        let (mut compositor, _) = setup(&mut renderer, textured(0));

        compositor.resize(&mut renderer, 800, 200);
        compositor
            .render_frame(&mut renderer, 0.016, 0.016)
            .expect("frame renders");

        let id = compositor.render_target().expect("target allocated").id;
        assert_eq!(renderer.target_size(id), Some((800, 200)));
        assert_eq!(compositor.screen_size(), (800, 200));
        assert_eq!(compositor.secondary_camera().aspect, 4.0);
        assert_eq!((renderer.renders[0].width, renderer.renders[0].height), (800, 200));
    }

    #[test]
    fn offscreen_aspect_does_not_leak_into_the_camera() {
        let mut renderer = RecordingRenderer::new(16);
        let (mut compositor, _) = setup(&mut renderer, textured(0));
        compositor.secondary_camera_mut().aspect = 16.0 / 9.0;

        compositor
            .render_frame(&mut renderer, 0.016, 0.016)
            .expect("frame renders");

        assert_eq!(renderer.renders[0].camera_aspect, 320.0 / 240.0);
        assert_eq!(compositor.secondary_camera().aspect, 16.0 / 9.0);
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let mut renderer = RecordingRenderer::new(16);
        let (mut compositor, _) = setup(&mut renderer, textured(0));
        compositor.resize(&mut renderer, 0, 100);
        assert_eq!(compositor.screen_size(), (320, 240));
    }

    #[test]
    fn display_material_tracks_target_texture() {
        let mut renderer = RecordingRenderer::new(16);
        let (mut compositor, _) = setup(&mut renderer, textured(0));
        let mut room = SceneGraph::new("room");

        let screen = compositor
            .create_display_surface(
                &mut renderer,
                &mut room,
                Vec3::new(0.0, 1.0, -2.0),
                Vec2::new(1.6, 0.9),
                Vec3::X * 3.0,
            )
            .expect("target allocated");
        compositor.resize(&mut renderer, 1024, 576);

        let texture = compositor.render_target().expect("target allocated").texture;
        let map = room
            .world()
            .get::<&RenderMesh>(screen)
            .ok()
            .and_then(|mesh| mesh.primary_material().and_then(|m| m.map));
        assert_eq!(map, Some(texture));

        let transform = room.transform(screen).expect("screen has a transform");
        assert!((transform.front() - Vec3::X).length() < 1e-5);
        assert_eq!(transform.scale, Vec3::new(1.6, 0.9, 1.0));
        assert_eq!(compositor.display_surface().map(|d| d.normal), Some(Vec3::X));
    }

    #[test]
    fn creating_a_second_surface_replaces_the_first() {
        let mut renderer = RecordingRenderer::new(16);
        let (mut compositor, _) = setup(&mut renderer, textured(0));
        let mut room = SceneGraph::new("room");

        let first = compositor
            .create_display_surface(&mut renderer, &mut room, Vec3::ZERO, Vec2::ONE, Vec3::Z)
            .expect("target allocated");
        let second = compositor
            .create_display_surface(&mut renderer, &mut room, Vec3::Y, Vec2::ONE, Vec3::Z)
            .expect("target allocated");

        assert!(!room.contains(first));
        assert!(room.contains(second));
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut renderer = RecordingRenderer::new(16);
        let (mut compositor, _) = setup(&mut renderer, textured(0));
        let mut room = SceneGraph::new("room");
        let screen = compositor
            .create_display_surface(&mut renderer, &mut room, Vec3::ZERO, Vec2::ONE, Vec3::Z)
            .expect("target allocated");

        compositor.dispose(&mut renderer, &mut room);
        compositor.dispose(&mut renderer, &mut room);

        assert_eq!(renderer.disposed.len(), 1);
        assert_eq!(renderer.live_targets(), 0);
        assert!(!room.contains(screen));
        assert!(compositor.display_surface().is_none());
        assert_eq!(
            compositor.render_frame(&mut renderer, 0.016, 0.016),
            Err(RenderError::Disposed)
        );
    }
}
