//! # Telescreen
//!
//! **A screen inside your scene, and a way to step through it.**
//!
//! Telescreen renders a second 3D world into an offscreen texture and shows it
//! on a flat display mesh in the main scene. A cinematic transition then flies
//! the camera into that display, blacks out, and hands the player over to the
//! world on the other side.
//!
//! ## Quick Start
//!
//! ```ignore
//! use telescreen::*;
//!
//! let mut renderer = GpuRenderer::new(GpuContext::new(window)?);
//! let mut room = SceneGraph::new("Room");
//! let world = SceneGraph::new("Inside");
//!
//! let mut compositor = RenderSurfaceCompositor::new(
//!     &mut renderer,
//!     CompositorConfig::default().resolution(640, 480),
//!     world,
//!     Camera::new().at(Vec3::new(0.0, 3.0, 6.0)).looking_at(Vec3::Y),
//! );
//! compositor.create_display_surface(
//!     &mut renderer,
//!     &mut room,
//!     Vec3::new(0.0, 1.5, -2.0),
//!     Vec2::new(1.6, 1.2),
//!     Vec3::Z,
//! )?;
//!
//! // Every tick: the inner world first, then the room that shows it.
//! compositor.render_frame(&mut renderer, dt, elapsed)?;
//! renderer.set_render_target(None);
//! renderer.clear();
//! renderer.render(&room, &room_camera)?;
//! ```
//!
//! ## Pieces
//!
//! - [`RenderSurfaceCompositor`] owns the secondary scene and its render target,
//!   and temporarily simplifies materials so the offscreen pass stays within
//!   the device's texture-unit budget.
//! - [`CinematicTransitionController`] drives the zoom, blackout and fade-in,
//!   and moves the avatar between scenes at the hand-off.
//! - [`SceneRenderer`] is the seam between both and the GPU. [`GpuRenderer`]
//!   implements it with wgpu.

mod camera;
mod color;
mod compositor;
mod ecs;
mod follow_camera;
mod gpu;
mod gpu_renderer;
mod grain_pass;
mod material;
mod mesh;
mod overlay_pass;
mod renderer;
mod scene;
mod scene_pass;
mod simplify;
mod texture;
mod transition;

#[cfg(test)]
mod testing;

pub use camera::Camera;
pub use color::Color;
pub use compositor::{CompositorConfig, DisplaySurface, FrameOutcome, RenderSurfaceCompositor};
pub use follow_camera::{FollowCamera, FollowPose};
pub use gpu::{GpuContext, GpuError};
pub use gpu_renderer::GpuRenderer;
pub use grain_pass::GrainPass;
pub use material::{MapSlot, Material, MaterialKind};
pub use mesh::{Mesh, Transform, Vertex3d};
pub use overlay_pass::OverlayPass;
pub use renderer::{RenderError, RenderTarget, RenderTargetId, RendererState, SceneRenderer};
pub use scene::{Avatar, SceneGraph, SceneRole};
pub use scene_pass::{DEPTH_FORMAT, SceneDraw, ScenePass};
pub use simplify::{MaterialSimplificationCache, MaterialSnapshot, SimplifiedScene, SimplifyError};
pub use texture::Texture;
pub use transition::{
    ActiveCamera, BLACKOUT_END, CinematicTransitionController, Completion, FadeOverlay,
    GrainSettings, HANDOFF_AT, Handoff, OverlayState, PhaseThresholds, SpawnPose,
    TransitionConfig, TransitionError, TransitionPhase, TransitionRig, ZOOM_END,
    ease_in_out_cubic,
};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3};

// ECS support and type-safe handles
pub use ecs::{MeshId, RenderMesh, TextureId};
pub use hecs::{Entity, World};
