//! The renderer interface the compositor draws through.
//!
//! [`SceneRenderer`] models a stateful renderer in the style of a
//! render-to-texture capable immediate API: it has a currently bound target, an
//! output size and a clear color, all of which a caller can snapshot and put
//! back. [`GpuRenderer`](crate::GpuRenderer) is the wgpu implementation.

use crate::camera::Camera;
use crate::color::Color;
use crate::ecs::{MeshId, TextureId};
use crate::scene::SceneGraph;
use crate::simplify::SimplifyError;
use thiserror::Error;

/// Identifier of an offscreen render target owned by a renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderTargetId(pub(crate) u32);

/// An offscreen color buffer that can be rendered into and sampled as a texture.
///
/// The `texture` handle stays valid across [`SceneRenderer::resize_render_target`],
/// so materials referencing it never point at a stale buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct RenderTarget {
    pub id: RenderTargetId,
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
}

/// The parts of renderer state an offscreen pass changes and must put back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererState {
    /// Bound render target; `None` is the renderer's default frame output.
    pub target: Option<RenderTargetId>,
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    /// A material needs more simultaneously bound textures than the GPU allows.
    #[error("material needs {required} texture units but the device allows {limit}")]
    TextureUnitBudget { required: u32, limit: u32 },
    #[error("render target {0:?} does not exist")]
    MissingTarget(RenderTargetId),
    #[error("mesh {0:?} is not registered")]
    MissingMesh(MeshId),
    #[error("texture {0:?} is not registered")]
    MissingTexture(TextureId),
    #[error("failed to acquire surface texture: {0}")]
    Surface(String),
    /// The compositor's render target was already released.
    #[error("render surface has been disposed")]
    Disposed,
    #[error(transparent)]
    Simplify(#[from] SimplifyError),
}

impl RenderError {
    /// Whether this failure only degrades image quality and the frame can go on.
    pub fn is_budget_overflow(&self) -> bool {
        matches!(self, RenderError::TextureUnitBudget { .. })
    }
}

/// A renderer capable of drawing a [`SceneGraph`] into offscreen targets.
pub trait SceneRenderer {
    /// Current target, size and clear color.
    fn state(&self) -> RendererState;

    /// Bind `target`, or the default frame output for `None`.
    fn set_render_target(&mut self, target: Option<RenderTargetId>);

    /// Set the output size (viewport) used by subsequent renders.
    fn set_size(&mut self, width: u32, height: u32);

    fn set_clear_color(&mut self, color: Color);

    /// Clear the bound target's color and depth.
    fn clear(&mut self);

    /// Draw every renderable entity of `scene` as seen from `camera` into the bound target.
    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> Result<(), RenderError>;

    fn create_render_target(&mut self, width: u32, height: u32, label: &str) -> RenderTarget;

    /// Reallocate the storage behind `target` at a new size, keeping its handles.
    fn resize_render_target(&mut self, target: &mut RenderTarget, width: u32, height: u32);

    fn dispose_render_target(&mut self, target: RenderTarget);

    /// A shared 1×1 quad facing +Z, used for flat display surfaces.
    fn unit_quad(&mut self) -> MeshId;

    /// Maximum number of textures a single draw may sample.
    fn texture_unit_limit(&self) -> u32;

    /// Put back a state captured with [`state`](Self::state).
    fn restore_state(&mut self, state: RendererState) {
        self.set_render_target(state.target);
        self.set_size(state.width, state.height);
        self.set_clear_color(state.clear_color);
    }
}
