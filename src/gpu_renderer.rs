//! The wgpu implementation of [`SceneRenderer`].
//!
//! [`GpuRenderer`] owns the [`GpuContext`], every registered mesh and texture,
//! and the offscreen render targets. The "default" target (`None`) is a
//! viewport-sized frame texture rather than the swapchain image, so post
//! passes such as [`GrainPass`](crate::GrainPass) can read the finished frame
//! before it is presented.
//!
//! Every `clear` and `render` call records and submits its own command buffer;
//! the caller never handles encoders for scene drawing.

use crate::camera::Camera;
use crate::color::Color;
use crate::ecs::{MeshId, RenderMesh, TextureId};
use crate::gpu::GpuContext;
use crate::material::MaterialKind;
use crate::mesh::{Mesh, Transform};
use crate::renderer::{RenderError, RenderTarget, RenderTargetId, RendererState, SceneRenderer};
use crate::scene::SceneGraph;
use crate::scene_pass::{SceneDraw, ScenePass};
use crate::texture::Texture;
use std::collections::HashMap;

/// Textures indexed by [`TextureId`].
///
/// Replacing a texture keeps its slot, and freed slots are never reused, so a
/// handle either finds its texture or nothing.
struct TextureSlots<T> {
    slots: Vec<Option<T>>,
}

impl<T> TextureSlots<T> {
    fn new() -> Self {
        Self { slots: Vec::new() }
    }

    fn insert(&mut self, value: T) -> TextureId {
        self.slots.push(Some(value));
        TextureId(self.slots.len() - 1)
    }

    fn replace(&mut self, id: TextureId, value: T) {
        match self.slots.get_mut(id.0) {
            Some(slot) => *slot = Some(value),
            None => log::warn!("replacing unknown texture {id:?}"),
        }
    }

    fn remove(&mut self, id: TextureId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            *slot = None;
        }
    }

    fn get(&self, id: TextureId) -> Option<&T> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.len()
    }
}

struct GpuTarget {
    texture: TextureId,
    #[allow(dead_code)]
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// Renders [`SceneGraph`]s with wgpu.
///
/// # Example
///
/// ```ignore
/// let mut renderer = GpuRenderer::new(GpuContext::new(window)?);
/// let cube = renderer.add_mesh(Mesh::cube(renderer.gpu()));
/// let bricks = renderer.add_texture(Texture::noise(renderer.gpu(), 64, 1, Color::rgb(0.6, 0.3, 0.2), "Bricks"));
///
/// renderer.set_render_target(None);
/// renderer.clear();
/// renderer.render(&scene, &camera)?;
/// ```
pub struct GpuRenderer {
    gpu: GpuContext,
    scene_pass: ScenePass,
    meshes: Vec<Mesh>,
    textures: TextureSlots<Texture>,
    targets: HashMap<RenderTargetId, GpuTarget>,
    frame: GpuTarget,
    next_target: u32,
    quad: Option<MeshId>,
    state: RendererState,
    reserved_texture_units: u32,
    time: f32,
}

impl GpuRenderer {
    pub fn new(gpu: GpuContext) -> Self {
        let scene_pass = ScenePass::new(&gpu);
        let mut textures = TextureSlots::new();
        let frame = Self::allocate_target(&gpu, &mut textures, gpu.width(), gpu.height(), "Frame");
        let state = RendererState {
            target: None,
            width: gpu.width(),
            height: gpu.height(),
            clear_color: Color::BLACK,
        };
        log::debug!(
            "renderer ready, {} texture units per draw",
            gpu.texture_unit_limit()
        );

        Self {
            gpu,
            scene_pass,
            meshes: Vec::new(),
            textures,
            targets: HashMap::new(),
            frame,
            next_target: 0,
            quad: None,
            state,
            reserved_texture_units: 0,
            time: 0.0,
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Register a mesh and get a handle for [`RenderMesh`].
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    /// Register a texture and get a handle for materials.
    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.insert(texture)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// The viewport-sized texture the default target renders into.
    pub fn frame_texture(&self) -> Option<&Texture> {
        self.texture(self.frame.texture)
    }

    /// Texture units kept free for the pipeline's own bindings.
    ///
    /// Materials are checked against the device limit minus this amount.
    pub fn set_reserved_texture_units(&mut self, units: u32) {
        self.reserved_texture_units = units;
    }

    /// Seconds passed to shaders for animation.
    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// Resize the window surface and the frame texture.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.resize(width, height);
        Self::reallocate_target(&self.gpu, &mut self.textures, &mut self.frame, width, height, "Frame");
        if self.state.target.is_none() {
            self.state.width = width;
            self.state.height = height;
        }
    }

    fn allocate_target(
        gpu: &GpuContext,
        textures: &mut TextureSlots<Texture>,
        width: u32,
        height: u32,
        label: &str,
    ) -> GpuTarget {
        let color = Texture::render_target(gpu, width, height, label);
        let (depth, depth_view) = ScenePass::create_depth_texture(gpu, width, height);
        GpuTarget {
            texture: textures.insert(color),
            depth,
            depth_view,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Swap in new color and depth textures, keeping the target's texture slot.
    fn reallocate_target(
        gpu: &GpuContext,
        textures: &mut TextureSlots<Texture>,
        target: &mut GpuTarget,
        width: u32,
        height: u32,
        label: &str,
    ) {
        let color = Texture::render_target(gpu, width, height, label);
        let (depth, depth_view) = ScenePass::create_depth_texture(gpu, width, height);
        textures.replace(target.texture, color);
        target.depth = depth;
        target.depth_view = depth_view;
        target.width = width.max(1);
        target.height = height.max(1);
    }

    fn bound_target(&self) -> Result<&GpuTarget, RenderError> {
        match self.state.target {
            None => Ok(&self.frame),
            Some(id) => self.targets.get(&id).ok_or(RenderError::MissingTarget(id)),
        }
    }

    fn texture_or_missing(&self, id: TextureId) -> Result<&Texture, RenderError> {
        self.texture(id).ok_or(RenderError::MissingTexture(id))
    }
}

impl SceneRenderer for GpuRenderer {
    fn state(&self) -> RendererState {
        self.state
    }

    fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        self.state.target = target;
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.state.width = width;
        self.state.height = height;
    }

    fn set_clear_color(&mut self, color: Color) {
        self.state.clear_color = color;
    }

    fn clear(&mut self) {
        let target = match self.bound_target() {
            Ok(target) => target,
            Err(err) => {
                log::warn!("clear skipped: {err}");
                return;
            }
        };
        let Some(color) = self.texture(target.texture) else {
            log::warn!("clear skipped: target texture {:?} is gone", target.texture);
            return;
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.state.clear_color.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Draws every entity with a [`Transform`] and a [`RenderMesh`].
    ///
    /// Meshes whose material needs more texture units than the budget allows
    /// are skipped; the rest of the scene is still drawn and the overflow is
    /// reported afterwards.
    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> Result<(), RenderError> {
        let target = self.bound_target()?;
        let color_target = self.texture_or_missing(target.texture)?;
        let limit = self.texture_unit_limit();

        let mut query = scene.world().query::<(&Transform, &RenderMesh)>();
        let mut draws = Vec::new();
        let mut overflow: Option<RenderError> = None;
        for (_, (transform, render_mesh)) in query.iter() {
            let Some(material) = render_mesh.primary_material() else {
                continue;
            };
            let required = render_mesh
                .materials
                .iter()
                .map(|m| m.texture_units())
                .max()
                .unwrap_or(0);
            if required > limit {
                overflow.get_or_insert(RenderError::TextureUnitBudget { required, limit });
                continue;
            }

            let mesh = self
                .meshes
                .get(render_mesh.mesh.0)
                .ok_or(RenderError::MissingMesh(render_mesh.mesh))?;
            let texture = material
                .map
                .map(|id| self.texture_or_missing(id))
                .transpose()?;

            draws.push(SceneDraw {
                mesh,
                transform: *transform,
                color: material.color,
                texture,
                unlit: material.kind == MaterialKind::Basic,
                emissive: material
                    .emissive_map
                    .map_or(0.0, |_| 0.2 * material.emissive_intensity),
            });
        }

        let width = self.state.width.clamp(1, target.width);
        let height = self.state.height.clamp(1, target.height);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            self.scene_pass
                .render(&self.gpu, &mut pass, camera, self.time, &draws);
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        match overflow {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn create_render_target(&mut self, width: u32, height: u32, label: &str) -> RenderTarget {
        let target = Self::allocate_target(&self.gpu, &mut self.textures, width, height, label);
        let id = RenderTargetId(self.next_target);
        self.next_target += 1;
        let handle = RenderTarget {
            id,
            texture: target.texture,
            width: target.width,
            height: target.height,
        };
        self.targets.insert(id, target);
        handle
    }

    fn resize_render_target(&mut self, target: &mut RenderTarget, width: u32, height: u32) {
        let Some(gpu_target) = self.targets.get_mut(&target.id) else {
            log::warn!("resize of unknown render target {:?}", target.id);
            return;
        };

        let label = format!("Render Target {}", target.id.0);
        // Same slot, so every material holding the handle sees the new texture.
        Self::reallocate_target(&self.gpu, &mut self.textures, gpu_target, width, height, &label);

        target.width = gpu_target.width;
        target.height = gpu_target.height;
    }

    fn dispose_render_target(&mut self, target: RenderTarget) {
        if let Some(gpu_target) = self.targets.remove(&target.id) {
            self.textures.remove(gpu_target.texture);
        }
        if self.state.target == Some(target.id) {
            self.state.target = None;
        }
    }

    fn unit_quad(&mut self) -> MeshId {
        if let Some(quad) = self.quad {
            return quad;
        }
        let mesh = Mesh::quad(&self.gpu);
        let quad = self.add_mesh(mesh);
        self.quad = Some(quad);
        quad
    }

    fn texture_unit_limit(&self) -> u32 {
        self.gpu
            .texture_unit_limit()
            .saturating_sub(self.reserved_texture_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_a_texture_keeps_its_slot() {
        let mut slots = TextureSlots::new();
        let frame = slots.insert("frame 800x600");
        let other = slots.insert("bricks");

        for size in ["frame 1024x768", "frame 1280x720", "frame 640x480"] {
            slots.replace(frame, size);
        }

        assert_eq!(slots.len(), 2);
        assert_eq!(slots.get(frame), Some(&"frame 640x480"));
        assert_eq!(slots.get(other), Some(&"bricks"));
    }

    #[test]
    fn removed_slots_are_not_reused() {
        let mut slots = TextureSlots::new();
        let target = slots.insert(1);
        slots.remove(target);
        let next = slots.insert(2);

        assert_ne!(target, next);
        assert_eq!(slots.get(target), None);
        assert_eq!(slots.get(next), Some(&2));
    }
}
