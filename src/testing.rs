//! Test doubles shared by the unit tests.

use crate::camera::Camera;
use crate::color::Color;
use crate::ecs::{MeshId, RenderMesh, TextureId};
use crate::renderer::{RenderError, RenderTarget, RenderTargetId, RendererState, SceneRenderer};
use crate::scene::SceneGraph;
use std::collections::HashMap;

/// What a [`RecordingRenderer`] saw during one `render` call.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRecord {
    pub scene: String,
    pub target: Option<RenderTargetId>,
    pub width: u32,
    pub height: u32,
    pub camera_aspect: f32,
    /// Highest texture unit count of any material drawn.
    pub max_texture_units: u32,
}

/// A [`SceneRenderer`] that draws nothing and records everything.
///
/// It enforces a texture-unit limit the same way the wgpu renderer does, so a
/// scene that was not simplified fails with [`RenderError::TextureUnitBudget`].
pub struct RecordingRenderer {
    state: RendererState,
    limit: u32,
    targets: HashMap<RenderTargetId, (u32, u32)>,
    next_target: u32,
    next_texture: usize,
    fail_next: Option<RenderError>,
    pub renders: Vec<RenderRecord>,
    pub clears: Vec<Option<RenderTargetId>>,
    pub disposed: Vec<RenderTargetId>,
}

impl RecordingRenderer {
    pub fn new(limit: u32) -> Self {
        Self {
            state: RendererState {
                target: None,
                width: 1280,
                height: 720,
                clear_color: Color::rgb(0.2, 0.3, 0.4),
            },
            limit,
            targets: HashMap::new(),
            next_target: 0,
            next_texture: 1000,
            fail_next: None,
            renders: Vec::new(),
            clears: Vec::new(),
            disposed: Vec::new(),
        }
    }

    /// Make the next `render` call fail with `error`.
    pub fn fail_next_render(&mut self, error: RenderError) {
        self.fail_next = Some(error);
    }

    pub fn target_size(&self, id: RenderTargetId) -> Option<(u32, u32)> {
        self.targets.get(&id).copied()
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }
}

impl SceneRenderer for RecordingRenderer {
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
        self.clears.push(self.state.target);
    }

    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> Result<(), RenderError> {
        if let Some(target) = self.state.target {
            if !self.targets.contains_key(&target) {
                return Err(RenderError::MissingTarget(target));
            }
        }

        let max_texture_units = scene
            .world()
            .query::<&RenderMesh>()
            .iter()
            .flat_map(|(_, mesh)| mesh.materials.iter().map(|m| m.texture_units()))
            .max()
            .unwrap_or(0);

        self.renders.push(RenderRecord {
            scene: scene.name().to_owned(),
            target: self.state.target,
            width: self.state.width,
            height: self.state.height,
            camera_aspect: camera.aspect,
            max_texture_units,
        });

        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }
        if max_texture_units > self.limit {
            return Err(RenderError::TextureUnitBudget {
                required: max_texture_units,
                limit: self.limit,
            });
        }
        Ok(())
    }

    fn create_render_target(&mut self, width: u32, height: u32, _label: &str) -> RenderTarget {
        let id = RenderTargetId(self.next_target);
        self.next_target += 1;
        let texture = TextureId(self.next_texture);
        self.next_texture += 1;
        self.targets.insert(id, (width, height));
        RenderTarget {
            id,
            texture,
            width,
            height,
        }
    }

    fn resize_render_target(&mut self, target: &mut RenderTarget, width: u32, height: u32) {
        self.targets.insert(target.id, (width, height));
        target.width = width;
        target.height = height;
    }

    fn dispose_render_target(&mut self, target: RenderTarget) {
        self.targets.remove(&target.id);
        self.disposed.push(target.id);
    }

    fn unit_quad(&mut self) -> MeshId {
        MeshId(0)
    }

    fn texture_unit_limit(&self) -> u32 {
        self.limit
    }
}
