//! ECS components for entity-based rendering.
//!
//! Scenes are `hecs` worlds. Entities with a [`Transform`](crate::Transform) and a
//! [`RenderMesh`] are drawn by a [`SceneRenderer`](crate::SceneRenderer).
//!
//! # Example
//!
//! ```ignore
//! use telescreen::*;
//!
//! let cube = renderer.add_mesh(Mesh::cube(renderer.gpu()));
//! scene.spawn_mesh(
//!     Transform::new().position(Vec3::new(0.0, 0.5, 0.0)),
//!     RenderMesh::new(cube, Material::standard(Color::rgb(0.8, 0.2, 0.2))),
//! );
//! ```

use crate::material::Material;

/// Type-safe handle to a mesh registered with a renderer.
///
/// This newtype wrapper prevents accidentally passing texture indices where mesh indices are expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Type-safe handle to a texture registered with a renderer.
///
/// Render target textures use the same handle space, which is what lets a
/// material sample another scene's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// Component for rendering a mesh on an entity.
///
/// A mesh may carry several material slots; slot `0` is the primary surface.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderMesh {
    /// Handle to the mesh geometry.
    pub mesh: MeshId,
    /// Material slots, indexed the same way as the simplification cache.
    pub materials: Vec<Material>,
}

impl RenderMesh {
    /// A mesh with a single material slot.
    pub fn new(mesh: MeshId, material: Material) -> Self {
        Self {
            mesh,
            materials: vec![material],
        }
    }

    /// A mesh with several material slots.
    pub fn with_materials(mesh: MeshId, materials: Vec<Material>) -> Self {
        Self { mesh, materials }
    }

    /// The material in slot `0`.
    pub fn primary_material(&self) -> Option<&Material> {
        self.materials.first()
    }
}
