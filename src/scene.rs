//! Scene graphs backed by `hecs` worlds.
//!
//! A [`SceneGraph`] is a named `hecs::World` whose renderable entities carry a
//! [`Transform`] and a [`RenderMesh`]. The compositor renders one scene into a
//! texture; the primary scene displays that texture on a quad.

use crate::ecs::RenderMesh;
use crate::mesh::Transform;
use hecs::{Entity, World};

/// A named collection of entities that is rendered as one unit.
pub struct SceneGraph {
    name: String,
    world: World,
}

impl SceneGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world: World::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct access to the underlying ECS world.
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Spawn a renderable entity.
    pub fn spawn_mesh(&mut self, transform: Transform, mesh: RenderMesh) -> Entity {
        self.world.spawn((transform, mesh))
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.world.contains(entity)
    }

    pub fn len(&self) -> u32 {
        self.world.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    pub fn transform(&self, entity: Entity) -> Option<Transform> {
        self.world.get::<&Transform>(entity).ok().map(|t| *t)
    }

    /// Overwrite an entity's transform. Returns `false` if the entity has none.
    pub fn set_transform(&mut self, entity: Entity, transform: Transform) -> bool {
        match self.world.get::<&mut Transform>(entity) {
            Ok(mut current) => {
                *current = transform;
                true
            }
            Err(_) => false,
        }
    }

    /// Remove an entity. Returns `false` if it was not part of this scene.
    pub fn remove(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity).is_ok()
    }

    /// Move an entity with all its components into `destination`.
    ///
    /// Entity handles are per-world, so the entity gets a new handle in the
    /// destination scene. Returns `None` if the entity does not exist here.
    pub fn transfer(&mut self, entity: Entity, destination: &mut SceneGraph) -> Option<Entity> {
        let taken = self.world.take(entity).ok()?;
        Some(destination.world.spawn(taken))
    }

    /// Number of renderable entities.
    pub fn mesh_count(&self) -> usize {
        self.world.query::<&RenderMesh>().iter().count()
    }
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field("name", &self.name)
            .field("entities", &self.world.len())
            .finish()
    }
}

/// Which of the two scenes an entity currently lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneRole {
    Primary,
    Secondary,
}

/// Handle to the player avatar and the scene it belongs to.
///
/// The hand-off moves the avatar from the primary into the secondary scene,
/// which changes its entity handle; this type keeps both in sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Avatar {
    pub entity: Entity,
    pub scene: SceneRole,
}

impl Avatar {
    pub fn new(entity: Entity, scene: SceneRole) -> Self {
        Self { entity, scene }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::ecs::MeshId;
    use crate::material::Material;
    use glam::Vec3;

    fn cube() -> RenderMesh {
        RenderMesh::new(MeshId(0), Material::standard(Color::WHITE))
    }

    #[test]
    fn transfer_moves_components() {
        let mut a = SceneGraph::new("a");
        let mut b = SceneGraph::new("b");
        let entity = a.spawn_mesh(Transform::from_position(Vec3::X), cube());

        let moved = a.transfer(entity, &mut b).expect("entity exists");

        assert!(!a.contains(entity));
        assert!(b.contains(moved));
        assert_eq!(b.transform(moved).map(|t| t.position), Some(Vec3::X));
        assert_eq!(b.mesh_count(), 1);
    }

    #[test]
    fn transfer_missing_entity_is_none() {
        let mut a = SceneGraph::new("a");
        let mut b = SceneGraph::new("b");
        let entity = a.spawn_mesh(Transform::new(), cube());
        assert!(a.remove(entity));
        assert!(a.transfer(entity, &mut b).is_none());
        assert!(b.is_empty());
    }

    #[test]
    fn set_transform_requires_component() {
        let mut scene = SceneGraph::new("s");
        let bare = scene.world_mut().spawn((42u32,));
        assert!(!scene.set_transform(bare, Transform::new()));

        let entity = scene.spawn_mesh(Transform::new(), cube());
        assert!(scene.set_transform(entity, Transform::from_position(Vec3::Y)));
        assert_eq!(scene.transform(entity).map(|t| t.position), Some(Vec3::Y));
    }
}
